use crate::{
    config::Settings,
    models::{collect_results, FieldError, Query, QueryPayload, SimilarityMatch, SimilarityResult},
    similarity::SimilarityService,
};
use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

mod errors;

use errors::HttpError;

pub const HEALTH_ROUTE: &str = "/health";
pub const SIMILARITY_ROUTE: &str = "/similarity";
pub const OPENAPI_ROUTE: &str = "/openapi.json";
pub const DOCS_ROUTE: &str = "/docs";

#[derive(Clone)]
struct SharedState {
    service: Arc<SimilarityService>,
}

/// Build the HTTP router. API routes live under [`Settings::api_prefix`].
pub fn router(settings: &Settings, service: Arc<SimilarityService>) -> anyhow::Result<Router> {
    let prefix = settings.api_prefix();
    let cors = cors_layer(&settings.cors_origins)?;
    let docs = SwaggerUi::new(DOCS_ROUTE).url(OPENAPI_ROUTE, openapi_document(settings));
    let shared_state = Arc::new(SharedState { service });

    let api = Router::new()
        .route(HEALTH_ROUTE, get(health))
        .route(SIMILARITY_ROUTE, post(similarity));

    let app = Router::new()
        .nest(&prefix, api)
        .merge(docs)
        .layer(cors)
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(
                    tower_http::trace::DefaultMakeSpan::new().level(tracing::Level::INFO),
                )
                .on_response(
                    tower_http::trace::DefaultOnResponse::new().level(tracing::Level::INFO),
                ),
        )
        .with_state(shared_state);

    Ok(app)
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.iter().any(|origin| origin.trim() == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin.trim())
                .map_err(|err| anyhow::anyhow!("invalid CORS origin {origin:?}: {err}"))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

/// Load the model, serve until `shutdown` resolves, then release the model.
///
/// The model is released even if serving fails.
async fn start_app<F>(
    settings: Settings,
    service: Arc<SimilarityService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    log::info!("starting {} with model {}", settings.app_name, service.model_name());

    let loader = service.clone();
    tokio::task::spawn_blocking(move || loader.load()).await??;

    let served = serve(settings, service.clone(), shutdown).await;
    service.cleanup();
    served
}

async fn serve<F>(
    settings: Settings,
    service: Arc<SimilarityService>,
    shutdown: F,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = format!("{}:{}", settings.host, settings.port);
    let app = router(&settings, service)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    log::info!("listening on {addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                log::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    log::warn!("shutdown signal received, stopping server");
}

pub fn start_daemon(settings: Settings, service: Arc<SimilarityService>) -> anyhow::Result<()> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start_app(settings, service, shutdown_signal()))
}

// Validation runs before the handler: a bad body never reaches the service.
#[async_trait]
impl<S> FromRequest<S> for Query
where
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(payload) = Json::<QueryPayload>::from_request(req, state).await?;
        Query::try_from(payload).map_err(|errors| errors.at("body").into())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "similarity",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse)
    )
)]
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

/// Get similar products for given queries
#[utoipa::path(
    post,
    path = "/similarity",
    tag = "similarity",
    request_body = QueryPayload,
    responses(
        (status = 200, description = "One result per query, in input order", body = Vec<SimilarityResult>),
        (status = 400, description = "Validation error, `detail` lists field errors"),
        (status = 500, description = "Similarity computation failed"),
        (status = 503, description = "Model not loaded")
    )
)]
async fn similarity(
    State(state): State<Arc<SharedState>>,
    query: Query,
) -> Result<Json<Vec<SimilarityResult>>, HttpError> {
    if !state.service.is_loaded() {
        return Err(HttpError::ModelNotLoaded);
    }

    log::debug!(
        "similarity request: {} queries, {} products, top_k={}",
        query.text().len(),
        query.products().len(),
        query.top_k()
    );

    // embedding is CPU bound
    let hits = tokio::task::block_in_place(|| {
        state.service.find_similar(query.text(), query.products(), query.top_k())
    })?;

    Ok(Json(collect_results(query.text(), hits)))
}

/// OpenAPI description of the API routes, mounted under [`Settings::api_prefix`].
#[derive(OpenApi)]
#[openapi(
    info(description = "API for product similarity search"),
    paths(health, similarity),
    components(schemas(
        HealthResponse,
        QueryPayload,
        SimilarityResult,
        SimilarityMatch,
        FieldError
    )),
    tags((name = "similarity", description = "Product similarity search"))
)]
struct ApiDoc;

fn openapi_document(settings: &Settings) -> utoipa::openapi::OpenApi {
    let prefix = settings.api_prefix();
    let mut doc = ApiDoc::openapi();
    doc.info.title = settings.app_name.clone();

    let paths = std::mem::take(&mut doc.paths.paths);
    doc.paths.paths = paths
        .into_iter()
        .map(|(path, item)| (format!("{prefix}{path}"), item))
        .collect();

    doc
}
