use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    models::{FieldError, ValidationErrors},
    similarity::SimilarityError,
};

/// Detail returned while no model handle is present
const MODEL_NOT_LOADED: &str = "Model not loaded";

/// Errors surfaced by the HTTP layer.
#[derive(Debug)]
pub enum HttpError {
    /// Request body failed validation (400)
    Validation(ValidationErrors),
    /// No model handle (503)
    ModelNotLoaded,
    /// Anything else raised while computing similarity (500)
    Internal(String),
}

// Tell axum how to convert `HttpError` into a response.
impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        match self {
            HttpError::Validation(errors) => {
                log::debug!("rejected request with {} validation errors", errors.len());
                (StatusCode::BAD_REQUEST, Json(json!({ "detail": errors })))
            }
            HttpError::ModelNotLoaded => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "detail": MODEL_NOT_LOADED })),
            ),
            HttpError::Internal(message) => {
                log::error!("Error processing request: {message}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "detail": message })),
                )
            }
        }
        .into_response()
    }
}

impl From<SimilarityError> for HttpError {
    fn from(err: SimilarityError) -> Self {
        match err {
            SimilarityError::ModelNotLoaded => Self::ModelNotLoaded,
            err => Self::Internal(err.to_string()),
        }
    }
}

impl From<ValidationErrors> for HttpError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

// Body-level failures have no field to point at, so they are located at `["body"]`.
impl From<JsonRejection> for HttpError {
    fn from(rejection: JsonRejection) -> Self {
        let kind = match &rejection {
            JsonRejection::JsonSyntaxError(_) => "json_invalid",
            JsonRejection::JsonDataError(_) => "type_error",
            JsonRejection::MissingJsonContentType(_) => "content_type",
            _ => "body_invalid",
        };

        let error = FieldError::new(vec!["body".to_string()], rejection.body_text(), kind);
        Self::Validation(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::similarity::EmbeddingError;
    use http_body_util::BodyExt;

    async fn response_json(err: HttpError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_validation_errors_become_400() {
        let mut errors = ValidationErrors::default();
        errors.push(FieldError::value_error("text", "text list cannot be empty"));
        errors.push(FieldError::value_error("products", "products list cannot be empty"));
        errors.push(FieldError::value_error("top_k", "top_k must be greater than 0"));

        let (status, body) = response_json(HttpError::Validation(errors.at("body"))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        let detail = body["detail"].as_array().unwrap();
        assert_eq!(detail.len(), 3);
        for error in detail {
            let keys: Vec<&str> = error.as_object().unwrap().keys().map(String::as_str).collect();
            assert_eq!(keys.len(), 3);
            assert!(keys.contains(&"loc") && keys.contains(&"msg") && keys.contains(&"type"));
            assert_eq!(error["type"], "value_error");
            assert_eq!(error["loc"][0], "body");
        }
        assert_eq!(detail[2]["msg"], "top_k must be greater than 0");
    }

    #[tokio::test]
    async fn test_model_not_loaded_becomes_503() {
        let (status, body) = response_json(SimilarityError::ModelNotLoaded.into()).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({ "detail": "Model not loaded" }));
    }

    #[tokio::test]
    async fn test_service_failure_becomes_500_with_message() {
        let err: HttpError =
            SimilarityError::from(EmbeddingError::EmbeddingFailed("boom".to_string())).into();
        let (status, body) = response_json(err).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "Embedding generation failed: boom");
    }
}
