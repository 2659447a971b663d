use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod models;
mod similarity;
#[cfg(test)]
mod tests;
mod web;

use config::Settings;
use models::{Query, SimilarityResult};
use similarity::{FastembedLoader, SimilarityService};

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_filter()));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_service(settings: &Settings, show_download_progress: bool) -> Arc<SimilarityService> {
    let loader = FastembedLoader::new(&settings.cache_dir)
        .with_download_progress(show_download_progress);

    Arc::new(SimilarityService::new(
        settings.model_name.clone(),
        Box::new(loader),
    ))
}

/// Validate the query, then load the model for one search and release it.
fn run_search(
    service: &SimilarityService,
    text: Vec<String>,
    products: Vec<String>,
    top_k: i64,
) -> anyhow::Result<Vec<SimilarityResult>> {
    let query = Query::new(text, products, top_k)?;
    service.load()?;

    let hits = service.find_similar(query.text(), query.products(), query.top_k());
    service.cleanup();

    Ok(models::collect_results(query.text(), hits?))
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    dotenvy::dotenv().ok();
    let mut settings = Settings::load(args.config.as_deref())?;

    init_logging(&settings);

    match args.command {
        cli::Command::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }

            let service = build_service(&settings, false);
            web::start_daemon(settings, service)
        }

        cli::Command::Search {
            text,
            products,
            top_k,
        } => {
            let service = build_service(&settings, true);
            let results = run_search(&service, text, products, top_k)?;

            println!("{}", serde_json::to_string_pretty(&results)?);
            Ok(())
        }
    }
}
