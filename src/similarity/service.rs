//! Similarity service: owns the embedding model handle and ranks products.
//!
//! Lifecycle: constructed empty, `load()` acquires the model before serving,
//! `cleanup()` drops it at shutdown. A released service may be loaded again.

use std::sync::{Arc, RwLock};

use crate::models::SimilarityMatch;
use crate::similarity::embeddings::{Embedder, EmbeddingError, ModelLoader};
use crate::similarity::search::{semantic_search, SearchError};

/// Decimal places kept in returned scores
const SCORE_PRECISION: f64 = 10_000.0;

/// Errors that can occur during similarity operations.
#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Ranks product descriptions against free-text queries.
///
/// Shared across request handlers through `Arc`. The model handle is only
/// replaced by `load`/`cleanup`, which run outside the serving window.
pub struct SimilarityService {
    model_name: String,
    loader: Box<dyn ModelLoader>,
    model: RwLock<Option<Arc<dyn Embedder>>>,
}

impl SimilarityService {
    /// Create a service for `model_name`. No model is loaded yet.
    pub fn new(model_name: impl Into<String>, loader: Box<dyn ModelLoader>) -> Self {
        Self {
            model_name: model_name.into(),
            loader,
            model: RwLock::new(None),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Check if a model handle is present.
    pub fn is_loaded(&self) -> bool {
        self.model
            .read()
            .ok()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Acquire the embedding model. Errors are fatal at startup.
    pub fn load(&self) -> Result<(), SimilarityError> {
        log::info!("Loading model '{}'...", self.model_name);

        let model = self.loader.load(&self.model_name)?;

        let mut guard = self
            .model
            .write()
            .map_err(|e| SimilarityError::Internal(format!("Lock poisoned: {}", e)))?;
        *guard = Some(model);

        log::info!("Model '{}' loaded successfully", self.model_name);
        Ok(())
    }

    /// Release the model handle. Calling this on an unloaded service is a no-op.
    pub fn cleanup(&self) {
        let released = match self.model.write() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        if let Some(model) = released {
            log::info!("Cleaning up model '{}'...", model.name());
            drop(model);
            log::info!("Model cleanup complete");
        }
    }

    /// Find the `top_k` most similar products for each query.
    ///
    /// Returns one match list per query, in query order, each sorted by score
    /// (highest first). Scores are clamped to [0, 1] and rounded to 4 decimals.
    /// Asking for more matches than there are products returns all products.
    pub fn find_similar(
        &self,
        queries: &[String],
        products: &[String],
        top_k: usize,
    ) -> Result<Vec<Vec<SimilarityMatch>>, SimilarityError> {
        let model = self.current_model()?;

        let query_embeddings = embed_all(model.as_ref(), queries)?;
        let product_embeddings = embed_all(model.as_ref(), products)?;

        let hits = semantic_search(&query_embeddings, &product_embeddings, top_k)?;

        hits.into_iter()
            .map(|query_hits| {
                query_hits
                    .into_iter()
                    .map(|hit| {
                        let product = products.get(hit.corpus_id).ok_or_else(|| {
                            SimilarityError::Internal(format!(
                                "hit refers to unknown product #{}",
                                hit.corpus_id
                            ))
                        })?;

                        Ok(SimilarityMatch {
                            product: product.clone(),
                            score: round_score(hit.score),
                        })
                    })
                    .collect::<Result<Vec<_>, SimilarityError>>()
            })
            .collect()
    }

    /// Clone the model handle so inference runs without holding the lock.
    fn current_model(&self) -> Result<Arc<dyn Embedder>, SimilarityError> {
        let guard = self
            .model
            .read()
            .map_err(|e| SimilarityError::Internal(format!("Lock poisoned: {}", e)))?;

        guard.as_ref().cloned().ok_or(SimilarityError::ModelNotLoaded)
    }
}

/// Embed `texts` in one batch, checking that every input got a vector.
fn embed_all(model: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>, SimilarityError> {
    let embeddings = model.embed_batch(texts)?;

    if embeddings.len() != texts.len() {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "expected {} embeddings, got {}",
            texts.len(),
            embeddings.len()
        ))
        .into());
    }

    Ok(embeddings)
}

fn round_score(score: f32) -> f64 {
    let score = f64::from(score);
    if score.is_nan() {
        return 0.0;
    }
    (score.clamp(0.0, 1.0) * SCORE_PRECISION).round() / SCORE_PRECISION
}
