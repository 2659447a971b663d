//! Embedding model wrapper for fastembed.
//!
//! - `Embedder`: turns a batch of strings into vectors
//! - `ModelLoader`: resolves a model identifier into an `Embedder`
//! - `FastembedLoader` / `EmbeddingModel`: the fastembed-backed implementation

use fastembed::{InitOptions, TextEmbedding};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Error type for embedding operations
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("Model initialization failed: {0}")]
    InitFailed(String),

    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Invalid model name: {0}")]
    InvalidModel(String),
}

/// Anything that can encode a batch of strings into fixed-length vectors.
pub trait Embedder: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input string, in input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Acquires an [`Embedder`] for a model identifier.
pub trait ModelLoader: Send + Sync {
    fn load(&self, model_name: &str) -> Result<Arc<dyn Embedder>, EmbeddingError>;
}

/// Loads fastembed models, downloading them into `cache_dir` on first use.
pub struct FastembedLoader {
    cache_dir: PathBuf,
    show_download_progress: bool,
}

impl FastembedLoader {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            show_download_progress: false,
        }
    }

    pub fn with_download_progress(mut self, show: bool) -> Self {
        self.show_download_progress = show;
        self
    }
}

impl ModelLoader for FastembedLoader {
    fn load(&self, model_name: &str) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        let model = EmbeddingModel::new(
            model_name,
            self.cache_dir.clone(),
            self.show_download_progress,
        )?;
        log::debug!(
            "fastembed model '{}' ready ({} dimensions)",
            model_name,
            model.dimensions()
        );
        Ok(Arc::new(model))
    }
}

/// Wrapper around fastembed's TextEmbedding model.
/// Uses a Mutex because fastembed's embed() requires &mut self.
pub struct EmbeddingModel {
    model: Mutex<TextEmbedding>,
    model_name: String,
    dimensions: usize,
}

impl EmbeddingModel {
    /// Create a new embedding model with the given name.
    ///
    /// The model will be downloaded into `cache_dir` if not cached yet.
    pub fn new(
        model_name: &str,
        cache_dir: PathBuf,
        show_download_progress: bool,
    ) -> Result<Self, EmbeddingError> {
        let model_enum = parse_model_name(model_name)?;

        std::fs::create_dir_all(&cache_dir).map_err(|e| {
            EmbeddingError::InitFailed(format!("Failed to create cache directory: {}", e))
        })?;

        let options = InitOptions::new(model_enum)
            .with_cache_dir(cache_dir)
            .with_show_download_progress(show_download_progress);

        let mut model = TextEmbedding::try_new(options)
            .map_err(|e| EmbeddingError::InitFailed(e.to_string()))?;

        let dimensions = Self::probe_dimensions(&mut model)?;

        Ok(Self {
            model: Mutex::new(model),
            model_name: model_name.to_string(),
            dimensions,
        })
    }

    /// Get the embedding dimensions for this model
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Probe the model to determine embedding dimensions.
    fn probe_dimensions(model: &mut TextEmbedding) -> Result<usize, EmbeddingError> {
        let test_embeddings = model
            .embed(vec!["test"], None)
            .map_err(|e| EmbeddingError::InitFailed(format!("Failed to probe dimensions: {}", e)))?;

        test_embeddings
            .first()
            .map(|v| v.len())
            .ok_or_else(|| EmbeddingError::InitFailed("Model returned no embedding".to_string()))
    }
}

impl Embedder for EmbeddingModel {
    fn name(&self) -> &str {
        &self.model_name
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut model = self.model.lock().map_err(|e| {
            EmbeddingError::EmbeddingFailed(format!("Failed to acquire model lock: {}", e))
        })?;

        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbeddingError::EmbeddingFailed(e.to_string()))
    }
}

/// Organisation prefixes accepted in front of a model name,
/// e.g. "sentence-transformers/all-MiniLM-L6-v2".
const KNOWN_ORGS: [&str; 4] = ["sentence-transformers/", "baai/", "xenova/", "qdrant/"];

/// Parse model name string to fastembed enum.
pub fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbeddingError> {
    let lowered = name.trim().to_lowercase();
    let short = KNOWN_ORGS
        .iter()
        .find_map(|org| lowered.strip_prefix(org))
        .unwrap_or(&lowered);

    match short {
        "all-minilm-l6-v2" | "allminiml6v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "all-minilm-l6-v2-q" | "allminiml6v2q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
        "all-minilm-l12-v2" | "allminiml12v2" => Ok(fastembed::EmbeddingModel::AllMiniLML12V2),
        "paraphrase-multilingual-minilm-l12-v2" | "paraphrasemlminilml12v2" => {
            Ok(fastembed::EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        "bge-small-en-v1.5" | "bgesmallenv15" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-small-en-v1.5-q" | "bgesmallenv15q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
        "bge-base-en-v1.5" | "bgebaseenv15" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-base-en-v1.5-q" | "bgebaseenv15q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
        "bge-large-en-v1.5" | "bgelargeenv15" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "bge-large-en-v1.5-q" | "bgelargeenv15q" => Ok(fastembed::EmbeddingModel::BGELargeENV15Q),
        _ => Err(EmbeddingError::InvalidModel(format!(
            "Unknown model: {}. Supported models: all-MiniLM-L6-v2, all-MiniLM-L12-v2, paraphrase-multilingual-MiniLM-L12-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5 (add -q suffix for quantized MiniLM-L6/bge)",
            name
        ))),
    }
}
