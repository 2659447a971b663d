use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::similarity::{Embedder, EmbeddingError, ModelLoader};

mod search;

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

/// Embedder returning fixed vectors per text, so scores are known in advance.
#[derive(Clone, Default)]
pub struct StubEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    failure: Option<String>,
    calls: Arc<Mutex<Vec<Vec<String>>>>,
}

impl StubEmbedder {
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    /// Every `embed_batch` call fails with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Batches seen so far. Shared with clones handed out by [`StubLoader`].
    pub fn calls(&self) -> Arc<Mutex<Vec<Vec<String>>>> {
        self.calls.clone()
    }
}

impl Embedder for StubEmbedder {
    fn name(&self) -> &str {
        "stub"
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.lock().unwrap().push(texts.to_vec());

        if let Some(message) = &self.failure {
            return Err(EmbeddingError::EmbeddingFailed(message.clone()));
        }

        texts
            .iter()
            .map(|text| {
                self.vectors.get(text).cloned().ok_or_else(|| {
                    EmbeddingError::EmbeddingFailed(format!("no stub vector for {text:?}"))
                })
            })
            .collect()
    }
}

pub struct StubLoader {
    embedder: StubEmbedder,
}

impl StubLoader {
    pub fn new(embedder: StubEmbedder) -> Self {
        Self { embedder }
    }
}

impl ModelLoader for StubLoader {
    fn load(&self, _model_name: &str) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        Ok(Arc::new(self.embedder.clone()))
    }
}

pub struct FailingLoader;

impl ModelLoader for FailingLoader {
    fn load(&self, model_name: &str) -> Result<Arc<dyn Embedder>, EmbeddingError> {
        Err(EmbeddingError::InvalidModel(format!(
            "Unknown model: {model_name}"
        )))
    }
}
