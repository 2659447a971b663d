//! Product similarity ranking.
//!
//! - `embeddings`: fastembed wrapper and the `Embedder`/`ModelLoader` seams
//! - `search`: cosine similarity top-k search over embeddings
//! - `service`: model lifecycle and the `find_similar` pipeline

pub mod embeddings;
pub mod search;
mod service;

pub use embeddings::{Embedder, EmbeddingError, FastembedLoader, ModelLoader};
pub use service::{SimilarityError, SimilarityService};
