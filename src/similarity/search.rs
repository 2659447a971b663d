//! Brute-force cosine similarity search.
//!
//! Scores every query embedding against every corpus embedding and keeps the
//! best `top_k` hits per query.

use std::cmp::Ordering;

/// A corpus entry matched by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Position of the entry in the corpus
    pub corpus_id: usize,
    /// Cosine similarity score (-1.0 to 1.0)
    pub score: f32,
}

/// Errors that can occur during search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Rank `corpus` against each of `queries`.
///
/// Returns one hit list per query, in query order. Each list is sorted by
/// score (highest first) and holds at most `top_k` hits. Equal scores keep
/// corpus order. Zero-norm vectors score 0.0 against everything.
pub fn semantic_search(
    queries: &[Vec<f32>],
    corpus: &[Vec<f32>],
    top_k: usize,
) -> Result<Vec<Vec<Hit>>, SearchError> {
    let Some(dimensions) = queries.first().or(corpus.first()).map(Vec::len) else {
        return Ok(vec![Vec::new(); queries.len()]);
    };

    for vector in queries.iter().chain(corpus.iter()) {
        if vector.len() != dimensions {
            return Err(SearchError::DimensionMismatch {
                expected: dimensions,
                got: vector.len(),
            });
        }
    }

    let corpus_norms: Vec<f32> = corpus.iter().map(|v| l2_norm(v)).collect();

    let results = queries
        .iter()
        .map(|query| {
            let query_norm = l2_norm(query);

            let mut hits: Vec<Hit> = corpus
                .iter()
                .zip(corpus_norms.iter())
                .enumerate()
                .map(|(corpus_id, (target, target_norm))| Hit {
                    corpus_id,
                    score: cosine_similarity(query, target, query_norm, *target_norm),
                })
                .collect();

            // sort_by is stable, so ties stay in corpus order
            hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            hits.truncate(top_k);
            hits
        })
        .collect();

    Ok(results)
}

/// Compute L2 norm of a vector.
fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

fn cosine_similarity(query: &[f32], target: &[f32], query_norm: f32, target_norm: f32) -> f32 {
    if query_norm < f32::EPSILON || target_norm < f32::EPSILON {
        return 0.0;
    }

    let dot_product: f32 = query.iter().zip(target.iter()).map(|(a, b)| a * b).sum();
    dot_product / (query_norm * target_norm)
}
