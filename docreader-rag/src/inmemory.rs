//! In-memory vector index using exact squared-Euclidean search.
//!
//! This module provides [`InMemoryIndex`], a brute-force index backed by two
//! parallel `Vec`s protected by a single `tokio::sync::RwLock`. Every query
//! scans the whole corpus, which is O(n × d) and fine for the corpus sizes
//! this service targets. Nothing is persisted; the corpus is lost on restart.

use std::cmp::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{IndexError, Result};
use crate::index::{ScoredText, VectorIndex};

/// Parallel vector and text stores. `vectors[i]` belongs to `texts[i]`.
#[derive(Debug, Default)]
struct Corpus {
    vectors: Vec<Vec<f32>>,
    texts: Vec<String>,
}

/// An in-memory, append-only vector index.
///
/// Inserts take the write lock once per batch, so a batch becomes visible
/// to searches all at once. Searches share the read lock and run
/// concurrently with each other.
///
/// # Example
///
/// ```rust,ignore
/// use docreader_rag::{InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new(384);
/// index.insert(vec![embedding], vec!["chunk text".to_string()]).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryIndex {
    dimensions: usize,
    corpus: RwLock<Corpus>,
}

impl InMemoryIndex {
    /// Create a new empty index for vectors of `dimensions` entries.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions, corpus: RwLock::new(Corpus::default()) }
    }

    fn check_dimensions(&self, vector: &[f32]) -> std::result::Result<(), IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

/// Squared Euclidean distance between two equal-length vectors.
pub fn squared_euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Nearest first; equal distances fall back to insertion order. NaN ranks
/// as infinitely far.
fn by_distance_then_position(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    let rank = |d: f32| if d.is_nan() { f32::INFINITY } else { d };
    rank(a.1).total_cmp(&rank(b.1)).then(a.0.cmp(&b.0))
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn insert(&self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<usize> {
        if vectors.len() != texts.len() {
            return Err(
                IndexError::LengthMismatch { vectors: vectors.len(), texts: texts.len() }.into()
            );
        }
        for vector in &vectors {
            self.check_dimensions(vector)?;
        }
        if vectors.is_empty() {
            return Ok(self.corpus.read().await.texts.len());
        }

        let mut corpus = self.corpus.write().await;
        let added = vectors.len();
        corpus.vectors.extend(vectors);
        corpus.texts.extend(texts);
        let corpus_size = corpus.texts.len();
        debug!(added, corpus_size, "appended entries");
        Ok(corpus_size)
    }

    async fn search_scored(&self, query: &[f32], k: usize) -> Result<Vec<ScoredText>> {
        self.check_dimensions(query)?;

        let corpus = self.corpus.read().await;
        if k == 0 || corpus.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = corpus
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| (position, squared_euclidean(query, vector)))
            .collect();

        let k = k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_position);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance_then_position);

        Ok(scored
            .into_iter()
            .map(|(position, distance)| ScoredText {
                position,
                distance,
                text: corpus.texts[position].clone(),
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.corpus.read().await.texts.len()
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
