//! Vector index trait for storing chunk embeddings and searching them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A retrieved chunk text with its position in the corpus and its distance
/// to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredText {
    /// Insertion position of the entry in the corpus.
    pub position: usize,
    /// Squared Euclidean distance to the query (lower is nearer).
    pub distance: f32,
    /// The chunk text.
    pub text: String,
}

/// An append-only store of (embedding, text) pairs with exact
/// nearest-neighbor search.
///
/// Position `i` in the vector store always corresponds to position `i` in
/// the text store. Implementations must keep that true under concurrent
/// inserts. A durable backend would slot in behind this same trait.
///
/// # Example
///
/// ```rust,ignore
/// use docreader_rag::{InMemoryIndex, VectorIndex};
///
/// let index = InMemoryIndex::new(384);
/// index.insert(embeddings, texts).await?;
/// let context = index.search(&query_embedding, 3).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append `vectors[i]` paired with `texts[i]` for every `i`, in order.
    ///
    /// Returns the corpus size observed atomically with the append, so
    /// concurrent inserts each see a distinct size. Fails without mutating
    /// the corpus if the lengths differ or any vector has the wrong
    /// dimensionality.
    async fn insert(&self, vectors: Vec<Vec<f32>>, texts: Vec<String>) -> Result<usize>;

    /// Return the `k` nearest entries to `query`, nearest first, with ties
    /// broken by earliest insertion. Returns fewer than `k` entries when the
    /// corpus is smaller, and none when it is empty.
    async fn search_scored(&self, query: &[f32], k: usize) -> Result<Vec<ScoredText>>;

    /// Like [`search_scored`](VectorIndex::search_scored) but returns only the texts.
    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        Ok(self.search_scored(query, k).await?.into_iter().map(|hit| hit.text).collect())
    }

    /// Number of entries in the corpus.
    async fn len(&self) -> usize;

    /// Whether the corpus has no entries.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Dimensionality every stored and queried vector must have.
    fn dimensions(&self) -> usize;
}
