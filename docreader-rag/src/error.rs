//! Error types for the `docreader-rag` crate.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// The source document could not be read or converted to text.
    #[error("Extraction error ({path}): {message}")]
    Extraction {
        /// The file that failed to extract.
        path: String,
        /// A description of the failure.
        message: String,
    },

    /// The embedding backend failed or returned malformed output.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector index precondition was violated.
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// The language-model backend failed to produce an answer.
    #[error("Generation error ({provider}): {message}")]
    Generation {
        /// The language-model provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An external call did not complete within its deadline.
    #[error("{stage} timed out after {timeout:?}")]
    Timeout {
        /// The pipeline stage that timed out (`embedding` or `generation`).
        stage: &'static str,
        /// The configured deadline.
        timeout: Duration,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The caller supplied input that cannot be processed.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Reading or writing uploaded files failed.
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Violations of the vector index preconditions.
///
/// These are raised before any mutation, so a failed insert leaves the
/// corpus untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// A vector does not have the index dimensionality.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The index dimensionality.
        expected: usize,
        /// The dimensionality of the offending vector.
        actual: usize,
    },

    /// The vector and text batches passed to insert differ in length.
    #[error("length mismatch: {vectors} vectors but {texts} texts")]
    LengthMismatch {
        /// Number of vectors supplied.
        vectors: usize,
        /// Number of texts supplied.
        texts: usize,
    },
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
