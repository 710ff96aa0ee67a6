//! # docreader-rag
//!
//! Retrieval-augmented question answering over uploaded documents.
//!
//! Uploaded files are extracted to text, split into fixed-size chunks,
//! embedded, and appended to an exact nearest-neighbor [`VectorIndex`].
//! Questions are embedded the same way; the nearest chunks become the
//! context for an [`AnswerGenerator`].
//!
//! ## Components
//!
//! - [`FixedSizeChunker`] — lazy, non-overlapping character chunks
//! - [`EmbeddingProvider`] — [`OpenAiEmbeddingProvider`], [`HashEmbeddingProvider`]
//! - [`VectorIndex`] — [`InMemoryIndex`] (squared Euclidean, brute force)
//! - [`AnswerGenerator`] — [`ChatCompletionGenerator`]
//! - [`TextExtractor`] — [`PdfExtractor`], [`PlainTextExtractor`], [`ExtensionExtractor`]
//! - [`DocumentPipeline`] — ingest and ask orchestration
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docreader_rag::*;
//!
//! let config = RagConfig::default();
//! let pipeline = DocumentPipeline::builder()
//!     .config(config.clone())
//!     .extractor(Arc::new(ExtensionExtractor::new()))
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(config.dimensions)))
//!     .index(Arc::new(InMemoryIndex::new(config.dimensions)))
//!     .generator(Arc::new(ChatCompletionGenerator::new(GROQ_API_BASE, key, HttpOptions::default())?))
//!     .build()?;
//!
//! pipeline.ingest_text("Rust guarantees memory safety without a garbage collector.").await?;
//! let answer = pipeline.ask("How does Rust manage memory?").await?;
//! ```

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod generation;
pub mod hash;
mod http;
pub mod index;
pub mod inmemory;
pub mod openai;
pub mod pipeline;

pub use chunking::{Chunks, FixedSizeChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use embedding::EmbeddingProvider;
pub use error::{IndexError, RagError, Result};
pub use extract::{ExtensionExtractor, PdfExtractor, PlainTextExtractor, TextExtractor};
pub use generation::{AnswerGenerator, ChatCompletionGenerator, GROQ_API_BASE, build_prompt};
pub use hash::HashEmbeddingProvider;
pub use http::HttpOptions;
pub use index::{ScoredText, VectorIndex};
pub use inmemory::{InMemoryIndex, squared_euclidean};
pub use openai::OpenAiEmbeddingProvider;
pub use pipeline::{Answer, DocumentPipeline, DocumentPipelineBuilder, IngestReport};
