//! Document pipeline orchestrator.
//!
//! The [`DocumentPipeline`] coordinates the upload workflow
//! (extract → chunk → embed → insert) and the question workflow
//! (embed → search → join → generate) by composing a [`TextExtractor`], an
//! [`EmbeddingProvider`], a [`VectorIndex`] and an [`AnswerGenerator`].
//!
//! # Example
//!
//! ```rust,ignore
//! use docreader_rag::{DocumentPipeline, InMemoryIndex, RagConfig};
//!
//! let pipeline = DocumentPipeline::builder()
//!     .config(RagConfig::default())
//!     .extractor(Arc::new(PdfExtractor))
//!     .embedding_provider(Arc::new(embedder))
//!     .index(Arc::new(InMemoryIndex::new(384)))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! pipeline.ingest_file(Path::new("data/uploaded_docs/manual.pdf")).await?;
//! let answer = pipeline.ask("How do I reset the device?").await?;
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::chunking::FixedSizeChunker;
use crate::config::RagConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::extract::TextExtractor;
use crate::generation::AnswerGenerator;
use crate::index::VectorIndex;

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Number of chunks the document produced and the index received.
    pub chunk_count: usize,
    /// Total entries in the index immediately after this document's insert.
    pub corpus_size: usize,
}

/// An answer together with the context it was generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Answer {
    /// The generated answer text.
    pub answer: String,
    /// The retrieved chunk texts, nearest first.
    pub context_chunks: Vec<String>,
}

/// The document pipeline orchestrator.
///
/// Holds no global state; share it behind an `Arc`. Construct one via
/// [`DocumentPipeline::builder()`].
pub struct DocumentPipeline {
    config: RagConfig,
    chunker: FixedSizeChunker,
    extractor: Arc<dyn TextExtractor>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn AnswerGenerator>,
}

impl std::fmt::Debug for DocumentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentPipeline")
            .field("config", &self.config)
            .field("embedding_provider", &self.embedding_provider.name())
            .field("generator", &self.generator.name())
            .finish_non_exhaustive()
    }
}

impl DocumentPipeline {
    /// Create a new [`DocumentPipelineBuilder`].
    pub fn builder() -> DocumentPipelineBuilder {
        DocumentPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the vector index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Extract the file at `path` and ingest its text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] if the file cannot be converted to
    /// text, plus anything [`ingest_text`](Self::ingest_text) returns.
    pub async fn ingest_file(&self, path: &Path) -> Result<IngestReport> {
        let extractor = Arc::clone(&self.extractor);
        let owned: PathBuf = path.to_path_buf();
        let text = tokio::task::spawn_blocking(move || extractor.extract(&owned))
            .await
            .map_err(|e| RagError::Extraction {
                path: path.display().to_string(),
                message: format!("extractor task failed: {e}"),
            })?
            .inspect_err(|e| error!(path = %path.display(), error = %e, "extraction failed"))?;

        let report = self.ingest_text(&text).await?;
        info!(path = %path.display(), chunk_count = report.chunk_count, "ingested file");
        Ok(report)
    }

    /// Ingest already-extracted text: chunk → embed → insert.
    ///
    /// Empty text produces no chunks and leaves the index unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Embedding`] if the backend fails or returns the
    /// wrong number or shape of vectors, and [`RagError::Index`] if the
    /// insert is rejected.
    pub async fn ingest_text(&self, text: &str) -> Result<IngestReport> {
        let chunks: Vec<&str> = self.chunker.chunks(text).collect();
        if chunks.is_empty() {
            let corpus_size = self.index.len().await;
            info!(chunk_count = 0, corpus_size, "ingested document (empty)");
            return Ok(IngestReport { chunk_count: 0, corpus_size });
        }

        let embeddings = self.embedding_provider.embed_batch(&chunks).await.inspect_err(|e| {
            error!(chunk_count = chunks.len(), error = %e, "embedding failed during ingestion");
        })?;
        self.check_embeddings(&embeddings, chunks.len())?;

        let chunk_count = chunks.len();
        let texts = chunks.into_iter().map(str::to_owned).collect();
        let corpus_size = self.index.insert(embeddings, texts).await.inspect_err(|e| {
            error!(error = %e, "index insert failed during ingestion");
        })?;

        info!(chunk_count, corpus_size, "ingested document");
        Ok(IngestReport { chunk_count, corpus_size })
    }

    /// Embed `question` and return the `top_k` nearest chunk texts.
    ///
    /// An empty index yields an empty list.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<String>> {
        let embeddings = self.embedding_provider.embed_batch(&[question]).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;
        self.check_embeddings(&embeddings, 1)?;
        let query = embeddings.into_iter().next().unwrap_or_default();

        let chunks = self.index.search(&query, self.config.top_k).await.inspect_err(|e| {
            error!(error = %e, "index search failed");
        })?;
        if chunks.is_empty() {
            warn!("no indexed chunks; answering without context");
        }
        Ok(chunks)
    }

    /// Answer `question` from the indexed corpus.
    ///
    /// The retrieved chunks are joined with single spaces, nearest first,
    /// and passed to the generator as context.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for a blank question, and
    /// propagates embedding, index, generation and timeout errors.
    pub async fn ask(&self, question: &str) -> Result<Answer> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidInput("question must not be empty".to_string()));
        }

        let context_chunks = self.retrieve(question).await?;
        let context = context_chunks.join(" ");
        let answer = self.generator.generate(&context, question).await.inspect_err(|e| {
            error!(error = %e, "answer generation failed");
        })?;

        info!(context_chunks = context_chunks.len(), answer_len = answer.len(), "question answered");
        Ok(Answer { answer, context_chunks })
    }

    /// Backend output must have one vector per input, each of the index width.
    fn check_embeddings(&self, embeddings: &[Vec<f32>], expected: usize) -> Result<()> {
        let provider = self.embedding_provider.name();
        if embeddings.len() != expected {
            return Err(RagError::Embedding {
                provider: provider.to_string(),
                message: format!("expected {expected} embeddings, got {}", embeddings.len()),
            });
        }
        let dimensions = self.config.dimensions;
        if let Some(bad) = embeddings.iter().find(|v| v.len() != dimensions) {
            return Err(RagError::Embedding {
                provider: provider.to_string(),
                message: format!("expected {dimensions}-dimension vectors, got {}", bad.len()),
            });
        }
        Ok(())
    }
}

/// Builder for constructing a [`DocumentPipeline`].
///
/// Every component is required; `config` defaults to [`RagConfig::default()`].
/// Call [`build()`](DocumentPipelineBuilder::build) to validate and produce
/// the pipeline.
#[derive(Default)]
pub struct DocumentPipelineBuilder {
    config: Option<RagConfig>,
    extractor: Option<Arc<dyn TextExtractor>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    generator: Option<Arc<dyn AnswerGenerator>>,
}

impl DocumentPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text extractor.
    pub fn extractor(mut self, extractor: Arc<dyn TextExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn AnswerGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`DocumentPipeline`], validating that all components are
    /// set and agree on the embedding dimensionality.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Config`] if a component is missing, the config
    /// has a zero parameter, or the provider, index and config disagree on
    /// dimensions.
    pub fn build(self) -> Result<DocumentPipeline> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let extractor = self
            .extractor
            .ok_or_else(|| RagError::Config("extractor is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Config("embedding_provider is required".to_string()))?;
        let index =
            self.index.ok_or_else(|| RagError::Config("index is required".to_string()))?;
        let generator =
            self.generator.ok_or_else(|| RagError::Config("generator is required".to_string()))?;

        let dims = config.dimensions;
        if embedding_provider.dimensions() != dims || index.dimensions() != dims {
            return Err(RagError::Config(format!(
                "dimension mismatch: config {dims}, embedding provider {}, index {}",
                embedding_provider.dimensions(),
                index.dimensions()
            )));
        }

        Ok(DocumentPipeline {
            chunker: FixedSizeChunker::new(config.chunk_size),
            config,
            extractor,
            embedding_provider,
            index,
            generator,
        })
    }
}
