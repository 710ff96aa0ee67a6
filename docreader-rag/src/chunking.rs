//! Fixed-size document chunking.
//!
//! [`FixedSizeChunker`] splits extracted text into consecutive,
//! non-overlapping pieces of at most `chunk_size` characters. The pieces are
//! produced lazily by [`Chunks`] and borrow from the input, so nothing is
//! copied until the pipeline hands the texts to the index.

use std::iter::FusedIterator;

/// Splits text into fixed-size chunks by character count.
///
/// Lengths are counted in Unicode scalar values, so a chunk never ends in the
/// middle of a multibyte character. The last chunk may be shorter than
/// `chunk_size`. No trimming or normalization is applied: concatenating the
/// chunks reproduces the input exactly.
///
/// # Example
///
/// ```rust
/// use docreader_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(4);
/// let chunks: Vec<&str> = chunker.chunks("abcdefghij").collect();
/// assert_eq!(chunks, ["abcd", "efgh", "ij"]);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedSizeChunker {
    chunk_size: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// A `chunk_size` of zero is treated as one; [`RagConfig`](crate::RagConfig)
    /// rejects zero before it gets here.
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Lazily split `text` into chunks. Empty text yields no chunks.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        Chunks { remaining: text, chunk_size: self.chunk_size }
    }
}

/// Iterator over the chunks of a text, created by [`FixedSizeChunker::chunks`].
///
/// Cloning the iterator restarts from the clone point, so a sequence can be
/// walked more than once without re-chunking.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    remaining: &'a str,
    chunk_size: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        if self.remaining.is_empty() {
            return None;
        }
        let end = self
            .remaining
            .char_indices()
            .nth(self.chunk_size)
            .map_or(self.remaining.len(), |(offset, _)| offset);
        let (chunk, rest) = self.remaining.split_at(end);
        self.remaining = rest;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.remaining.is_empty() {
            return (0, Some(0));
        }
        // Each char is at most 4 bytes and at least 1.
        let min_chars = self.remaining.len().div_ceil(4);
        (min_chars.div_ceil(self.chunk_size), Some(self.remaining.len().div_ceil(self.chunk_size)))
    }
}

impl FusedIterator for Chunks<'_> {}
