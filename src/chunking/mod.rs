//! Sliding-window chunking over normalized document text.
//!
//! Chunks are measured in characters, never bytes, so multi-byte text cannot be split inside a
//! code point. Consecutive chunks from the same document share exactly the configured overlap;
//! only the final chunk may fall short of the maximum size. Stripping the overlap from every
//! chunk after the first and concatenating reconstructs the document text.

use sha2::{Digest, Sha256};

use crate::config::{ConfigError, validate_chunking};
use crate::ingest::Document;

/// Bounded text segment derived from a document; the unit of retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Identifier of the owning document (back-reference, not ownership).
    pub doc_id: String,
    /// Position of this chunk within the document, starting at zero.
    pub seq: usize,
    /// Chunk text.
    pub text: String,
}

impl Chunk {
    /// Stable identity of the chunk within the corpus.
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            doc_id: self.doc_id.clone(),
            seq: self.seq,
        }
    }
}

/// Identity of a chunk: owning document plus position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkKey {
    /// Owning document identifier.
    pub doc_id: String,
    /// Chunk position within the document.
    pub seq: usize,
}

/// Compute a stable SHA-256 digest of chunk text, hex encoded.
///
/// Used by the index to detect unchanged chunks during re-ingestion.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// Lazy, restartable iterator over a document's chunks.
///
/// Produced by [`chunk_document`]; iterating never allocates more than the chunk being yielded.
/// Cloning restarts the sequence from the beginning.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    doc_id: &'a str,
    text: &'a str,
    /// Byte offset of each char start, with a final sentinel at `text.len()`.
    boundaries: Vec<usize>,
    max_chars: usize,
    stride: usize,
    next_start: usize,
    seq: usize,
    done: bool,
}

impl Iterator for Chunks<'_> {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.done {
            return None;
        }

        let total = self.boundaries.len() - 1;
        let start = self.next_start;
        let end = (start + self.max_chars).min(total);
        let text = &self.text[self.boundaries[start]..self.boundaries[end]];

        let chunk = Chunk {
            doc_id: self.doc_id.to_string(),
            seq: self.seq,
            text: text.to_string(),
        };

        if end == total {
            self.done = true;
        } else {
            self.next_start = start + self.stride;
            self.seq += 1;
        }

        Some(chunk)
    }
}

/// Chunk a document into overlapping character windows.
///
/// Returns a [`ConfigError`] when `max_chars` is zero or `overlap >= max_chars`; the same
/// validation runs at startup, so hitting it here means the caller bypassed configuration.
/// A document whose text fits within `max_chars` yields exactly one chunk; empty text yields
/// none (ingestion rejects empty documents before they get here).
pub fn chunk_document<'a>(
    document: &'a Document,
    max_chars: usize,
    overlap: usize,
) -> Result<Chunks<'a>, ConfigError> {
    chunk_text(&document.id, &document.text, max_chars, overlap)
}

/// Lower-level chunker over an identifier and raw text.
pub fn chunk_text<'a>(
    doc_id: &'a str,
    text: &'a str,
    max_chars: usize,
    overlap: usize,
) -> Result<Chunks<'a>, ConfigError> {
    validate_chunking(max_chars, overlap)?;

    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());

    Ok(Chunks {
        doc_id,
        text,
        boundaries,
        max_chars,
        stride: max_chars - overlap,
        next_start: 0,
        seq: 0,
        done: text.is_empty(),
    })
}
