//! Core data types and error definitions for the document pipeline.

use crate::{embedding::EmbeddingClientError, llm::ChatClientError, vector_index::IndexError};
use anyhow::Error as TokenizerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while splitting pages into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible length budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors emitted by the document pipeline.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Upload was rejected before processing (wrong type, missing field, unreadable body).
    #[error("{0}")]
    InvalidUpload(String),
    /// Request parameters were unusable.
    #[error("{0}")]
    InvalidRequest(String),
    /// The PDF yielded no extractable text.
    #[error("No extractable text found. The PDF might be a scanned image.")]
    EmptyDocument,
    /// The identifier is not registered.
    #[error("Document not found. Please upload it again.")]
    DocumentNotFound(String),
    /// The PDF could not be parsed.
    #[error("Failed to extract text from PDF: {0}")]
    Extraction(String),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors for the input text.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index rejected the embeddings or query.
    #[error("Vector index error: {0}")]
    Index(#[from] IndexError),
    /// Chat provider failed to produce a completion.
    #[error("Failed to generate completion: {0}")]
    Generation(#[from] ChatClientError),
    /// Local I/O failed while staging the upload.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One page of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 1-based page number.
    pub number: u32,
    /// Normalized page text.
    pub text: String,
}

/// A bounded, overlapping slice of a page, the unit of embedding and retrieval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Index of the chunk within its document.
    pub position: usize,
    /// Page the chunk was cut from.
    pub page: u32,
    /// Literal text slice of the page.
    pub text: String,
}

/// Descriptive metadata for a resident document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    /// Generated identifier.
    pub doc_id: String,
    /// Filename supplied with the upload.
    pub filename: String,
    /// Extracted page count.
    pub page_count: usize,
    /// Chunks indexed for retrieval.
    pub chunk_count: usize,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
    /// RFC 3339 upload time, whole seconds.
    pub uploaded_at: String,
}

/// Speaker of a prior conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// End user.
    User,
    /// Model response.
    Assistant,
    /// Anything else; ignored when rebuilding history.
    #[serde(other)]
    Other,
}

/// Prior turn supplied by the caller with each question.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationTurn {
    /// Who spoke.
    pub role: TurnRole,
    /// What was said.
    pub content: String,
}

/// Provenance for an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Citation {
    /// 1-based page number of the retrieved chunk.
    pub page: u32,
    /// Literal chunk text.
    pub content: String,
}

/// Generated answer with the chunks it was conditioned on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    /// Model output.
    pub answer: String,
    /// Retrieved chunks, most relevant first.
    pub citations: Vec<Citation>,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Identifier to use for questions, summaries, and deletion.
    pub doc_id: String,
    /// Extracted page count.
    pub page_count: usize,
    /// Chunks indexed.
    pub chunk_count: usize,
}
