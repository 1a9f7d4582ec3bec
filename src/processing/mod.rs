//! Document pipeline: PDF extraction, chunking, retrieval, and generation.

mod chunking;
pub mod pdf;
mod prompts;
mod service;
pub mod types;

pub use service::{RagApi, RagService, RagSettings};
pub use types::{
    Answer, Chunk, ChunkingError, Citation, ConversationTurn, DocumentMetadata, IngestOutcome,
    Page, ProcessingError, TurnRole,
};
