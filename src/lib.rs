#![deny(missing_docs)]

//! Core library for the research assistant: PDF ingestion, retrieval, and grounded answers.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat completion client abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Processing counters.
pub mod metrics;
/// Document pipeline: extraction, chunking, retrieval, generation.
pub mod processing;
/// In-memory registry of indexed documents.
pub mod store;
/// Similarity search over chunk embeddings.
pub mod vector_index;
