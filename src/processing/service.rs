//! RAG service coordinating extraction, chunking, embedding, retrieval, and generation.

use crate::{
    config::{Config, LengthUnit},
    embedding::{EmbeddingClient, EmbeddingClientError, get_embedding_client},
    llm::{ChatClient, get_chat_client},
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        chunking::{ChunkSettings, LengthCounter, build_length_counter, chunk_pages},
        pdf::{ensure_pdf_filename, extract_pages},
        prompts::{build_qa_messages, build_summary_messages},
        types::{
            Answer, Citation, ConversationTurn, DocumentMetadata, IngestOutcome, Page,
            ProcessingError,
        },
    },
    store::{DocumentStore, StoredDocument},
    vector_index::InMemoryVectorIndex,
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

/// Tunables for ingestion and retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RagSettings {
    /// Target chunk length in `length_unit`s.
    pub chunk_size: usize,
    /// Units shared between neighbouring chunks of a page.
    pub chunk_overlap: usize,
    /// How chunk length is measured.
    pub length_unit: LengthUnit,
    /// Chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Leading pages fed to the summarizer.
    pub summary_page_limit: usize,
    /// Texts sent per embedding request.
    pub embedding_batch_size: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            length_unit: LengthUnit::Characters,
            retrieval_top_k: 4,
            summary_page_limit: 5,
            embedding_batch_size: 64,
        }
    }
}

impl RagSettings {
    /// Resolve settings from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            length_unit: config.text_splitter_length,
            retrieval_top_k: config.retrieval_top_k,
            summary_page_limit: config.summary_page_limit,
            embedding_batch_size: config.embedding_batch_size,
        }
    }

    fn chunk_settings(&self) -> ChunkSettings {
        ChunkSettings {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
        }
    }
}

/// Owns the provider clients, the document store, and the metrics registry.
///
/// Construct once near process start and share through an `Arc`.
pub struct RagService {
    embedding_client: Box<dyn EmbeddingClient>,
    chat_client: Box<dyn ChatClient>,
    store: DocumentStore,
    settings: RagSettings,
    length_counter: LengthCounter,
    metrics: Arc<ServiceMetrics>,
}

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Validate, extract, chunk, embed, and register an uploaded PDF.
    async fn ingest_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, ProcessingError>;

    /// Answer `question` from the document's most relevant chunks.
    async fn ask(
        &self,
        doc_id: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, ProcessingError>;

    /// Summarize the document's leading pages.
    async fn summarize(&self, doc_id: &str) -> Result<String, ProcessingError>;

    /// Drop the document, returning whether it was resident.
    async fn delete(&self, doc_id: &str) -> Result<bool, ProcessingError>;

    /// Metadata for every resident document.
    async fn list_documents(&self) -> Vec<DocumentMetadata>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl RagService {
    /// Build the service from configuration, initializing provider clients.
    pub fn new(config: &Config) -> Result<Self, ProcessingError> {
        tracing::info!(
            provider = ?config.embedding_provider,
            model = %config.embedding_model,
            "Initializing embedding client"
        );
        let embedding_client = get_embedding_client(config)?;
        tracing::info!(
            provider = ?config.chat_provider,
            model = %config.chat_model,
            "Initializing chat client"
        );
        let chat_client = get_chat_client(config)?;
        Self::with_clients(
            embedding_client,
            chat_client,
            RagSettings::from_config(config),
        )
    }

    /// Build the service around explicit clients.
    pub fn with_clients(
        embedding_client: Box<dyn EmbeddingClient>,
        chat_client: Box<dyn ChatClient>,
        settings: RagSettings,
    ) -> Result<Self, ProcessingError> {
        let length_counter = build_length_counter(settings.length_unit)?;
        Ok(Self {
            embedding_client,
            chat_client,
            store: DocumentStore::new(),
            settings,
            length_counter,
            metrics: Arc::new(ServiceMetrics::new()),
        })
    }

    /// Validate and extract an uploaded PDF, then index its pages.
    pub async fn ingest_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, ProcessingError> {
        ensure_pdf_filename(filename)?;
        let sha256 = hex::encode(Sha256::digest(&bytes));
        tracing::info!(filename, bytes = bytes.len(), "Processing upload");

        let pages = extract_pages(bytes).await?;
        tracing::debug!(filename, pages = pages.len(), "Extracted pages");
        self.index_pages(filename, sha256, pages).await
    }

    /// Chunk, embed, and register already-extracted pages.
    ///
    /// Nothing is registered when the pages yield no chunks.
    pub async fn index_pages(
        &self,
        filename: &str,
        sha256: String,
        pages: Vec<Page>,
    ) -> Result<IngestOutcome, ProcessingError> {
        let chunks = chunk_pages(&pages, self.settings.chunk_settings(), &self.length_counter)?;
        if chunks.is_empty() {
            tracing::warn!(filename, pages = pages.len(), "No extractable text");
            return Err(ProcessingError::EmptyDocument);
        }

        let chunk_count = chunks.len();
        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embed_batched(texts).await?;
        let index = InMemoryVectorIndex::build(chunks, embeddings)?;

        let doc_id = Uuid::new_v4().to_string();
        let page_count = pages.len();
        let metadata = DocumentMetadata {
            doc_id: doc_id.clone(),
            filename: filename.to_string(),
            page_count,
            chunk_count,
            sha256,
            uploaded_at: upload_timestamp(),
        };
        self.store
            .insert(StoredDocument {
                metadata,
                pages,
                index: Box::new(index),
            })
            .await;

        self.metrics.record_document(chunk_count as u64);
        tracing::info!(
            doc_id = %doc_id,
            pages = page_count,
            chunks = chunk_count,
            "Document indexed"
        );

        Ok(IngestOutcome {
            doc_id,
            page_count,
            chunk_count,
        })
    }

    /// Answer a question against a resident document.
    pub async fn ask(
        &self,
        doc_id: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, ProcessingError> {
        let document = self.resident(doc_id).await?;
        let question = question.trim();
        if question.is_empty() {
            return Err(ProcessingError::InvalidRequest(
                "Question must not be empty.".to_string(),
            ));
        }

        let vector = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?
            .pop()
            .ok_or_else(|| {
                EmbeddingClientError::InvalidResponse("no vector for question".to_string())
            })?;
        let hits = document.index.query(&vector, self.settings.retrieval_top_k)?;
        tracing::debug!(doc_id, hits = hits.len(), "Retrieved context");

        let messages = build_qa_messages(&hits, history, question);
        let answer = self.chat_client.complete(messages).await?;
        self.metrics.record_question();

        let citations = hits
            .into_iter()
            .map(|hit| Citation {
                page: hit.chunk.page,
                content: hit.chunk.text,
            })
            .collect();
        Ok(Answer { answer, citations })
    }

    /// Summarize the leading pages of a resident document.
    pub async fn summarize(&self, doc_id: &str) -> Result<String, ProcessingError> {
        let document = self.resident(doc_id).await?;
        let limit = self.settings.summary_page_limit.max(1);
        let leading = &document.pages[..document.pages.len().min(limit)];

        tracing::debug!(doc_id, pages = leading.len(), "Summarizing");
        let summary = self
            .chat_client
            .complete(build_summary_messages(leading))
            .await?;
        self.metrics.record_summary();
        Ok(summary)
    }

    /// Remove a document and its index.
    pub async fn delete(&self, doc_id: &str) -> bool {
        let removed = self.store.remove(doc_id).await;
        if removed {
            self.metrics.record_deletion();
            tracing::info!(doc_id, "Document deleted");
        } else {
            tracing::debug!(doc_id, "Delete of absent document");
        }
        removed
    }

    /// Metadata for every resident document.
    pub async fn list_documents(&self) -> Vec<DocumentMetadata> {
        self.store.list().await
    }

    /// Return a snapshot of the service counters.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    async fn resident(&self, doc_id: &str) -> Result<Arc<StoredDocument>, ProcessingError> {
        self.store
            .get(doc_id)
            .await
            .ok_or_else(|| ProcessingError::DocumentNotFound(doc_id.to_string()))
    }

    async fn embed_batched(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, ProcessingError> {
        let batch_size = self.settings.embedding_batch_size.max(1);
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(batch_size) {
            let vectors = self
                .embedding_client
                .generate_embeddings(batch.to_vec())
                .await?;
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }
}

fn upload_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    let now = now.replace_nanosecond(0).unwrap_or(now);
    now.format(&Rfc3339)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest_pdf(
        &self,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<IngestOutcome, ProcessingError> {
        RagService::ingest_pdf(self, filename, bytes).await
    }

    async fn ask(
        &self,
        doc_id: &str,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<Answer, ProcessingError> {
        RagService::ask(self, doc_id, question, history).await
    }

    async fn summarize(&self, doc_id: &str) -> Result<String, ProcessingError> {
        RagService::summarize(self, doc_id).await
    }

    async fn delete(&self, doc_id: &str) -> Result<bool, ProcessingError> {
        Ok(RagService::delete(self, doc_id).await)
    }

    async fn list_documents(&self) -> Vec<DocumentMetadata> {
        RagService::list_documents(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}
