//! Capability traits for model backends, the vector index, and the queue.
//!
//! Each trait captures one external capability so the pipeline and the API
//! can be wired against test doubles. Implementations live in the
//! mozaika-inference, mozaika-search, and mozaika-ingest crates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{
    Category, Event, EventExtraction, EventSearchResult, QueryIntent, SearchRequest,
    SearchResponse,
};

/// Capability to embed text into vectors.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts.
    ///
    /// Returns one vector per input text, in order. Vectors are
    /// L2-normalized so cosine distance and dot product agree.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_texts(&texts).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::Embedding("Backend returned no vector".to_string()))
    }

    /// The dimension of vectors this backend produces.
    fn dimension(&self) -> usize;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}

/// Capability to generate text from a prompt.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a completion for the given prompt.
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Generate with a separate system prompt.
    async fn generate_with_system(&self, system: &str, prompt: &str) -> Result<String>;

    /// Model identifier for logging.
    fn model_name(&self) -> &str;
}

/// Event storage operations.
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Insert or refresh an event keyed by its dedupe fingerprint.
    /// Returns the event id and whether the row was newly inserted.
    async fn upsert_event(
        &self,
        source_type: &str,
        source_url: &str,
        posted_at: Option<DateTime<Utc>>,
        normalized_text: &str,
        extraction: &EventExtraction,
    ) -> Result<(Uuid, bool)>;

    /// Link an event to the categories named by `slugs`; unknown slugs
    /// are skipped.
    async fn link_categories(&self, event_id: Uuid, slugs: &[String]) -> Result<()>;

    /// All known categories, ordered by slug.
    async fn get_categories(&self) -> Result<Vec<Category>>;

    /// Fetch a single event with its category slugs.
    async fn get_event(&self, id: Uuid) -> Result<Option<Event>>;

    /// Filter search over active events.
    async fn search_events(&self, request: &SearchRequest) -> Result<SearchResponse>;
}

/// A stored-event projection ready for vector indexing.
#[derive(Debug, Clone)]
pub struct IndexableEvent {
    pub event_id: uuid::Uuid,
    /// Concatenated searchable text (title plus normalized body).
    pub content: String,
    /// Metadata payload persisted alongside the vector for filtering
    /// and for building search hits without a second lookup.
    pub metadata: serde_json::Value,
}

/// Capability to index events and retrieve them by semantic similarity.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Insert or replace the vector entry for an event.
    async fn index_event(&self, event: &IndexableEvent, embedding: &[f32]) -> Result<()>;

    /// Retrieve the `top_k` most similar events, constrained by the
    /// structured filters in `intent`.
    async fn search_similar(
        &self,
        query_embedding: &[f32],
        intent: &QueryIntent,
        top_k: usize,
    ) -> Result<Vec<EventSearchResult>>;

    /// Remove an event from the index.
    async fn remove_event(&self, event_id: uuid::Uuid) -> Result<()>;
}

/// A message leased from the queue.
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// Opaque handle used to delete the message after processing.
    pub receipt_handle: String,
    /// Raw message body (JSON).
    pub body: String,
}

/// Capability to lease and delete messages from a work queue.
///
/// Messages are leased with a visibility timeout; a message that is not
/// deleted before the timeout expires is redelivered.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Receive up to `max_messages` messages, long-polling if the queue
    /// is empty.
    async fn receive(&self, max_messages: usize) -> Result<Vec<ReceivedMessage>>;

    /// Delete processed messages by receipt handle.
    async fn delete_batch(&self, receipt_handles: &[String]) -> Result<()>;
}
