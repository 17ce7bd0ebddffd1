//! Queue consumer driving the ingestion pipeline.
//!
//! Each message runs through parse, normalize, extract, upsert, and index.
//! The disposition decides the message's fate: handled messages are
//! deleted, everything else stays leased and redelivers after the
//! visibility timeout. Transient failures (provider rate limits, storage
//! or index errors) redeliver; terminal outcomes (malformed bodies,
//! text the model rejects as a non-event) are deleted so they never loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use mozaika_core::{
    defaults, normalize, EmbeddingBackend, EventExtraction, EventRepository, IndexableEvent,
    MessageQueue, QueueMessage, ReceivedMessage, VectorIndex,
};
use mozaika_inference::ExtractionClient;

/// What to do with a message after a processing attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Delete the message; reprocessing it would change nothing.
    Handled,
    /// Leave the message leased so it redelivers later.
    Redeliver,
}

/// Consumer tuning knobs.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Messages fetched per poll, processed concurrently.
    pub batch_size: usize,
    /// Pause after a queue receive error.
    pub error_pause: Duration,
    /// Pause after an empty poll. Long polling already waits on the
    /// queue side; this only throttles queues that answer immediately.
    pub idle_pause: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: defaults::QUEUE_BATCH_SIZE,
            error_pause: Duration::from_secs(5),
            idle_pause: Duration::from_secs(1),
        }
    }
}

/// Running counters, shared with the API for the health endpoint.
#[derive(Default)]
pub struct ConsumerMetrics {
    processed: AtomicU64,
    errors: AtomicU64,
    duplicates: AtomicU64,
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    pub processed: u64,
    pub errors: u64,
    pub duplicates: u64,
}

impl ConsumerMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }

    fn record_processed(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    fn record_duplicate(&self) {
        self.duplicates.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to a running consumer.
pub struct ConsumerHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl ConsumerHandle {
    /// Signal shutdown and wait for in-flight work to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.task.await;
    }
}

/// The ingestion consumer.
pub struct Consumer {
    queue: Arc<dyn MessageQueue>,
    repository: Arc<dyn EventRepository>,
    extraction: Arc<ExtractionClient>,
    embeddings: Arc<dyn EmbeddingBackend>,
    index: Arc<dyn VectorIndex>,
    config: ConsumerConfig,
    metrics: Arc<ConsumerMetrics>,
}

impl Consumer {
    pub fn new(
        queue: Arc<dyn MessageQueue>,
        repository: Arc<dyn EventRepository>,
        extraction: Arc<ExtractionClient>,
        embeddings: Arc<dyn EmbeddingBackend>,
        index: Arc<dyn VectorIndex>,
        config: ConsumerConfig,
    ) -> Self {
        Self {
            queue,
            repository,
            extraction,
            embeddings,
            index,
            config,
            metrics: Arc::new(ConsumerMetrics::default()),
        }
    }

    /// Shared counters, for the health endpoint.
    pub fn metrics(&self) -> Arc<ConsumerMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Spawn the poll loop and return a shutdown handle.
    pub fn start(self: Arc<Self>) -> ConsumerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let consumer = self;
        let task = tokio::spawn(async move {
            consumer.run(&mut shutdown_rx).await;
        });
        ConsumerHandle { shutdown_tx, task }
    }

    async fn run(self: &Arc<Self>, shutdown_rx: &mut mpsc::Receiver<()>) {
        info!(
            subsystem = "ingest",
            component = "consumer",
            batch_size = self.config.batch_size,
            "Consumer started"
        );

        loop {
            let messages = tokio::select! {
                _ = shutdown_rx.recv() => break,
                result = self.queue.receive(self.config.batch_size) => match result {
                    Ok(messages) => messages,
                    Err(e) => {
                        error!(
                            subsystem = "ingest",
                            component = "consumer",
                            op = "receive",
                            error_msg = %e,
                            "Queue receive failed"
                        );
                        tokio::select! {
                            _ = shutdown_rx.recv() => break,
                            _ = tokio::time::sleep(self.config.error_pause) => {}
                        }
                        continue;
                    }
                },
            };

            if messages.is_empty() {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = tokio::time::sleep(self.config.idle_pause) => {}
                }
                continue;
            }
            self.process_batch(messages).await;
        }

        let metrics = self.metrics.snapshot();
        info!(
            subsystem = "ingest",
            component = "consumer",
            processed = metrics.processed,
            errors = metrics.errors,
            duplicates = metrics.duplicates,
            "Consumer stopped"
        );
    }

    /// Process one received batch concurrently and delete what was handled.
    pub async fn process_batch(self: &Arc<Self>, messages: Vec<ReceivedMessage>) {
        let mut tasks = JoinSet::new();
        for message in messages {
            let consumer = Arc::clone(self);
            tasks.spawn(async move {
                let disposition = consumer.process_message(&message.body).await;
                (message.receipt_handle, disposition)
            });
        }

        let mut to_delete = Vec::new();
        while let Some(result) = tasks.join_next().await {
            match result {
                Ok((receipt_handle, Disposition::Handled)) => to_delete.push(receipt_handle),
                Ok((_, Disposition::Redeliver)) => {}
                Err(e) => {
                    error!(
                        subsystem = "ingest",
                        component = "consumer",
                        error_msg = %e,
                        "Message task panicked"
                    );
                }
            }
        }

        if !to_delete.is_empty() {
            if let Err(e) = self.queue.delete_batch(&to_delete).await {
                error!(
                    subsystem = "ingest",
                    component = "consumer",
                    op = "delete_batch",
                    error_msg = %e,
                    "Failed to delete handled messages"
                );
            }
        }
    }

    /// Run one message body through the pipeline and decide its fate.
    pub async fn process_message(&self, body: &str) -> Disposition {
        let message = match QueueMessage::parse(body) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "consumer",
                    op = "parse",
                    error_msg = %e,
                    "Dropping malformed message"
                );
                self.metrics.record_error();
                return Disposition::Handled;
            }
        };

        let normalized = normalize(&message.text);
        if normalized.is_empty() {
            warn!(
                subsystem = "ingest",
                component = "consumer",
                external_id = %message.external_id,
                "Dropping message with empty text"
            );
            self.metrics.record_error();
            return Disposition::Handled;
        }

        let extraction = match self.extraction.extract_event(&normalized).await {
            Ok(Some(extraction)) => extraction,
            Ok(None) => {
                warn!(
                    subsystem = "ingest",
                    component = "consumer",
                    op = "extract",
                    external_id = %message.external_id,
                    "Extraction produced nothing usable, dropping message"
                );
                self.metrics.record_error();
                return Disposition::Handled;
            }
            Err(e) => {
                warn!(
                    subsystem = "ingest",
                    component = "consumer",
                    op = "extract",
                    external_id = %message.external_id,
                    error_msg = %e,
                    "Extraction unavailable, message will redeliver"
                );
                return Disposition::Redeliver;
            }
        };

        let content = format!("{}\n\n{}", extraction.title, normalized);
        let embedding = match self.embeddings.embed_text(&content).await {
            Ok(embedding) => embedding,
            Err(e) => {
                error!(
                    subsystem = "ingest",
                    component = "consumer",
                    op = "embed",
                    external_id = %message.external_id,
                    error_msg = %e,
                    "Embedding failed, message will redeliver"
                );
                self.metrics.record_error();
                return Disposition::Redeliver;
            }
        };

        let source_url = message.source_url();
        let (event_id, is_new) = match self
            .repository
            .upsert_event(
                &message.source_type(),
                &source_url,
                message.posted_at,
                &normalized,
                &extraction,
            )
            .await
        {
            Ok(result) => result,
            Err(e) => {
                error!(
                    subsystem = "ingest",
                    component = "consumer",
                    op = "upsert",
                    external_id = %message.external_id,
                    error_msg = %e,
                    "Event upsert failed, message will redeliver"
                );
                self.metrics.record_error();
                return Disposition::Redeliver;
            }
        };

        if !is_new {
            debug!(
                subsystem = "ingest",
                component = "consumer",
                event_id = %event_id,
                external_id = %message.external_id,
                "Duplicate event refreshed"
            );
            self.metrics.record_duplicate();
            self.metrics.record_processed();
            return Disposition::Handled;
        }

        if let Err(e) = self
            .repository
            .link_categories(event_id, &extraction.categories_slugs)
            .await
        {
            error!(
                subsystem = "ingest",
                component = "consumer",
                op = "link_categories",
                event_id = %event_id,
                error_msg = %e,
                "Category linking failed, message will redeliver"
            );
            self.metrics.record_error();
            return Disposition::Redeliver;
        }

        let entry = IndexableEvent {
            event_id,
            content,
            metadata: index_metadata(&message, &extraction, &source_url),
        };
        if let Err(e) = self.index.index_event(&entry, &embedding).await {
            error!(
                subsystem = "ingest",
                component = "consumer",
                op = "index",
                event_id = %event_id,
                error_msg = %e,
                "Vector indexing failed, message will redeliver"
            );
            self.metrics.record_error();
            return Disposition::Redeliver;
        }

        info!(
            subsystem = "ingest",
            component = "consumer",
            op = "process_message",
            event_id = %event_id,
            external_id = %message.external_id,
            "Event ingested"
        );
        self.metrics.record_processed();
        Disposition::Handled
    }
}

/// Filterable projection stored next to the vector.
///
/// The `status` key must be present: the index only serves rows whose
/// metadata says they are active.
fn index_metadata(
    message: &QueueMessage,
    extraction: &EventExtraction,
    source_url: &str,
) -> serde_json::Value {
    serde_json::json!({
        "title": extraction.title,
        "city": extraction.city,
        "country": extraction.country,
        "language": extraction.language,
        "is_remote": extraction.is_remote,
        "source_url": source_url,
        "posted_at": message.posted_at,
        "occurs_from": extraction.occurs_from,
        "occurs_to": extraction.occurs_to,
        "deadline_at": extraction.deadline_at,
        "status": extraction.status,
        "categories_slugs": extraction.categories_slugs,
    })
}
