//! # mozaika-ingest
//!
//! Queue consumer for the Mozaika event search service: leases scraped
//! messages from an SQS-compatible queue, runs them through extraction
//! and dedup, persists them, and feeds the vector index.

pub mod consumer;
pub mod queue;

pub use consumer::{Consumer, ConsumerConfig, ConsumerHandle, ConsumerMetrics, Disposition};
pub use queue::{InMemoryQueue, SqsConfig, SqsQueue};
