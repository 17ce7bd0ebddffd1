//! # mozaika-inference
//!
//! Model backends and LLM extraction for the Mozaika event search service.
//!
//! This crate provides:
//! - OpenAI-compatible and Anthropic generation backends with capacity
//!   failures classified at the provider boundary
//! - A local ONNX embedding backend (multilingual-e5) and an OpenAI one
//! - The extraction client: event extraction with retry and backoff, and
//!   query understanding for AI search
//! - Mock backends for deterministic tests

pub mod anthropic;
pub mod extraction;
#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod mock;
pub mod openai;
pub mod selector;
mod util;

pub use anthropic::{AnthropicBackend, AnthropicConfig};
pub use extraction::ExtractionClient;
#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbeddingBackend;
pub use mock::{MockEmbeddingBackend, MockGenerationBackend};
pub use openai::{OpenAIBackend, OpenAIConfig};
pub use selector::{create_embedding_backend, create_generation_backend};
