//! # mozaika-core
//!
//! Core types, traits, and abstractions for the Mozaika event search service.
//!
//! This crate provides the foundational data structures and trait definitions
//! that the other mozaika crates depend on: the event data model, the
//! capability traits for model backends and the message queue, the shared
//! error type, configuration loading, and the pure text utilities used by
//! the ingestion pipeline (normalization and fingerprinting).

pub mod config;
pub mod defaults;
pub mod error;
pub mod fingerprint;
pub mod logging;
pub mod models;
pub mod text;
pub mod traits;

// Re-export commonly used types at crate root
pub use config::Settings;
pub use error::{Error, Result};
pub use fingerprint::fingerprint;
pub use models::*;
pub use text::normalize;
pub use traits::*;
