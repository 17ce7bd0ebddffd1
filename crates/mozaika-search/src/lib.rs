//! # mozaika-search
//!
//! Vector index and hybrid AI search for the Mozaika event search service.
//!
//! This crate provides:
//! - `PgVectorIndex`: pgvector-backed similarity search with jsonb
//!   metadata filtering
//! - Profile re-ranking (pure scoring functions)
//! - `HybridSearchEngine`: query understanding, retrieval, re-ranking,
//!   and answer synthesis

pub mod hybrid;
pub mod index;
pub mod rerank;

pub use hybrid::HybridSearchEngine;
pub use index::PgVectorIndex;
pub use rerank::{apply_profile, match_tier, profile_score};
