//! # mozaika-db
//!
//! PostgreSQL storage layer for the Mozaika event search service.
//!
//! This crate provides:
//! - Connection pool management
//! - The event repository (fingerprint-keyed upsert, category links,
//!   filter search with full-text matching)
//! - Idempotent schema setup

pub mod events;
pub mod filter;
pub mod pool;
pub mod schema;

pub use events::PgEventRepository;
pub use filter::{build_order_clause, EventFilterBuilder, QueryParam};
pub use pool::{create_pool, create_pool_with_config, log_pool_metrics, PoolConfig};
pub use schema::ensure_schema;
