//! Default values shared across the workspace.

/// Embedding vector dimension (multilingual-e5-small).
pub const EMBED_DIMENSION: usize = 384;

/// Default number of results for AI search.
pub const DEFAULT_TOP_K: usize = 12;

/// Default page size for filter search.
pub const DEFAULT_PAGE_SIZE: i64 = 20;

/// Maximum page size for filter search.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Default number of extraction attempts before giving up.
pub const MAX_EXTRACTION_RETRIES: u32 = 3;

/// Default queue batch size (also the per-batch concurrency ceiling).
pub const QUEUE_BATCH_SIZE: usize = 10;

/// Default long-poll wait in seconds.
pub const QUEUE_POLL_WAIT_SECS: u64 = 20;

/// Default message visibility timeout in seconds.
pub const QUEUE_VISIBILITY_TIMEOUT_SECS: u64 = 300;

/// Source type assumed when a message carries no metadata override.
pub const DEFAULT_SOURCE_TYPE: &str = "telegram";

/// Event status eligible for search.
pub const STATUS_ACTIVE: &str = "active";
