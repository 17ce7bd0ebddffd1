//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized names across every
//! subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (search hits) |

/// Subsystem originating the log event.
/// Values: "api", "search", "db", "inference", "ingest"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "consumer", "pool", "extraction", "vector_index"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "upsert_event", "search_similar", "extract_event"
pub const OPERATION: &str = "op";

/// Event UUID being operated on.
pub const EVENT_ID: &str = "event_id";

/// External message identifier from the source queue.
pub const EXTERNAL_ID: &str = "external_id";

/// Search query text.
pub const QUERY: &str = "query";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search or query.
pub const RESULT_COUNT: &str = "result_count";

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
