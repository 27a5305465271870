//! # Utility Modules
//!
//! Supporting utilities for metrics, logging, timing and deduplication.
//!
//! ## Components
//! - **Metrics**: per-pool atomic counters
//! - **Logging**: `tracing-subscriber` bootstrap from `LoggingConfig`
//! - **Time**: wall-clock timestamps and correlation ids
//! - **Dedup Index**: TTL-bounded identity-keyed store

pub mod dedup_index;
pub mod logging;
pub mod metrics;
pub mod time;

// Re-export public types for advanced users
pub use dedup_index::{DedupIndex, IndexStats};
pub use metrics::{PoolMetrics, PoolMetricsSnapshot};
