//! ProxyRPC Metrics Collection
//!
//! This crate records what the retrying invoker does on behalf of every
//! proxy: how many logical calls were made per operation, how many attempts
//! and retries they took, how they ended and how long they ran. It also
//! counts channel creations so channel churn is visible.
//!
//! # Architecture
//!
//! - [`MetricsRegistry`]: Thread-safe storage with lock-free counters
//! - [`MetricsCollector`]: Trait the invoker reports through
//! - [`MetricsSnapshot`]: Serializable point-in-time copy of the registry
//!
//! # Usage Example
//!
//! ```rust
//! use proxyrpc_metrics::{CallOutcome, InvocationMetricsCollector, MetricsCollector};
//! use std::time::Instant;
//!
//! let collector = InvocationMetricsCollector::new();
//!
//! let start = Instant::now();
//! collector.record_attempt("get_value");
//! collector.record_retry("get_value");
//! collector.record_attempt("get_value");
//! collector.record_call("get_value", start, CallOutcome::Success);
//!
//! let snapshot = collector.snapshot();
//! assert_eq!(snapshot.total_calls, 1);
//! assert_eq!(snapshot.operations["get_value"].attempt_count, 2);
//! ```
//!
//! # Thread Safety
//!
//! Counter increments are atomic. The operation table sits behind a
//! `parking_lot::RwLock` that is only written when a new operation name is
//! first seen.

mod collector;
mod registry;
mod snapshot;

pub use collector::{CallOutcome, InvocationMetricsCollector, MetricsCollector, NoopMetricsCollector};
pub use registry::{MetricsConfig, MetricsRegistry};
pub use snapshot::{MetricsSnapshot, OperationMetrics};
