// Copyright 2025 ProxyRPC Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::registry::{MetricsConfig, MetricsRegistry};
use crate::snapshot::MetricsSnapshot;
use std::sync::Arc;
use std::time::Instant;

/// How a logical call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    /// Stopped on a fault the retry policy classified as terminal
    Terminal,
    /// Every allowed attempt failed with a retryable fault
    Exhausted,
}

/// Trait the retrying invoker reports through.
///
/// One logical call produces one or more `record_attempt` calls, a
/// `record_retry` between consecutive attempts and exactly one `record_call`
/// when it ends.
///
/// # Example
///
/// ```rust
/// use proxyrpc_metrics::{CallOutcome, InvocationMetricsCollector, MetricsCollector};
/// use std::time::Instant;
///
/// let collector = InvocationMetricsCollector::new();
/// let start = Instant::now();
/// collector.record_attempt("reset");
/// collector.record_call("reset", start, CallOutcome::Terminal);
///
/// assert_eq!(collector.snapshot().failed_calls, 1);
/// ```
pub trait MetricsCollector: Send + Sync {
    fn record_attempt(&self, operation: &str);

    fn record_retry(&self, operation: &str);

    /// Records the end of a logical call.
    ///
    /// # Arguments
    /// * `operation` - The operation name
    /// * `start_time` - When the first attempt began
    /// * `outcome` - How the call ended
    fn record_call(&self, operation: &str, start_time: Instant, outcome: CallOutcome);

    /// Records a newly opened channel; `replacing` is set for recreations.
    fn record_channel_created(&self, replacing: bool);

    fn snapshot(&self) -> MetricsSnapshot;
}

/// Metrics collector backed by a [`MetricsRegistry`].
///
/// Every invoker provider owns one by default, so each proxy reports its own
/// figures. Pass a shared registry through [`with_registry`] to aggregate
/// several providers.
///
/// [`with_registry`]: InvocationMetricsCollector::with_registry
#[derive(Debug, Clone)]
pub struct InvocationMetricsCollector {
    registry: Arc<MetricsRegistry>,
}

impl InvocationMetricsCollector {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(MetricsRegistry::new()),
        }
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            registry: Arc::new(MetricsRegistry::with_config(config)),
        }
    }

    pub fn with_registry(registry: Arc<MetricsRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }
}

impl Default for InvocationMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector for InvocationMetricsCollector {
    fn record_attempt(&self, operation: &str) {
        self.registry.record_attempt(operation);
    }

    fn record_retry(&self, operation: &str) {
        self.registry.record_retry(operation);
    }

    fn record_call(&self, operation: &str, start_time: Instant, outcome: CallOutcome) {
        let latency_us = u64::try_from(start_time.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.registry.record_call(operation, latency_us, outcome);
    }

    fn record_channel_created(&self, replacing: bool) {
        self.registry.record_channel_created(replacing);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.registry.snapshot()
    }
}

/// Collector that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetricsCollector;

impl MetricsCollector for NoopMetricsCollector {
    fn record_attempt(&self, _operation: &str) {}

    fn record_retry(&self, _operation: &str) {}

    fn record_call(&self, _operation: &str, _start_time: Instant, _outcome: CallOutcome) {}

    fn record_channel_created(&self, _replacing: bool) {}

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
    }
}
