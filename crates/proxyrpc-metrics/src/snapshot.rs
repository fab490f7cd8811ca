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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metrics for a single operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationMetrics {
    /// Logical calls that finished (one per thunk, however many attempts)
    pub call_count: u64,
    pub success_count: u64,
    /// Calls that stopped on a non-retryable fault
    pub terminal_count: u64,
    /// Calls that ran out of attempts
    pub exhausted_count: u64,
    pub attempt_count: u64,
    pub retry_count: u64,
    pub avg_latency_us: u64,
    pub p50_latency_us: u64,
    pub p95_latency_us: u64,
    pub p99_latency_us: u64,
}

impl OperationMetrics {
    pub fn failure_count(&self) -> u64 {
        self.terminal_count + self.exhausted_count
    }
}

/// Complete metrics snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    pub total_attempts: u64,
    pub total_retries: u64,
    /// Channels opened, including the first one
    pub channel_creations: u64,
    /// Channels opened to replace a faulted one
    pub channel_recreations: u64,
    pub uptime_ms: u64,
    pub operations: HashMap<String, OperationMetrics>,
}

impl MetricsSnapshot {
    /// Serializes the snapshot for logging or export.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}
