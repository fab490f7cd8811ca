use crate::collector::CallOutcome;
use crate::snapshot::{MetricsSnapshot, OperationMetrics};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

const NUM_HISTOGRAM_BINS: usize = 100;

/// Size limits for the operation table.
///
/// # Example
///
/// ```rust
/// use proxyrpc_metrics::{MetricsConfig, MetricsRegistry};
///
/// let registry = MetricsRegistry::with_config(MetricsConfig { max_operations: 64 });
/// assert_eq!(registry.operation_count(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Maximum number of distinct operation names to track
    ///
    /// When exceeded, the least recently used operation is evicted.
    pub max_operations: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_operations: 1000,
        }
    }
}

/// Logarithmic latency histogram.
///
/// Each decade (1-9us, 10-99us, ...) is split into nine bins by its leading
/// digit, so resolution is roughly 10% at every scale. Percentiles report the
/// upper bound of the bin they fall in.
#[derive(Debug)]
struct LatencyHistogram {
    bins: [AtomicU64; NUM_HISTOGRAM_BINS],
    total_latency: AtomicU64,
    sample_count: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            bins: std::array::from_fn(|_| AtomicU64::new(0)),
            total_latency: AtomicU64::new(0),
            sample_count: AtomicU64::new(0),
        }
    }

    fn record(&self, latency_us: u64) {
        self.bins[Self::latency_to_bin(latency_us)].fetch_add(1, Ordering::Relaxed);
        self.total_latency.fetch_add(latency_us, Ordering::Relaxed);
        self.sample_count.fetch_add(1, Ordering::Relaxed);
    }

    fn latency_to_bin(latency_us: u64) -> usize {
        if latency_us == 0 {
            return 0;
        }
        let decade = latency_us.ilog10();
        let leading = latency_us / 10u64.pow(decade);
        (decade as usize * 10 + leading as usize).min(NUM_HISTOGRAM_BINS - 1)
    }

    /// Exclusive upper bound of a bin.
    fn bin_upper_bound(bin: usize) -> u64 {
        let decade = (bin / 10) as u32;
        let leading = (bin % 10) as u64;
        10u64.saturating_pow(decade).saturating_mul(leading + 1)
    }

    fn percentile(&self, percentile: u64) -> u64 {
        let total = self.sample_count.load(Ordering::Relaxed);
        if total == 0 {
            return 0;
        }

        let target = ((total * percentile).div_ceil(100)).max(1);
        let mut cumulative = 0;
        for (bin, count) in self.bins.iter().enumerate() {
            cumulative += count.load(Ordering::Relaxed);
            if cumulative >= target {
                return Self::bin_upper_bound(bin);
            }
        }
        Self::bin_upper_bound(NUM_HISTOGRAM_BINS - 1)
    }

    /// `(avg, p50, p95, p99)` in microseconds.
    fn summary(&self) -> (u64, u64, u64, u64) {
        let total = self.sample_count.load(Ordering::Relaxed);
        if total == 0 {
            return (0, 0, 0, 0);
        }
        let avg = self.total_latency.load(Ordering::Relaxed) / total;
        (
            avg,
            self.percentile(50),
            self.percentile(95),
            self.percentile(99),
        )
    }
}

/// Per-operation counters.
#[derive(Debug)]
struct OperationStats {
    call_count: AtomicU64,
    success_count: AtomicU64,
    terminal_count: AtomicU64,
    exhausted_count: AtomicU64,
    attempt_count: AtomicU64,
    retry_count: AtomicU64,
    latencies: LatencyHistogram,
    last_access: AtomicU64,
}

impl OperationStats {
    fn new(tick: u64) -> Self {
        Self {
            call_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            terminal_count: AtomicU64::new(0),
            exhausted_count: AtomicU64::new(0),
            attempt_count: AtomicU64::new(0),
            retry_count: AtomicU64::new(0),
            latencies: LatencyHistogram::new(),
            last_access: AtomicU64::new(tick),
        }
    }

    fn snapshot(&self) -> OperationMetrics {
        let (avg_latency_us, p50_latency_us, p95_latency_us, p99_latency_us) =
            self.latencies.summary();

        OperationMetrics {
            call_count: self.call_count.load(Ordering::Relaxed),
            success_count: self.success_count.load(Ordering::Relaxed),
            terminal_count: self.terminal_count.load(Ordering::Relaxed),
            exhausted_count: self.exhausted_count.load(Ordering::Relaxed),
            attempt_count: self.attempt_count.load(Ordering::Relaxed),
            retry_count: self.retry_count.load(Ordering::Relaxed),
            avg_latency_us,
            p50_latency_us,
            p95_latency_us,
            p99_latency_us,
        }
    }
}

/// Central store for invocation metrics.
///
/// Global counters and per-operation counters are plain atomics updated with
/// `Ordering::Relaxed`; snapshots are best effort and may observe a call's
/// counters mid-update.
///
/// # Example
///
/// ```rust
/// use proxyrpc_metrics::{CallOutcome, MetricsRegistry};
///
/// let registry = MetricsRegistry::new();
/// registry.record_attempt("ping");
/// registry.record_call("ping", 120, CallOutcome::Success);
///
/// let snapshot = registry.snapshot();
/// assert_eq!(snapshot.successful_calls, 1);
/// ```
#[derive(Debug)]
pub struct MetricsRegistry {
    total_calls: AtomicU64,
    successful_calls: AtomicU64,
    failed_calls: AtomicU64,
    total_attempts: AtomicU64,
    total_retries: AtomicU64,
    channel_creations: AtomicU64,
    channel_recreations: AtomicU64,
    operations: RwLock<HashMap<String, Arc<OperationStats>>>,
    /// Logical clock for LRU eviction
    clock: AtomicU64,
    config: MetricsConfig,
    start_time: Instant,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            successful_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            total_attempts: AtomicU64::new(0),
            total_retries: AtomicU64::new(0),
            channel_creations: AtomicU64::new(0),
            channel_recreations: AtomicU64::new(0),
            operations: RwLock::new(HashMap::new()),
            clock: AtomicU64::new(0),
            config,
            start_time: Instant::now(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the stats entry for `operation`, creating it if needed.
    fn operation(&self, operation: &str) -> Arc<OperationStats> {
        let tick = self.tick();

        if let Some(stats) = self.operations.read().get(operation) {
            stats.last_access.store(tick, Ordering::Relaxed);
            return Arc::clone(stats);
        }

        let mut operations = self.operations.write();
        if let Some(stats) = operations.get(operation) {
            stats.last_access.store(tick, Ordering::Relaxed);
            return Arc::clone(stats);
        }

        if operations.len() >= self.config.max_operations.max(1) {
            let oldest = operations
                .iter()
                .min_by_key(|(_, stats)| stats.last_access.load(Ordering::Relaxed))
                .map(|(name, _)| name.clone());
            if let Some(name) = oldest {
                operations.remove(&name);
            }
        }

        let stats = Arc::new(OperationStats::new(tick));
        operations.insert(operation.to_string(), Arc::clone(&stats));
        stats
    }

    /// Records one attempt (first try or retry) of an operation.
    pub fn record_attempt(&self, operation: &str) {
        self.total_attempts.fetch_add(1, Ordering::Relaxed);
        self.operation(operation)
            .attempt_count
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Records that a failed attempt is about to be retried.
    pub fn record_retry(&self, operation: &str) {
        self.total_retries.fetch_add(1, Ordering::Relaxed);
        self.operation(operation)
            .retry_count
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Records the end of a logical call.
    ///
    /// # Arguments
    /// * `operation` - Operation name
    /// * `latency_us` - Wall time of the whole call, all attempts included
    /// * `outcome` - How the call ended
    pub fn record_call(&self, operation: &str, latency_us: u64, outcome: CallOutcome) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        let stats = self.operation(operation);
        stats.call_count.fetch_add(1, Ordering::Relaxed);
        stats.latencies.record(latency_us);

        match outcome {
            CallOutcome::Success => {
                self.successful_calls.fetch_add(1, Ordering::Relaxed);
                stats.success_count.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::Terminal => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                stats.terminal_count.fetch_add(1, Ordering::Relaxed);
            }
            CallOutcome::Exhausted => {
                self.failed_calls.fetch_add(1, Ordering::Relaxed);
                stats.exhausted_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Records a newly opened channel.
    ///
    /// `replacing` is true when the channel replaces one discarded after a fault.
    pub fn record_channel_created(&self, replacing: bool) {
        self.channel_creations.fetch_add(1, Ordering::Relaxed);
        if replacing {
            self.channel_recreations.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn operation_count(&self) -> usize {
        self.operations.read().len()
    }

    pub fn uptime_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let operations = self
            .operations
            .read()
            .iter()
            .map(|(name, stats)| (name.clone(), stats.snapshot()))
            .collect();

        MetricsSnapshot {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            successful_calls: self.successful_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            total_attempts: self.total_attempts.load(Ordering::Relaxed),
            total_retries: self.total_retries.load(Ordering::Relaxed),
            channel_creations: self.channel_creations.load(Ordering::Relaxed),
            channel_recreations: self.channel_recreations.load(Ordering::Relaxed),
            uptime_ms: self.uptime_ms(),
            operations,
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
