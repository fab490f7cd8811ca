//! The retrying invoker.
//!
//! The invoker is the only component that knows about retries. Dispatch
//! routines hand it a [`CallThunk`]; it replays the thunk against the
//! current channel until the call succeeds, fails terminally or runs out of
//! attempts.
//!
//! # Retry Loop
//!
//! For attempt `n` (1-based):
//!
//! 1. Acquire the current channel (connecting if needed) and replay the
//!    thunk, both bounded by the per-attempt timeout if one is configured
//! 2. On success, return the value
//! 3. On a terminal fault, return [`InvocationError::Terminal`] with `attempts = n`
//! 4. On a retryable fault with `n == max_attempts`, return
//!    [`InvocationError::RetriesExhausted`]
//! 5. Otherwise ask the channel source to recreate the channel, wait
//!    `backoff(n)` and go again
//!
//! Recreation happens before the wait so the next attempt starts on a fresh
//! channel as soon as the backoff elapses.

use futures_util::future::BoxFuture;
use proxyrpc_common::{ChannelCreationError, ChannelHandle, Fault, InvocationError, Result};
use proxyrpc_metrics::{CallOutcome, MetricsCollector};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::policy::{FaultClass, RetryPolicy};
use crate::thunk::CallThunk;

/// A channel together with the generation it belongs to.
#[derive(Clone)]
pub struct ChannelLease {
    pub channel: ChannelHandle,
    /// Incremented every time the source installs a new channel
    pub generation: u64,
}

/// Where the invoker gets its channels from.
///
/// Implemented by the invoker provider; kept as a trait so the retry loop
/// can be exercised without a provider.
pub trait ChannelSource: Send + Sync {
    /// Returns the current channel, connecting first if there is none.
    fn acquire(&self) -> BoxFuture<'_, std::result::Result<ChannelLease, ChannelCreationError>>;

    /// Replaces the channel of generation `observed`.
    ///
    /// Returns the generation in place afterwards. If the channel has already
    /// been replaced since `observed`, this is a no-op.
    fn recreate(&self, observed: u64) -> BoxFuture<'_, std::result::Result<u64, ChannelCreationError>>;
}

/// Per-call retry state.
struct InvocationContext {
    attempt: u32,
    last_fault: Option<Fault>,
    /// Generation of the channel used by the current attempt
    generation: Option<u64>,
    started: Instant,
}

impl InvocationContext {
    fn new() -> Self {
        Self {
            attempt: 1,
            last_fault: None,
            generation: None,
            started: Instant::now(),
        }
    }
}

/// Executes call thunks with retry semantics.
pub struct RetryingInvoker {
    source: Arc<dyn ChannelSource>,
    policy: Arc<RetryPolicy>,
    metrics: Arc<dyn MetricsCollector>,
}

impl fmt::Debug for RetryingInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryingInvoker")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl RetryingInvoker {
    pub fn new(
        source: Arc<dyn ChannelSource>,
        policy: Arc<RetryPolicy>,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        Self {
            source,
            policy,
            metrics,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes a thunk and returns the value the channel produced.
    pub async fn execute(&self, thunk: &CallThunk) -> Result<Value> {
        self.run(thunk).await
    }

    /// Executes a thunk for a void operation, discarding whatever the channel returns.
    pub async fn execute_void(&self, thunk: &CallThunk) -> Result<()> {
        self.run(thunk).await.map(|_| ())
    }

    /// One attempt: acquire plus replay, both under the per-attempt deadline.
    async fn attempt(
        &self,
        thunk: &CallThunk,
        ctx: &mut InvocationContext,
    ) -> std::result::Result<Value, Fault> {
        let generation = &mut ctx.generation;
        let body = async {
            let lease = self.source.acquire().await?;
            *generation = Some(lease.generation);
            thunk.replay(lease.channel.as_ref()).await
        };

        match self.policy.per_attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Fault::Timeout(limit)),
            },
            None => body.await,
        }
    }

    async fn run(&self, thunk: &CallThunk) -> Result<Value> {
        let operation = thunk.operation();
        let name = operation.name();
        let max_attempts = self.policy.max_attempts();
        let mut ctx = InvocationContext::new();

        loop {
            self.metrics.record_attempt(name);

            let fault = match self.attempt(thunk, &mut ctx).await {
                Ok(value) => {
                    if let Some(previous) = &ctx.last_fault {
                        tracing::debug!(
                            call_id = %thunk.call_id(),
                            "{} succeeded on attempt {} after: {}",
                            thunk.label(),
                            ctx.attempt,
                            previous
                        );
                    }
                    self.metrics
                        .record_call(name, ctx.started, CallOutcome::Success);
                    return Ok(value);
                }
                Err(fault) => fault,
            };

            match self.policy.classify(operation, &fault) {
                FaultClass::Terminal => {
                    tracing::debug!(
                        call_id = %thunk.call_id(),
                        "{} failed terminally on attempt {}: {}",
                        thunk.label(),
                        ctx.attempt,
                        fault
                    );
                    self.metrics
                        .record_call(name, ctx.started, CallOutcome::Terminal);
                    return Err(InvocationError::Terminal {
                        operation: name.to_string(),
                        attempts: ctx.attempt,
                        cause: fault,
                    });
                }
                FaultClass::Retryable if ctx.attempt >= max_attempts => {
                    tracing::error!(
                        call_id = %thunk.call_id(),
                        "{} failed after {} attempts: {}",
                        thunk.label(),
                        ctx.attempt,
                        fault
                    );
                    self.metrics
                        .record_call(name, ctx.started, CallOutcome::Exhausted);
                    return Err(InvocationError::RetriesExhausted {
                        operation: name.to_string(),
                        attempts: ctx.attempt,
                        cause: fault,
                    });
                }
                FaultClass::Retryable => {
                    let delay = self.policy.backoff(ctx.attempt);
                    tracing::warn!(
                        call_id = %thunk.call_id(),
                        "{} failed (attempt {}/{}): {}, retrying in {}ms",
                        thunk.label(),
                        ctx.attempt,
                        max_attempts,
                        fault,
                        delay.as_millis()
                    );
                    self.metrics.record_retry(name);

                    // No generation means the channel could not even be acquired;
                    // the next acquire connects again.
                    if let Some(observed) = ctx.generation.take() {
                        if let Err(e) = self.source.recreate(observed).await {
                            tracing::warn!("Channel recreation failed: {}", e);
                        }
                    }

                    ctx.last_fault = Some(fault);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    ctx.attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{Backoff, ProxyConfig};
    use proxyrpc_common::{Channel, OperationDescriptor};
    use proxyrpc_metrics::InvocationMetricsCollector;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Channel that plays a fixed script of outcomes, then succeeds with "ok".
    struct ScriptChannel {
        script: parking_lot::Mutex<VecDeque<std::result::Result<Value, Fault>>>,
        calls: AtomicUsize,
        hang: bool,
    }

    impl Channel for ScriptChannel {
        fn invoke<'a>(
            &'a self,
            _operation: &'a OperationDescriptor,
            _args: &'a [Value],
        ) -> BoxFuture<'a, std::result::Result<Value, Fault>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                if self.hang {
                    std::future::pending::<()>().await;
                }
                let next = self.script.lock().pop_front();
                next.unwrap_or_else(|| Ok(json!("ok")))
            })
        }
    }

    struct FakeSource {
        channel: Arc<ScriptChannel>,
        generation: AtomicU64,
        recreations: AtomicUsize,
    }

    impl FakeSource {
        fn new(script: Vec<std::result::Result<Value, Fault>>) -> Arc<Self> {
            Self::build(script, false)
        }

        fn build(script: Vec<std::result::Result<Value, Fault>>, hang: bool) -> Arc<Self> {
            Arc::new(Self {
                channel: Arc::new(ScriptChannel {
                    script: parking_lot::Mutex::new(script.into()),
                    calls: AtomicUsize::new(0),
                    hang,
                }),
                generation: AtomicU64::new(1),
                recreations: AtomicUsize::new(0),
            })
        }
    }

    impl ChannelSource for FakeSource {
        fn acquire(
            &self,
        ) -> BoxFuture<'_, std::result::Result<ChannelLease, ChannelCreationError>> {
            Box::pin(async move {
                Ok(ChannelLease {
                    channel: self.channel.clone(),
                    generation: self.generation.load(Ordering::SeqCst),
                })
            })
        }

        fn recreate(
            &self,
            _observed: u64,
        ) -> BoxFuture<'_, std::result::Result<u64, ChannelCreationError>> {
            Box::pin(async move {
                self.recreations.fetch_add(1, Ordering::SeqCst);
                Ok(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
            })
        }
    }

    fn invoker(source: Arc<FakeSource>, config: ProxyConfig) -> RetryingInvoker {
        RetryingInvoker::new(
            source,
            Arc::new(RetryPolicy::new(config).unwrap()),
            Arc::new(InvocationMetricsCollector::new()),
        )
    }

    fn thunk(operation: OperationDescriptor) -> CallThunk {
        CallThunk::new(
            Arc::new(operation),
            Arc::from("-lambda-Test.get_value"),
            vec![json!(1)],
        )
    }

    fn get_value() -> OperationDescriptor {
        OperationDescriptor::new("get_value")
            .param::<i32>()
            .returns::<String>()
    }

    fn transport(msg: &str) -> std::result::Result<Value, Fault> {
        Err(Fault::Transport(msg.to_string()))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let source = FakeSource::new(vec![]);
        let invoker = invoker(source.clone(), ProxyConfig::default());

        let value = invoker.execute(&thunk(get_value())).await.unwrap();

        assert_eq!(value, json!("ok"));
        assert_eq!(source.channel.calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.recreations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_exhaustion_counts_attempts_and_recreations() {
        let source = FakeSource::new(vec![transport("a"), transport("b"), transport("c")]);
        let config = ProxyConfig::default()
            .with_max_attempts(3)
            .with_backoff(Backoff::None);
        let invoker = invoker(source.clone(), config);

        let err = invoker.execute(&thunk(get_value())).await.unwrap_err();

        match err {
            InvocationError::RetriesExhausted {
                attempts, cause, ..
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(cause, Fault::Transport("c".into()));
            }
            other => panic!("expected RetriesExhausted, got {:?}", other),
        }
        assert_eq!(source.channel.calls.load(Ordering::SeqCst), 3);
        assert_eq!(source.recreations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_terminal_after_transient_reports_attempt() {
        let source = FakeSource::new(vec![transport("a"), Err(Fault::remote(400, "bad id"))]);
        let config = ProxyConfig::default().with_backoff(Backoff::None);
        let invoker = invoker(source.clone(), config);

        let err = invoker.execute(&thunk(get_value())).await.unwrap_err();

        assert!(err.is_terminal());
        assert_eq!(err.attempts(), Some(2));
        assert_eq!(source.recreations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_void_discards_value() {
        let source = FakeSource::new(vec![Ok(json!({"ignored": true}))]);
        let invoker = invoker(source, ProxyConfig::default());

        invoker
            .execute_void(&thunk(OperationDescriptor::new("reset")))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_terminal_by_default() {
        let source = FakeSource::build(vec![], true);
        let config = ProxyConfig::default().with_per_attempt_timeout(Duration::from_millis(100));
        let invoker = invoker(source.clone(), config);

        let err = invoker.execute(&thunk(get_value())).await.unwrap_err();

        assert!(err.is_terminal());
        assert_eq!(err.cause(), Some(&Fault::Timeout(Duration::from_millis(100))));
        assert_eq!(source.channel.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_retried_when_enabled() {
        let source = FakeSource::build(vec![], true);
        let config = ProxyConfig::default()
            .with_max_attempts(2)
            .with_backoff(Backoff::None)
            .with_per_attempt_timeout(Duration::from_millis(100))
            .with_retry_on_timeout(true);
        let invoker = invoker(source.clone(), config);

        let err = invoker.execute(&thunk(get_value())).await.unwrap_err();

        assert!(err.is_exhausted());
        assert_eq!(source.channel.calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.recreations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metrics_follow_the_loop() {
        let source = FakeSource::new(vec![transport("a")]);
        let metrics = Arc::new(InvocationMetricsCollector::new());
        let invoker = RetryingInvoker::new(
            source,
            Arc::new(
                RetryPolicy::new(ProxyConfig::default().with_backoff(Backoff::None)).unwrap(),
            ),
            metrics.clone(),
        );

        invoker.execute(&thunk(get_value())).await.unwrap();

        let snapshot = metrics.snapshot();
        let op = &snapshot.operations["get_value"];
        assert_eq!(op.call_count, 1);
        assert_eq!(op.attempt_count, 2);
        assert_eq!(op.retry_count, 1);
        assert_eq!(op.success_count, 1);
    }
}
