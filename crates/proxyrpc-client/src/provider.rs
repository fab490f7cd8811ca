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

//! Invoker provider: channel lifecycle for one proxy.
//!
//! The provider owns the channel slot, the only mutable state shared by the
//! calls made through a proxy, and the [`RetryingInvoker`] bound to it.
//!
//! # Channel Slot
//!
//! - The channel is created lazily, on the first call
//! - Every installed channel gets a new generation number, starting at 1
//! - Recreation is keyed by the generation the failing attempt used, so a
//!   burst of callers faulting on the same channel rebuilds it once
//! - Connects and recreations are serialized by an async mutex; readers see
//!   a published copy of the current lease and never wait on a connect that
//!   is not theirs

use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use proxyrpc_common::{ChannelCreationError, ChannelHandle, Connector};
use proxyrpc_metrics::{InvocationMetricsCollector, MetricsCollector};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::invoker::{ChannelLease, ChannelSource, RetryingInvoker};
use crate::policy::RetryPolicy;

/// Identity of a connector type, used to key generated proxy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProviderKind {
    type_id: TypeId,
    path: &'static str,
    name: &'static str,
}

impl ProviderKind {
    pub fn of<C: 'static>() -> Self {
        let full = std::any::type_name::<C>();
        let path = full.split('<').next().unwrap_or(full);
        Self {
            type_id: TypeId::of::<C>(),
            path: full,
            name: path.rsplit("::").next().unwrap_or(path),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified type name, generics included, e.g.
    /// `alloc::sync::Arc<app::net::TcpConnector>`.
    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Short type name of the connector, e.g. `TcpConnector`.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

struct SlotState {
    channel: Option<ChannelHandle>,
    generation: u64,
}

/// The channel reference plus everything needed to replace it.
struct ChannelSlot<C> {
    connector: C,
    state: Mutex<SlotState>,
    /// Copy of the installed lease, readable without the async mutex
    published: RwLock<Option<ChannelLease>>,
    metrics: Arc<dyn MetricsCollector>,
}

impl<C: Connector> ChannelSlot<C> {
    fn new(connector: C, metrics: Arc<dyn MetricsCollector>) -> Self {
        Self {
            connector,
            state: Mutex::new(SlotState {
                channel: None,
                generation: 0,
            }),
            published: RwLock::new(None),
            metrics,
        }
    }

    fn generation(&self) -> u64 {
        self.published
            .read()
            .as_ref()
            .map(|lease| lease.generation)
            .unwrap_or(0)
    }

    /// Connects and installs a new channel. Caller holds the state lock.
    async fn install(&self, state: &mut SlotState) -> Result<ChannelLease, ChannelCreationError> {
        let replacing = state.generation > 0;
        let channel = self.connector.connect().await?;

        state.generation += 1;
        state.channel = Some(channel.clone());
        let lease = ChannelLease {
            channel,
            generation: state.generation,
        };
        *self.published.write() = Some(lease.clone());

        self.metrics.record_channel_created(replacing);
        tracing::info!(
            "Channel established (generation {}, replacing: {})",
            lease.generation,
            replacing
        );
        Ok(lease)
    }

    async fn acquire_lease(&self) -> Result<ChannelLease, ChannelCreationError> {
        let published = self.published.read().clone();
        if let Some(lease) = published {
            return Ok(lease);
        }

        let mut state = self.state.lock().await;
        // Another caller may have connected while we waited for the lock
        if let Some(channel) = &state.channel {
            return Ok(ChannelLease {
                channel: channel.clone(),
                generation: state.generation,
            });
        }
        self.install(&mut state).await
    }

    async fn recreate_from(&self, observed: u64) -> Result<u64, ChannelCreationError> {
        let mut state = self.state.lock().await;
        if state.generation != observed {
            tracing::debug!(
                "Channel generation {} already replaced by {}",
                observed,
                state.generation
            );
            return Ok(state.generation);
        }

        *self.published.write() = None;
        if let Some(old) = state.channel.take() {
            old.close();
        }

        match self.install(&mut state).await {
            Ok(lease) => Ok(lease.generation),
            Err(e) => {
                tracing::warn!(
                    "Failed to recreate channel (generation {}): {}",
                    observed,
                    e
                );
                Err(e)
            }
        }
    }

    async fn shutdown(&self) {
        let mut state = self.state.lock().await;
        *self.published.write() = None;
        if let Some(channel) = state.channel.take() {
            channel.close();
        }
    }
}

impl<C: Connector> ChannelSource for ChannelSlot<C> {
    fn acquire(&self) -> BoxFuture<'_, Result<ChannelLease, ChannelCreationError>> {
        Box::pin(self.acquire_lease())
    }

    fn recreate(&self, observed: u64) -> BoxFuture<'_, Result<u64, ChannelCreationError>> {
        Box::pin(self.recreate_from(observed))
    }
}

/// Owns the channel for a proxy and the invoker bound to it.
///
/// # Example
///
/// ```no_run
/// # use proxyrpc_client::{InvokerProvider, ProxyConfig, RetryPolicy};
/// # use proxyrpc_common::Connector;
/// # async fn demo<C: Connector>(connector: C) -> Result<(), Box<dyn std::error::Error>> {
/// let policy = RetryPolicy::new(ProxyConfig::default())?;
/// let provider = InvokerProvider::new(connector, policy);
///
/// // Connects on first use
/// let _invoker = provider.current_invoker().await?;
/// assert_eq!(provider.generation(), 1);
/// # Ok(())
/// # }
/// ```
pub struct InvokerProvider<C: Connector> {
    slot: Arc<ChannelSlot<C>>,
    invoker: RetryingInvoker,
    metrics: Arc<dyn MetricsCollector>,
}

impl<C: Connector> InvokerProvider<C> {
    /// Creates a provider that reports into its own metrics collector.
    pub fn new(connector: C, policy: RetryPolicy) -> Self {
        Self::with_metrics(
            connector,
            policy,
            Arc::new(InvocationMetricsCollector::new()),
        )
    }

    pub fn with_metrics(
        connector: C,
        policy: RetryPolicy,
        metrics: Arc<dyn MetricsCollector>,
    ) -> Self {
        let slot = Arc::new(ChannelSlot::new(connector, metrics.clone()));
        let invoker = RetryingInvoker::new(slot.clone(), Arc::new(policy), metrics.clone());
        Self {
            slot,
            invoker,
            metrics,
        }
    }

    /// Returns the invoker, establishing the channel first if there is none.
    ///
    /// Connecting is bounded by the policy's per-attempt timeout.
    ///
    /// # Errors
    ///
    /// The connector's error if the channel cannot be created, or a timeout
    /// error if connecting outlives the deadline. It is not retried here.
    pub async fn current_invoker(&self) -> Result<&RetryingInvoker, ChannelCreationError> {
        let acquire = self.slot.acquire_lease();
        match self.policy().per_attempt_timeout() {
            Some(limit) => match tokio::time::timeout(limit, acquire).await {
                Ok(lease) => lease?,
                Err(_) => {
                    return Err(ChannelCreationError::new(format!(
                        "connect timed out after {}ms",
                        limit.as_millis()
                    )))
                }
            },
            None => acquire.await?,
        };
        Ok(&self.invoker)
    }

    /// Closes the current channel and installs a new one.
    ///
    /// Returns the new generation.
    pub async fn recreate(&self) -> Result<u64, ChannelCreationError> {
        let observed = self.slot.state.lock().await.generation;
        self.slot.recreate_from(observed).await
    }

    /// Closes the current channel. The next call connects again.
    pub async fn close(&self) {
        self.slot.shutdown().await;
    }

    /// Generation of the installed channel; 0 when no channel is installed.
    pub fn generation(&self) -> u64 {
        self.slot.generation()
    }

    pub fn connector(&self) -> &C {
        &self.slot.connector
    }

    pub fn policy(&self) -> &RetryPolicy {
        self.invoker.policy()
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsCollector> {
        &self.metrics
    }

    pub fn kind(&self) -> ProviderKind {
        ProviderKind::of::<C>()
    }
}

impl<C: Connector> fmt::Debug for InvokerProvider<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokerProvider")
            .field("kind", &self.kind())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::ProxyConfig;
    use proxyrpc_common::{Channel, Fault, OperationDescriptor};
    use serde_json::Value;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullChannel {
        closed: Arc<AtomicUsize>,
    }

    impl Channel for NullChannel {
        fn invoke<'a>(
            &'a self,
            _operation: &'a OperationDescriptor,
            _args: &'a [Value],
        ) -> BoxFuture<'a, Result<Value, Fault>> {
            Box::pin(async { Ok(Value::Null) })
        }

        fn close(&self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct CountingConnector {
        connects: AtomicUsize,
        closed: Arc<AtomicUsize>,
        refuse: AtomicBool,
    }

    impl Connector for CountingConnector {
        fn connect(&self) -> BoxFuture<'_, Result<ChannelHandle, ChannelCreationError>> {
            Box::pin(async move {
                // Widen the window for concurrent callers
                tokio::time::sleep(Duration::from_millis(5)).await;
                if self.refuse.load(Ordering::SeqCst) {
                    return Err(ChannelCreationError::new("connection refused"));
                }
                self.connects.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(NullChannel {
                    closed: self.closed.clone(),
                }) as ChannelHandle)
            })
        }
    }

    fn provider() -> InvokerProvider<CountingConnector> {
        InvokerProvider::new(
            CountingConnector::default(),
            RetryPolicy::new(ProxyConfig::default()).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_channel_is_created_lazily() {
        let provider = provider();
        assert_eq!(provider.generation(), 0);
        assert_eq!(provider.connector().connects.load(Ordering::SeqCst), 0);

        provider.current_invoker().await.unwrap();
        provider.current_invoker().await.unwrap();

        assert_eq!(provider.generation(), 1);
        assert_eq!(provider.connector().connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_use_connects_once() {
        let provider = Arc::new(provider());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move {
                    provider.current_invoker().await.map(|_| ())
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(provider.connector().connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_recreations_collapse() {
        let provider = Arc::new(provider());
        provider.current_invoker().await.unwrap();
        let observed = provider.generation();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provider = provider.clone();
                tokio::spawn(async move { provider.slot.recreate_from(observed).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 2);
        }

        assert_eq!(provider.generation(), 2);
        assert_eq!(provider.connector().connects.load(Ordering::SeqCst), 2);
        assert_eq!(provider.connector().closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_surfaced() {
        let provider = provider();
        provider.connector().refuse.store(true, Ordering::SeqCst);

        let err = provider.current_invoker().await.unwrap_err();
        assert_eq!(err, ChannelCreationError::new("connection refused"));
        assert_eq!(provider.generation(), 0);
    }

    #[tokio::test]
    async fn test_failed_recreation_empties_slot() {
        let provider = provider();
        provider.current_invoker().await.unwrap();

        provider.connector().refuse.store(true, Ordering::SeqCst);
        assert!(provider.recreate().await.is_err());
        assert_eq!(provider.generation(), 0);
        assert_eq!(provider.connector().closed.load(Ordering::SeqCst), 1);

        provider.connector().refuse.store(false, Ordering::SeqCst);
        provider.current_invoker().await.unwrap();
        assert_eq!(provider.generation(), 2);

        let snapshot = provider.metrics().snapshot();
        assert_eq!(snapshot.channel_creations, 2);
        assert_eq!(snapshot.channel_recreations, 1);
    }

    #[tokio::test]
    async fn test_close_releases_channel() {
        let provider = provider();
        provider.current_invoker().await.unwrap();

        provider.close().await;

        assert_eq!(provider.generation(), 0);
        assert_eq!(provider.connector().closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_provider_kind_name() {
        assert_eq!(ProviderKind::of::<CountingConnector>().name(), "CountingConnector");
        assert_eq!(ProviderKind::of::<Arc<CountingConnector>>().name(), "Arc");
        assert_ne!(
            ProviderKind::of::<CountingConnector>(),
            ProviderKind::of::<Arc<CountingConnector>>()
        );
    }

    #[test]
    fn test_provider_kind_path_keeps_generics() {
        let kind = ProviderKind::of::<Arc<CountingConnector>>();
        assert!(kind.path().contains("Arc<"));
        assert!(kind.path().ends_with("tests::CountingConnector>"));
        assert_ne!(kind.path(), ProviderKind::of::<Arc<String>>().path());
    }
}
