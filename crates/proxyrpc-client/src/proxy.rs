//! Proxies and how to obtain them.
//!
//! A [`Proxy`] pairs a generated [`ProxyType`] with the [`InvokerProvider`]
//! that owns its channel. Calls go through the proxy type's dispatch
//! routine for the operation, which captures a thunk and hands it to the
//! provider's invoker.
//!
//! # Entry Points
//!
//! - [`get_proxy`]: typed async client for a [`Contract`]
//! - [`get_blocking_proxy`]: typed blocking client for a [`Contract`]
//! - [`get_dynamic_proxy`]: untyped proxy for a descriptor known only at runtime
//! - [`ProxyBuilder`]: all of the above, with a custom metrics collector or cache

use proxyrpc_common::{
    Connector, ContractDescriptor, ContractId, InvocationError, JsonCodec, OperationDescriptor, ProxyError,
    ProxyGenerationError, Result,
};
use proxyrpc_metrics::MetricsCollector;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::blocking::BlockingProxy;
use crate::cache::ProxyCache;
use crate::contract::Contract;
use crate::generator::ProxyType;
use crate::policy::{ProxyConfig, RetryPolicy};
use crate::provider::{InvokerProvider, ProviderKind};

/// Encoded argument list for one call.
///
/// Arguments are encoded in the order they are pushed; encode failures
/// report the argument's position.
#[derive(Debug)]
pub struct ArgsBuilder<'a> {
    operation: &'a OperationDescriptor,
    values: Vec<Value>,
}

impl<'a> ArgsBuilder<'a> {
    pub fn push<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let value = JsonCodec::encode_argument(self.operation, self.values.len(), value)?;
        self.values.push(value);
        Ok(self)
    }

    pub fn finish(self) -> Vec<Value> {
        self.values
    }
}

/// A callable proxy for one contract.
///
/// Cloning is cheap and shares the proxy type and the channel.
pub struct Proxy<C: Connector> {
    ty: Arc<ProxyType>,
    provider: Arc<InvokerProvider<C>>,
}

impl<C: Connector> Proxy<C> {
    /// Binds a generated type to a provider.
    ///
    /// # Errors
    ///
    /// [`ProxyGenerationError::ProviderMismatch`] if `ty` was generated for a
    /// different provider kind.
    pub fn new(
        ty: Arc<ProxyType>,
        provider: Arc<InvokerProvider<C>>,
    ) -> std::result::Result<Self, ProxyGenerationError> {
        ty.check_provider(provider.kind())?;
        Ok(Self { ty, provider })
    }

    pub fn proxy_type(&self) -> &Arc<ProxyType> {
        &self.ty
    }

    pub fn provider(&self) -> &Arc<InvokerProvider<C>> {
        &self.provider
    }

    pub fn contract(&self) -> &ContractDescriptor {
        self.ty.contract()
    }

    /// Whether this proxy serves `contract`, either as its own contract or
    /// as one it extends, directly or transitively.
    pub fn implements(&self, contract: &ContractId) -> bool {
        let own = self.ty.contract();
        own.id() == contract || own.extends(contract)
    }

    /// Views this proxy as a typed client of any ancestor contract `P`.
    ///
    /// Returns `None` if `P` is neither this proxy's contract nor one of its
    /// ancestors. The view shares this proxy's type and channel.
    pub fn view<P: Contract>(&self) -> Option<P::Client<C>> {
        let declaration = P::declaration();
        self.implements(declaration.id())
            .then(|| self.clone().into())
    }

    /// Starts an argument list for `operation`.
    pub fn args(&self, operation: &str) -> Result<ArgsBuilder<'_>> {
        let routine = self
            .ty
            .routine(operation)
            .ok_or_else(|| self.unknown(operation))?;
        Ok(ArgsBuilder {
            operation: routine.operation(),
            values: Vec::with_capacity(routine.operation().arity()),
        })
    }

    fn unknown(&self, operation: &str) -> InvocationError {
        InvocationError::UnknownOperation {
            contract: self.ty.contract().id().to_string(),
            operation: operation.to_string(),
        }
    }

    /// Invokes `operation` with already encoded arguments.
    ///
    /// Void operations resolve to `Value::Null`.
    pub async fn dispatch(&self, operation: &str, args: Vec<Value>) -> Result<Value> {
        let routine = self
            .ty
            .routine(operation)
            .ok_or_else(|| self.unknown(operation))?;
        let thunk = routine.capture(args)?;

        let invoker = self
            .provider
            .current_invoker()
            .await
            .map_err(|source| InvocationError::ChannelCreation {
                operation: operation.to_string(),
                source,
            })?;

        if routine.operation().is_void() {
            invoker.execute_void(&thunk).await?;
            Ok(Value::Null)
        } else {
            invoker.execute(&thunk).await
        }
    }

    /// Invokes `operation` and decodes its result.
    pub async fn call<R: DeserializeOwned>(&self, operation: &str, args: Vec<Value>) -> Result<R> {
        let value = self.dispatch(operation, args).await?;
        match self.ty.routine(operation) {
            Some(routine) => JsonCodec::decode_result(routine.operation(), value),
            None => Err(self.unknown(operation)),
        }
    }
}

impl<C: Connector> Clone for Proxy<C> {
    fn clone(&self) -> Self {
        Self {
            ty: self.ty.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<C: Connector> fmt::Debug for Proxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &self.ty.label())
            .field("provider", &self.provider)
            .finish()
    }
}

/// Builder for proxies with non-default metrics or cache.
///
/// # Example
///
/// ```no_run
/// # use proxyrpc_client::{ProxyBuilder, ProxyConfig};
/// # use proxyrpc_common::{Connector, ContractDeclaration, OperationDescriptor};
/// # use proxyrpc_metrics::InvocationMetricsCollector;
/// # use std::sync::Arc;
/// # fn demo<C: Connector>(connector: C) -> Result<(), Box<dyn std::error::Error>> {
/// let descriptor = Arc::new(
///     ContractDeclaration::new("svc::Health")
///         .operation(OperationDescriptor::new("ping"))
///         .build()?,
/// );
///
/// let metrics = Arc::new(InvocationMetricsCollector::new());
/// let proxy = ProxyBuilder::new(connector)
///     .config(ProxyConfig::default().with_max_attempts(2))
///     .metrics(metrics.clone())
///     .build_dynamic(descriptor)?;
/// # Ok(())
/// # }
/// ```
pub struct ProxyBuilder<'a, C: Connector> {
    connector: C,
    config: ProxyConfig,
    metrics: Option<Arc<dyn MetricsCollector>>,
    cache: &'a ProxyCache,
}

impl<C: Connector> ProxyBuilder<'static, C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: ProxyConfig::default(),
            metrics: None,
            cache: ProxyCache::global(),
        }
    }
}

impl<'a, C: Connector> ProxyBuilder<'a, C> {
    pub fn config(mut self, config: ProxyConfig) -> Self {
        self.config = config;
        self
    }

    pub fn metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Uses `cache` instead of the process-wide cache.
    pub fn cache<'b>(self, cache: &'b ProxyCache) -> ProxyBuilder<'b, C> {
        ProxyBuilder {
            connector: self.connector,
            config: self.config,
            metrics: self.metrics,
            cache,
        }
    }

    pub fn build<K: Contract>(self) -> std::result::Result<K::Client<C>, ProxyError> {
        let descriptor = K::descriptor()?;
        Ok(self.build_dynamic(descriptor)?.into())
    }

    pub fn build_blocking<K: Contract>(
        self,
    ) -> std::result::Result<K::BlockingClient<C>, ProxyError> {
        let descriptor = K::descriptor()?;
        let proxy = self.build_dynamic(descriptor)?;
        Ok(BlockingProxy::new(proxy)?.into())
    }

    pub fn build_dynamic(
        self,
        contract: Arc<ContractDescriptor>,
    ) -> std::result::Result<Proxy<C>, ProxyError> {
        let policy = RetryPolicy::new(self.config)?;
        let ty = self
            .cache
            .get_or_generate(&contract, ProviderKind::of::<C>())?;

        let provider = match self.metrics {
            Some(metrics) => InvokerProvider::with_metrics(self.connector, policy, metrics),
            None => InvokerProvider::new(self.connector, policy),
        };
        Ok(Proxy::new(ty, Arc::new(provider))?)
    }
}

/// Returns a typed async client for contract `K`.
///
/// The proxy type for `(K, C)` is generated on first use and cached for the
/// process lifetime; the returned client gets its own provider and channel.
///
/// # Errors
///
/// - [`ProxyError::Contract`] if `K`'s declaration cannot be flattened
/// - [`ProxyError::Generation`] if the proxy type cannot be generated
/// - [`ProxyError::Config`] if `config` is invalid
pub fn get_proxy<K: Contract, C: Connector>(
    connector: C,
    config: ProxyConfig,
) -> std::result::Result<K::Client<C>, ProxyError> {
    ProxyBuilder::new(connector).config(config).build::<K>()
}

/// Returns a typed blocking client for contract `K`.
///
/// Must not be called from, or used within, an async context.
pub fn get_blocking_proxy<K: Contract, C: Connector>(
    connector: C,
    config: ProxyConfig,
) -> std::result::Result<K::BlockingClient<C>, ProxyError> {
    ProxyBuilder::new(connector)
        .config(config)
        .build_blocking::<K>()
}

/// Returns an untyped proxy for a contract descriptor.
pub fn get_dynamic_proxy<C: Connector>(
    contract: Arc<ContractDescriptor>,
    connector: C,
    config: ProxyConfig,
) -> std::result::Result<Proxy<C>, ProxyError> {
    ProxyBuilder::new(connector)
        .config(config)
        .build_dynamic(contract)
}
