//! Blocking facade.
//!
//! [`BlockingProxy`] drives the async dispatch path on a current-thread
//! tokio runtime it owns, so synchronous callers get exactly the same
//! retry algorithm. The backoff wait blocks the calling thread.

use proxyrpc_common::{Connector, InvocationError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::{Builder, Handle, Runtime};

use crate::proxy::{ArgsBuilder, Proxy};

/// Owned runtime that can be dropped from inside another runtime.
struct OwnedRuntime(Option<Runtime>);

impl Drop for OwnedRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            if Handle::try_current().is_ok() {
                runtime.shutdown_background();
            }
        }
    }
}

/// A proxy for synchronous callers.
///
/// Methods block the calling thread. Called from within an async runtime
/// they fail with [`InvocationError::BlockingInAsyncContext`] instead of
/// blocking a worker. Clones share the runtime and may be used from several
/// threads at once.
pub struct BlockingProxy<C: Connector> {
    proxy: Proxy<C>,
    runtime: Arc<OwnedRuntime>,
}

impl<C: Connector> BlockingProxy<C> {
    /// Wraps `proxy`, starting a dedicated runtime.
    pub fn new(proxy: Proxy<C>) -> std::io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            proxy,
            runtime: Arc::new(OwnedRuntime(Some(runtime))),
        })
    }

    pub fn proxy(&self) -> &Proxy<C> {
        &self.proxy
    }

    pub fn args(&self, operation: &str) -> Result<ArgsBuilder<'_>> {
        self.proxy.args(operation)
    }

    /// Blocking counterpart of [`Proxy::dispatch`].
    pub fn dispatch(&self, operation: &str, args: Vec<Value>) -> Result<Value> {
        self.block_on(operation, self.proxy.dispatch(operation, args))
    }

    /// Blocking counterpart of [`Proxy::call`].
    pub fn call<R: DeserializeOwned>(&self, operation: &str, args: Vec<Value>) -> Result<R> {
        self.block_on(operation, self.proxy.call(operation, args))
    }

    fn block_on<T>(&self, operation: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        let blocked = || InvocationError::BlockingInAsyncContext {
            operation: operation.to_string(),
        };
        if Handle::try_current().is_ok() {
            return Err(blocked());
        }
        match &self.runtime.0 {
            Some(runtime) => runtime.block_on(call),
            None => Err(blocked()),
        }
    }
}

impl<C: Connector> Clone for BlockingProxy<C> {
    fn clone(&self) -> Self {
        Self {
            proxy: self.proxy.clone(),
            runtime: self.runtime.clone(),
        }
    }
}

impl<C: Connector> fmt::Debug for BlockingProxy<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingProxy")
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}
