use futures_util::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::protocol::{ChannelCreationError, Fault, OperationDescriptor};

/// Shared handle to an open channel.
pub type ChannelHandle = Arc<dyn Channel>;

/// One open communication channel to the remote service.
///
/// A channel is shared by every call made through the same provider, so
/// implementations must tolerate concurrent `invoke` calls.
pub trait Channel: Send + Sync {
    /// Performs a single attempt of `operation`.
    ///
    /// # Arguments
    ///
    /// * `operation` - Descriptor of the operation being called
    /// * `args` - Encoded arguments, in declaration order
    ///
    /// # Returns
    ///
    /// The encoded result (`Value::Null` for void operations) or the fault
    /// the attempt produced
    fn invoke<'a>(
        &'a self,
        operation: &'a OperationDescriptor,
        args: &'a [Value],
    ) -> BoxFuture<'a, Result<Value, Fault>>;

    /// Releases the channel. Called once when the provider replaces it.
    fn close(&self) {}
}

/// Opens channels for an invoker provider.
pub trait Connector: Send + Sync + 'static {
    fn connect(&self) -> BoxFuture<'_, Result<ChannelHandle, ChannelCreationError>>;
}

impl<C: Connector> Connector for Arc<C> {
    fn connect(&self) -> BoxFuture<'_, Result<ChannelHandle, ChannelCreationError>> {
        (**self).connect()
    }
}
