//! Captured, replayable calls.

use proxyrpc_common::{CallId, Channel, Fault, OperationDescriptor};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One captured invocation of an operation.
///
/// The arguments are encoded once, when the thunk is captured, so every
/// replay sends the channel exactly the values the caller passed. A thunk
/// belongs to a single call: it is neither `Clone` nor reused.
pub struct CallThunk {
    call_id: CallId,
    operation: Arc<OperationDescriptor>,
    label: Arc<str>,
    args: Vec<Value>,
}

impl CallThunk {
    pub(crate) fn new(operation: Arc<OperationDescriptor>, label: Arc<str>, args: Vec<Value>) -> Self {
        Self {
            call_id: CallId::next(),
            operation,
            label,
            args,
        }
    }

    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    pub fn operation(&self) -> &OperationDescriptor {
        &self.operation
    }

    /// Identity of the thunk type, `-lambda-{Contract}.{operation}`.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Runs one attempt against `channel`.
    pub async fn replay(&self, channel: &dyn Channel) -> Result<Value, Fault> {
        channel.invoke(&self.operation, &self.args).await
    }
}

impl fmt::Debug for CallThunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallThunk")
            .field("call_id", &self.call_id)
            .field("label", &self.label)
            .field("args", &self.args)
            .finish()
    }
}
