//! ProxyRPC Transport Layer
//!
//! ProxyRPC does not own a wire protocol. A transport plugs in by
//! implementing two collaborator traits:
//!
//! - **[`Connector`]**: opens a new [`Channel`] on demand. The invoker
//!   provider calls it on first use and again whenever a channel has to be
//!   replaced after a retryable fault.
//! - **[`Channel`]**: performs one raw attempt of an operation with already
//!   encoded arguments and reports a [`Fault`](crate::Fault) on failure.
//!
//! Arguments and results travel as `serde_json::Value`; [`JsonCodec`]
//! converts between them and typed Rust values.
//!
//! # Example
//!
//! ```
//! use futures_util::future::BoxFuture;
//! use proxyrpc_common::{Channel, Fault, OperationDescriptor};
//! use serde_json::{json, Value};
//!
//! struct Echo;
//!
//! impl Channel for Echo {
//!     fn invoke<'a>(
//!         &'a self,
//!         _operation: &'a OperationDescriptor,
//!         args: &'a [Value],
//!     ) -> BoxFuture<'a, Result<Value, Fault>> {
//!         Box::pin(async move { Ok(Value::Array(args.to_vec())) })
//!     }
//! }
//!
//! let op = OperationDescriptor::new("echo").param::<i32>();
//! let result = futures_util::FutureExt::now_or_never(Echo.invoke(&op, &[json!(7)]));
//! assert_eq!(result, Some(Ok(json!([7]))));
//! ```

pub mod channel;
pub mod codec;

pub use channel::{Channel, ChannelHandle, Connector};
pub use codec::JsonCodec;
