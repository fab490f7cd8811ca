//! ProxyRPC Common Types
//!
//! This crate provides the contract model, the error taxonomy and the channel
//! collaborator traits shared by every ProxyRPC component.
//!
//! # Overview
//!
//! ProxyRPC turns a service contract (a set of remotely callable operations)
//! into a callable client that forwards every call through a retrying invoker.
//! This crate holds the pieces that have no behavior of their own:
//!
//! - **Protocol Layer**: operation and contract descriptors, the contract
//!   builder that flattens inheritance, call identifiers and error types
//! - **Transport Layer**: the `Channel` / `Connector` traits a transport must
//!   implement, plus the JSON argument codec
//!
//! # Components
//!
//! - [`protocol`] - Descriptors, contract declarations and errors
//! - [`transport`] - Channel collaborator traits and argument codec
//!
//! # Example
//!
//! ```
//! use proxyrpc_common::{ContractDeclaration, OperationDescriptor};
//!
//! let declaration = ContractDeclaration::new("inventory::Catalog")
//!     .operation(OperationDescriptor::new("get_value").param::<i32>().returns::<String>());
//!
//! let descriptor = declaration.build().unwrap();
//! assert_eq!(descriptor.len(), 1);
//! ```

pub mod protocol;
pub mod transport;

pub use protocol::*;
pub use transport::{Channel, ChannelHandle, Connector, JsonCodec};
