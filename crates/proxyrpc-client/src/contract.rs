//! Static contract surface.
//!
//! A type implementing [`Contract`] names a contract declaration and the
//! typed clients generated for it. Implementations are normally produced by
//! the [`contract!`](crate::contract!) macro.

use proxyrpc_common::{ContractDeclaration, ContractDescriptor, ContractDescriptorError, Connector};
use std::sync::Arc;

use crate::blocking::BlockingProxy;
use crate::proxy::Proxy;

/// A contract with typed async and blocking clients.
pub trait Contract: 'static {
    /// Async client, one method per operation.
    type Client<C: Connector>: From<Proxy<C>>;

    /// Blocking client with the same methods.
    type BlockingClient<C: Connector>: From<BlockingProxy<C>>;

    /// The contract's declaration, parents included.
    fn declaration() -> Arc<ContractDeclaration>;

    /// The flattened descriptor. Built once and memoized, including failures.
    fn descriptor() -> Result<Arc<ContractDescriptor>, ContractDescriptorError>;
}

/// Marker: `Self` directly extends `P`.
///
/// Lets a client be viewed as a client of `P` over the same proxy.
pub trait Extends<P: Contract>: Contract {}
