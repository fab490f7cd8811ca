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

//! ProxyRPC Client
//!
//! Turns a service contract into a callable client whose every call is
//! forwarded, unchanged, to a retrying invoker.
//!
//! # Architecture
//!
//! - [`ProxyGenerator`] / [`ProxyCache`]: build one [`ProxyType`] per
//!   (contract, connector type) pair, exactly once per process
//! - [`Proxy`]: binds a proxy type to an [`InvokerProvider`]; each operation
//!   call captures a [`CallThunk`] and hands it to the invoker
//! - [`RetryingInvoker`]: replays the thunk, classifies faults with the
//!   [`RetryPolicy`], recreates the channel and backs off between attempts
//! - [`InvokerProvider`]: owns the channel, created lazily and recreated at
//!   most once per broken generation
//! - [`contract!`]: declares a contract and generates typed async and
//!   blocking clients for it
//!
//! # Example
//!
//! ```no_run
//! use proxyrpc_client::{contract, get_proxy, Backoff, ProxyConfig};
//! # use proxyrpc_common::Connector;
//!
//! contract! {
//!     pub contract Catalog {
//!         client CatalogClient;
//!         blocking CatalogBlockingClient;
//!
//!         fn get_value(id: i32) -> String;
//!     }
//! }
//!
//! # async fn demo<C: Connector>(connector: C) -> Result<(), Box<dyn std::error::Error>> {
//! let config = ProxyConfig::default()
//!     .with_max_attempts(3)
//!     .with_backoff(Backoff::None);
//!
//! let catalog = get_proxy::<Catalog, _>(connector, config)?;
//! let value = catalog.get_value(42).await?;
//! # Ok(())
//! # }
//! ```

pub mod blocking;
pub mod cache;
pub mod contract;
pub mod generator;
pub mod invoker;
pub mod policy;
pub mod provider;
pub mod proxy;
pub mod thunk;

mod macros;

pub use blocking::BlockingProxy;
pub use cache::ProxyCache;
pub use contract::{Contract, Extends};
pub use generator::{DispatchRoutine, ProxyGenerator, ProxyType};
pub use invoker::{ChannelLease, ChannelSource, RetryingInvoker};
pub use policy::{default_classifier, Backoff, FaultClass, ProxyConfig, RetryPolicy, RetryPredicate};
pub use provider::{InvokerProvider, ProviderKind};
pub use proxy::{get_blocking_proxy, get_dynamic_proxy, get_proxy, ArgsBuilder, Proxy, ProxyBuilder};
pub use thunk::CallThunk;

pub use proxyrpc_common::{
    Channel, ChannelCreationError, ChannelHandle, ConfigError, Connector, ContractDeclaration,
    ContractDescriptor, ContractDescriptorError, ContractId, Fault, InvocationError,
    OperationDescriptor, ProxyError, ProxyGenerationError, Result,
};

#[doc(hidden)]
pub mod __private {
    pub use proxyrpc_common::{
        Connector, ContractDeclaration, ContractDescriptor, ContractDescriptorError,
        OperationDescriptor,
    };
}
