pub mod call;
pub mod contract;
pub mod descriptor;
pub mod error;


pub use call::CallId;
pub use contract::{ContractDeclaration, ContractDescriptor, ContractId, MemberDeclaration};
pub use descriptor::{OperationDescriptor, ReturnType, Signature, TypeDescriptor};
pub use error::{
    ChannelCreationError, ConfigError, ContractDescriptorError, Fault, InvocationError,
    ProxyError, ProxyGenerationError, Result,
};
