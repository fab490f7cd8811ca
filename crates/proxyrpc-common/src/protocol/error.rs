use std::time::Duration;
use thiserror::Error;

/// Raised while flattening a contract declaration into a descriptor.
///
/// These are fatal: they surface on the first proxy request for the
/// contract and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContractDescriptorError {
    #[error("contract {contract} declares no remotely callable operations")]
    NoOperations { contract: String },

    #[error("operation {operation} on contract {contract} has conflicting signatures: {existing} vs {conflicting}")]
    SignatureConflict {
        contract: String,
        operation: String,
        existing: String,
        conflicting: String,
    },

    #[error("contract {contract} inherits from itself")]
    InheritanceCycle { contract: String },
}

/// Raised while generating a proxy type.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProxyGenerationError {
    #[error("generated type name already registered: {0}")]
    NameCollision(String),

    #[error("proxy type {proxy} was generated for provider {expected}, not {actual}")]
    ProviderMismatch {
        proxy: String,
        expected: String,
        actual: String,
    },
}

/// The channel connector could not establish a channel.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("channel creation failed: {0}")]
pub struct ChannelCreationError(pub String);

impl ChannelCreationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Invalid proxy configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_attempts must be at least 1 (got {0})")]
    InvalidMaxAttempts(u32),
}

/// What a single failed attempt produced.
///
/// Faults are classified by the retry policy; they only reach the caller
/// wrapped in an [`InvocationError`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("channel closed: {0}")]
    ChannelClosed(String),

    #[error("attempt timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    /// A business-level fault reported by the remote service.
    #[error("remote fault {code}: {message}")]
    Remote { code: i32, message: String },

    #[error(transparent)]
    ChannelCreation(#[from] ChannelCreationError),
}

impl Fault {
    pub fn remote(code: i32, message: impl Into<String>) -> Self {
        Fault::Remote {
            code,
            message: message.into(),
        }
    }
}

/// Errors that cross the proxy boundary back to the caller.
#[derive(Error, Debug)]
pub enum InvocationError {
    /// The fault was classified as non-retryable.
    #[error("{operation} failed on attempt {attempts}: {cause}")]
    Terminal {
        operation: String,
        attempts: u32,
        #[source]
        cause: Fault,
    },

    /// Every allowed attempt failed with a retryable fault.
    #[error("{operation} exhausted {attempts} attempts: {cause}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        cause: Fault,
    },

    #[error("could not establish a channel for {operation}: {source}")]
    ChannelCreation {
        operation: String,
        #[source]
        source: ChannelCreationError,
    },

    #[error("operation {operation} is not part of contract {contract}")]
    UnknownOperation { contract: String, operation: String },

    #[error("operation {operation} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        operation: String,
        expected: usize,
        actual: usize,
    },

    #[error("failed to encode argument {index} of {operation}: {source}")]
    Encode {
        operation: String,
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("blocking call to {operation} made from within an async runtime")]
    BlockingInAsyncContext { operation: String },

    #[error("failed to decode result of {operation}: {source}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

impl InvocationError {
    /// Number of attempts made, for errors produced by the retry loop.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            InvocationError::Terminal { attempts, .. }
            | InvocationError::RetriesExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// The fault observed by the last attempt, if any.
    pub fn cause(&self) -> Option<&Fault> {
        match self {
            InvocationError::Terminal { cause, .. }
            | InvocationError::RetriesExhausted { cause, .. } => Some(cause),
            _ => None,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, InvocationError::RetriesExhausted { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InvocationError::Terminal { .. })
    }
}

/// Errors returned while obtaining a proxy.
#[derive(Error, Debug)]
pub enum ProxyError {
    #[error(transparent)]
    Contract(#[from] ContractDescriptorError),

    #[error(transparent)]
    Generation(#[from] ProxyGenerationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to start blocking runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

pub type Result<T, E = InvocationError> = std::result::Result<T, E>;
