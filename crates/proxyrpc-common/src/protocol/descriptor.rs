//! Operation descriptors.
//!
//! An [`OperationDescriptor`] is the static metadata of one remotely callable
//! operation: its name, its ordered parameter types, its return type and
//! whether it is safe to re-issue.

use serde::Serialize;
use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;

/// Name of a parameter or return type.
///
/// Types are compared by name only. Descriptors built from Rust types use
/// [`std::any::type_name`], descriptors coming from a schema use whatever
/// name the schema gives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeDescriptor(Cow<'static, str>);

impl TypeDescriptor {
    pub fn of<T: ?Sized>() -> Self {
        TypeDescriptor(Cow::Borrowed(std::any::type_name::<T>()))
    }

    pub fn named(name: impl Into<String>) -> Self {
        TypeDescriptor(Cow::Owned(name.into()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Return type of an operation.
///
/// `Void` operations are executed through the invoker's void path and
/// produce no value for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnType {
    Void,
    Value(TypeDescriptor),
}

impl ReturnType {
    /// `()` maps to `Void`, everything else to `Value`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        if TypeId::of::<T>() == TypeId::of::<()>() {
            ReturnType::Void
        } else {
            ReturnType::Value(TypeDescriptor::of::<T>())
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, ReturnType::Void)
    }
}

impl fmt::Display for ReturnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReturnType::Void => f.write_str("()"),
            ReturnType::Value(ty) => ty.fmt(f),
        }
    }
}

/// Name, parameter types and return type of an operation.
///
/// Two operations with the same signature are the same operation, even when
/// they are declared on different contracts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Signature {
    pub name: String,
    pub params: Vec<TypeDescriptor>,
    pub returns: ReturnType,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            param.fmt(f)?;
        }
        write!(f, ") -> {}", self.returns)
    }
}

/// Static metadata of one remotely callable operation.
///
/// # Example
///
/// ```
/// use proxyrpc_common::OperationDescriptor;
///
/// let op = OperationDescriptor::new("transfer")
///     .param::<u64>()
///     .param::<String>()
///     .returns::<bool>()
///     .idempotent(false);
///
/// assert_eq!(op.arity(), 2);
/// assert!(!op.is_idempotent());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationDescriptor {
    name: String,
    params: Vec<TypeDescriptor>,
    returns: ReturnType,
    idempotent: bool,
    declared_in: String,
}

impl OperationDescriptor {
    /// A parameterless, void, idempotent operation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ReturnType::Void,
            idempotent: true,
            declared_in: String::new(),
        }
    }

    pub fn param<T: ?Sized>(self) -> Self {
        self.with_param(TypeDescriptor::of::<T>())
    }

    pub fn with_param(mut self, ty: TypeDescriptor) -> Self {
        self.params.push(ty);
        self
    }

    pub fn returns<T: ?Sized + 'static>(self) -> Self {
        self.with_return(ReturnType::of::<T>())
    }

    pub fn with_return(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    /// Marks whether the operation may be re-issued after a failed attempt.
    pub fn idempotent(mut self, idempotent: bool) -> Self {
        self.idempotent = idempotent;
        self
    }

    pub(crate) fn declared_by(mut self, contract: &str) -> Self {
        self.declared_in = contract.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[TypeDescriptor] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn returns_type(&self) -> &ReturnType {
        &self.returns
    }

    pub fn is_void(&self) -> bool {
        self.returns.is_void()
    }

    pub fn is_idempotent(&self) -> bool {
        self.idempotent
    }

    /// Short name of the contract that declared this operation.
    ///
    /// Empty until the operation is added to a contract declaration.
    pub fn declaring_contract(&self) -> &str {
        &self.declared_in
    }

    pub fn signature(&self) -> Signature {
        Signature {
            name: self.name.clone(),
            params: self.params.clone(),
            returns: self.returns.clone(),
        }
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.signature().fmt(f)?;
        if !self.idempotent {
            f.write_str(" [non-idempotent]")?;
        }
        Ok(())
    }
}
