//! Contract declarations and descriptors.
//!
//! A [`ContractDeclaration`] is the raw, externally supplied shape of a
//! contract: its own members (some of which may not be remotely callable) and
//! the contracts it extends. [`ContractDescriptor::build`] flattens that
//! hierarchy into the ordered, deduplicated set of operations a proxy has to
//! implement.
//!
//! # Flattening Rules
//!
//! - Own members come first, then each parent in declaration order (depth first)
//! - Members not marked remotely callable are skipped
//! - Identical signatures declared more than once collapse into one operation
//! - Same name with a different signature (or idempotency) is a conflict
//! - A contract reached twice through a diamond is only walked once

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use super::descriptor::OperationDescriptor;
use super::error::ContractDescriptorError;

/// Identity of a contract: its fully qualified name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ContractId(Arc<str>);

impl ContractId {
    pub fn new(id: impl AsRef<str>) -> Self {
        ContractId(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last path segment, e.g. `Catalog` for `inventory::api::Catalog`.
    pub fn short_name(&self) -> &str {
        self.0.rsplit("::").next().unwrap_or(&self.0)
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContractId {
    fn from(id: &str) -> Self {
        ContractId::new(id)
    }
}

impl From<String> for ContractId {
    fn from(id: String) -> Self {
        ContractId::new(id)
    }
}

/// One member of a contract declaration.
#[derive(Debug, Clone)]
pub struct MemberDeclaration {
    pub operation: OperationDescriptor,
    pub remotely_callable: bool,
}

/// The unresolved declaration of a contract.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use proxyrpc_common::{ContractDeclaration, OperationDescriptor};
///
/// let base = Arc::new(
///     ContractDeclaration::new("svc::Health").operation(OperationDescriptor::new("ping")),
/// );
///
/// let catalog = ContractDeclaration::new("svc::Catalog")
///     .extends(base)
///     .operation(OperationDescriptor::new("get_value").param::<i32>().returns::<String>())
///     .local_member(OperationDescriptor::new("helper"));
///
/// let descriptor = catalog.build().unwrap();
/// let names: Vec<_> = descriptor.operations().iter().map(|op| op.name()).collect();
/// assert_eq!(names, ["get_value", "ping"]);
/// ```
#[derive(Debug, Clone)]
pub struct ContractDeclaration {
    id: ContractId,
    parents: Vec<Arc<ContractDeclaration>>,
    members: Vec<MemberDeclaration>,
}

impl ContractDeclaration {
    pub fn new(id: impl Into<ContractId>) -> Self {
        Self {
            id: id.into(),
            parents: Vec::new(),
            members: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: Arc<ContractDeclaration>) -> Self {
        self.parents.push(parent);
        self
    }

    /// Adds a remotely callable operation.
    pub fn operation(mut self, operation: OperationDescriptor) -> Self {
        let operation = operation.declared_by(self.id.short_name());
        self.members.push(MemberDeclaration {
            operation,
            remotely_callable: true,
        });
        self
    }

    /// Adds a member that is part of the declaration but not remotely callable.
    pub fn local_member(mut self, operation: OperationDescriptor) -> Self {
        let operation = operation.declared_by(self.id.short_name());
        self.members.push(MemberDeclaration {
            operation,
            remotely_callable: false,
        });
        self
    }

    pub fn id(&self) -> &ContractId {
        &self.id
    }

    pub fn parents(&self) -> &[Arc<ContractDeclaration>] {
        &self.parents
    }

    pub fn members(&self) -> &[MemberDeclaration] {
        &self.members
    }

    pub fn build(&self) -> Result<ContractDescriptor, ContractDescriptorError> {
        ContractDescriptor::build(self)
    }
}

/// The flattened, immutable operation set of a contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractDescriptor {
    id: ContractId,
    operations: Vec<Arc<OperationDescriptor>>,
    ancestors: Vec<ContractId>,
}

/// Accumulator for one flattening pass.
struct Flattener<'a> {
    root: &'a ContractId,
    path: Vec<ContractId>,
    visited: HashSet<ContractId>,
    operations: Vec<Arc<OperationDescriptor>>,
    by_name: HashMap<String, usize>,
    ancestors: Vec<ContractId>,
}

impl<'a> Flattener<'a> {
    fn walk(&mut self, declaration: &ContractDeclaration) -> Result<(), ContractDescriptorError> {
        if self.path.contains(&declaration.id) {
            return Err(ContractDescriptorError::InheritanceCycle {
                contract: self.root.to_string(),
            });
        }
        if !self.visited.insert(declaration.id.clone()) {
            return Ok(());
        }

        self.path.push(declaration.id.clone());

        for member in declaration.members.iter().filter(|m| m.remotely_callable) {
            self.add(&member.operation)?;
        }

        for parent in &declaration.parents {
            if !self.ancestors.contains(&parent.id) && parent.id != *self.root {
                self.ancestors.push(parent.id.clone());
            }
            self.walk(parent)?;
        }

        self.path.pop();
        Ok(())
    }

    fn add(&mut self, operation: &OperationDescriptor) -> Result<(), ContractDescriptorError> {
        match self.by_name.get(operation.name()) {
            Some(&index) => {
                let existing = &self.operations[index];
                if existing.signature() != operation.signature()
                    || existing.is_idempotent() != operation.is_idempotent()
                {
                    return Err(ContractDescriptorError::SignatureConflict {
                        contract: self.root.to_string(),
                        operation: operation.name().to_string(),
                        existing: existing.to_string(),
                        conflicting: operation.to_string(),
                    });
                }
                Ok(())
            }
            None => {
                self.by_name
                    .insert(operation.name().to_string(), self.operations.len());
                self.operations.push(Arc::new(operation.clone()));
                Ok(())
            }
        }
    }
}

impl ContractDescriptor {
    /// Flattens a declaration and its ancestors into a descriptor.
    ///
    /// # Errors
    ///
    /// - [`ContractDescriptorError::NoOperations`] if nothing in the hierarchy is remotely callable
    /// - [`ContractDescriptorError::SignatureConflict`] if a name is declared with two signatures
    /// - [`ContractDescriptorError::InheritanceCycle`] if a contract reaches itself
    pub fn build(declaration: &ContractDeclaration) -> Result<Self, ContractDescriptorError> {
        let mut flattener = Flattener {
            root: &declaration.id,
            path: Vec::new(),
            visited: HashSet::new(),
            operations: Vec::new(),
            by_name: HashMap::new(),
            ancestors: Vec::new(),
        };
        flattener.walk(declaration)?;

        if flattener.operations.is_empty() {
            return Err(ContractDescriptorError::NoOperations {
                contract: declaration.id.to_string(),
            });
        }

        Ok(Self {
            id: declaration.id.clone(),
            operations: flattener.operations,
            ancestors: flattener.ancestors,
        })
    }

    pub fn id(&self) -> &ContractId {
        &self.id
    }

    pub fn operations(&self) -> &[Arc<OperationDescriptor>] {
        &self.operations
    }

    pub fn operation(&self, name: &str) -> Option<&Arc<OperationDescriptor>> {
        self.operations.iter().find(|op| op.name() == name)
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Every contract this one extends, directly or transitively.
    pub fn ancestors(&self) -> &[ContractId] {
        &self.ancestors
    }

    pub fn extends(&self, contract: &ContractId) -> bool {
        self.ancestors.contains(contract)
    }
}
