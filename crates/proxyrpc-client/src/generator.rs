//! Proxy type generation.
//!
//! A [`ProxyType`] is the runtime shape of a proxy: one [`DispatchRoutine`]
//! per operation of a contract, bound to a provider kind. Dispatch routines
//! only capture arguments into a [`CallThunk`]; everything else (channel,
//! retries, classification) belongs to the invoker.
//!
//! # Naming
//!
//! | Item         | Label                                      |
//! |--------------|--------------------------------------------|
//! | Proxy type   | `-proxy-{contract id}@{provider type path}`|
//! | Thunk type   | `-lambda-{declaring contract}.{op}`        |
//! | Display name | `{contract} (rpc proxy)`                   |
//!
//! The provider part is the connector's full type name, generics included,
//! so `Arc<a::Conn>` and `Arc<b::Conn>` get distinct labels.

use parking_lot::Mutex;
use proxyrpc_common::{ContractDescriptor, InvocationError, OperationDescriptor, ProxyGenerationError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::provider::ProviderKind;
use crate::thunk::CallThunk;

/// Forwarding routine for one operation.
#[derive(Debug)]
pub struct DispatchRoutine {
    operation: Arc<OperationDescriptor>,
    thunk_label: Arc<str>,
}

impl DispatchRoutine {
    fn new(operation: Arc<OperationDescriptor>, contract: &ContractDescriptor) -> Self {
        let declaring = match operation.declaring_contract() {
            "" => contract.id().short_name(),
            declaring => declaring,
        };
        let thunk_label = Arc::from(format!("-lambda-{}.{}", declaring, operation.name()));
        Self {
            operation,
            thunk_label,
        }
    }

    pub fn operation(&self) -> &Arc<OperationDescriptor> {
        &self.operation
    }

    pub fn thunk_label(&self) -> &str {
        &self.thunk_label
    }

    /// Captures encoded arguments, in declaration order, into a fresh thunk.
    ///
    /// # Errors
    ///
    /// [`InvocationError::ArityMismatch`] if the argument count differs from
    /// the operation's parameter count.
    pub fn capture(&self, args: Vec<Value>) -> Result<CallThunk, InvocationError> {
        if args.len() != self.operation.arity() {
            return Err(InvocationError::ArityMismatch {
                operation: self.operation.name().to_string(),
                expected: self.operation.arity(),
                actual: args.len(),
            });
        }
        Ok(CallThunk::new(
            self.operation.clone(),
            self.thunk_label.clone(),
            args,
        ))
    }
}

/// A generated proxy type: immutable and shared for the process lifetime.
pub struct ProxyType {
    label: String,
    display_name: String,
    contract: Arc<ContractDescriptor>,
    provider: ProviderKind,
    routines: Vec<DispatchRoutine>,
    index: HashMap<String, usize>,
}

impl ProxyType {
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Human-readable name, e.g. `Catalog (rpc proxy)`.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn contract(&self) -> &Arc<ContractDescriptor> {
        &self.contract
    }

    pub fn provider_kind(&self) -> ProviderKind {
        self.provider
    }

    pub fn routines(&self) -> &[DispatchRoutine] {
        &self.routines
    }

    pub fn routine(&self, operation: &str) -> Option<&DispatchRoutine> {
        self.index.get(operation).map(|&i| &self.routines[i])
    }

    pub fn len(&self) -> usize {
        self.routines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routines.is_empty()
    }

    /// Fails unless this type was generated for provider kind `actual`.
    pub fn check_provider(&self, actual: ProviderKind) -> Result<(), ProxyGenerationError> {
        if self.provider == actual {
            return Ok(());
        }
        Err(ProxyGenerationError::ProviderMismatch {
            proxy: self.label.clone(),
            expected: self.provider.name().to_string(),
            actual: actual.name().to_string(),
        })
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name)
    }
}

impl fmt::Debug for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyType")
            .field("label", &self.label)
            .field("operations", &self.routines.len())
            .finish()
    }
}

/// Builds proxy types and owns their naming scope.
///
/// Labels are registered for the generator's lifetime; generating a second
/// type with a label already taken fails with
/// [`ProxyGenerationError::NameCollision`]. Use a [`ProxyCache`] to get a
/// type generated at most once.
///
/// [`ProxyCache`]: crate::cache::ProxyCache
#[derive(Debug, Default)]
pub struct ProxyGenerator {
    names: Mutex<HashSet<String>>,
    generated: AtomicUsize,
}

impl ProxyGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates the proxy type of `contract` for provider kind `provider`.
    ///
    /// # Arguments
    ///
    /// * `contract` - Flattened contract descriptor
    /// * `provider` - Kind of invoker provider the proxy will hold
    ///
    /// # Returns
    ///
    /// A shared proxy type with one dispatch routine per operation
    pub fn generate(
        &self,
        contract: Arc<ContractDescriptor>,
        provider: ProviderKind,
    ) -> Result<Arc<ProxyType>, ProxyGenerationError> {
        let label = format!("-proxy-{}@{}", contract.id(), provider.path());

        if !self.names.lock().insert(label.clone()) {
            return Err(ProxyGenerationError::NameCollision(label));
        }

        let routines: Vec<_> = contract
            .operations()
            .iter()
            .map(|op| DispatchRoutine::new(op.clone(), &contract))
            .collect();
        let index = routines
            .iter()
            .enumerate()
            .map(|(i, routine)| (routine.operation.name().to_string(), i))
            .collect();

        self.generated.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(
            "Generated proxy type {} with {} dispatch routines",
            label,
            routines.len()
        );

        Ok(Arc::new(ProxyType {
            display_name: format!("{} (rpc proxy)", contract.id().short_name()),
            label,
            contract,
            provider,
            routines,
            index,
        }))
    }

    /// Number of proxy types generated so far.
    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::Relaxed)
    }

    pub fn is_registered(&self, label: &str) -> bool {
        self.names.lock().contains(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxyrpc_common::{ContractDeclaration, OperationDescriptor};
    use serde_json::json;

    struct TcpConnector;
    struct UdsConnector;

    fn catalog() -> Arc<ContractDescriptor> {
        let health = Arc::new(
            ContractDeclaration::new("svc::Health")
                .operation(OperationDescriptor::new("ping").returns::<String>()),
        );
        Arc::new(
            ContractDeclaration::new("svc::Catalog")
                .extends(health)
                .operation(
                    OperationDescriptor::new("get_value")
                        .param::<i32>()
                        .returns::<String>(),
                )
                .operation(OperationDescriptor::new("set_value").param::<i32>().param::<String>())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_one_routine_per_operation() {
        let contract = catalog();
        let ty = ProxyGenerator::new()
            .generate(contract.clone(), ProviderKind::of::<TcpConnector>())
            .unwrap();

        assert_eq!(ty.len(), contract.len());
        for (routine, op) in ty.routines().iter().zip(contract.operations()) {
            assert_eq!(routine.operation().signature(), op.signature());
        }
    }

    #[test]
    fn test_labels() {
        let ty = ProxyGenerator::new()
            .generate(catalog(), ProviderKind::of::<TcpConnector>())
            .unwrap();

        assert_eq!(
            ty.label(),
            "-proxy-svc::Catalog@proxyrpc_client::generator::tests::TcpConnector"
        );
        assert_eq!(ty.to_string(), "Catalog (rpc proxy)");
        assert_eq!(
            ty.routine("get_value").unwrap().thunk_label(),
            "-lambda-Catalog.get_value"
        );
        assert_eq!(ty.routine("ping").unwrap().thunk_label(), "-lambda-Health.ping");
    }

    #[test]
    fn test_name_collision() {
        let generator = ProxyGenerator::new();
        let kind = ProviderKind::of::<TcpConnector>();

        generator.generate(catalog(), kind).unwrap();
        let err = generator.generate(catalog(), kind).unwrap_err();

        assert_eq!(
            err,
            ProxyGenerationError::NameCollision(
                "-proxy-svc::Catalog@proxyrpc_client::generator::tests::TcpConnector".into()
            )
        );
        assert_eq!(generator.generated_count(), 1);
    }

    #[test]
    fn test_distinct_providers_do_not_collide() {
        let generator = ProxyGenerator::new();
        generator
            .generate(catalog(), ProviderKind::of::<TcpConnector>())
            .unwrap();
        generator
            .generate(catalog(), ProviderKind::of::<UdsConnector>())
            .unwrap();

        assert_eq!(generator.generated_count(), 2);
        assert!(generator
            .is_registered("-proxy-svc::Catalog@proxyrpc_client::generator::tests::UdsConnector"));
    }

    mod east {
        pub struct Conn;
    }

    mod west {
        pub struct Conn;
    }

    #[test]
    fn test_same_short_name_does_not_collide() {
        let generator = ProxyGenerator::new();

        let a = generator
            .generate(catalog(), ProviderKind::of::<Arc<east::Conn>>())
            .unwrap();
        let b = generator
            .generate(catalog(), ProviderKind::of::<Arc<west::Conn>>())
            .unwrap();
        generator
            .generate(catalog(), ProviderKind::of::<east::Conn>())
            .unwrap();
        generator
            .generate(catalog(), ProviderKind::of::<west::Conn>())
            .unwrap();

        assert_ne!(a.label(), b.label());
        assert_eq!(generator.generated_count(), 4);
    }

    #[test]
    fn test_capture_checks_arity() {
        let ty = ProxyGenerator::new()
            .generate(catalog(), ProviderKind::of::<TcpConnector>())
            .unwrap();
        let routine = ty.routine("set_value").unwrap();

        let thunk = routine.capture(vec![json!(1), json!("one")]).unwrap();
        assert_eq!(thunk.args(), &[json!(1), json!("one")]);
        assert_eq!(thunk.label(), "-lambda-Catalog.set_value");

        let err = routine.capture(vec![json!(1)]).unwrap_err();
        assert!(matches!(
            err,
            InvocationError::ArityMismatch {
                expected: 2,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_check_provider() {
        let ty = ProxyGenerator::new()
            .generate(catalog(), ProviderKind::of::<TcpConnector>())
            .unwrap();

        assert!(ty.check_provider(ProviderKind::of::<TcpConnector>()).is_ok());
        assert!(matches!(
            ty.check_provider(ProviderKind::of::<UdsConnector>()),
            Err(ProxyGenerationError::ProviderMismatch { .. })
        ));
    }
}
