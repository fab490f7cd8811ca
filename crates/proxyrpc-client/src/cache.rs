//! Process-wide cache of generated proxy types.

use parking_lot::RwLock;
use proxyrpc_common::{ContractDescriptor, ContractId, ProxyGenerationError};
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use crate::generator::{ProxyGenerator, ProxyType};
use crate::provider::ProviderKind;

static GLOBAL: LazyLock<ProxyCache> = LazyLock::new(ProxyCache::new);

/// Construct-once cache of proxy types keyed by (contract, provider kind).
///
/// Lookups take a read lock. On a miss the write lock is taken and the key
/// checked again before generating, so concurrent first requests for a pair
/// generate exactly once and all observe the same `Arc<ProxyType>`.
///
/// # Example
///
/// ```
/// use proxyrpc_client::{ProviderKind, ProxyCache};
/// use proxyrpc_common::{ContractDeclaration, OperationDescriptor};
/// use std::sync::Arc;
///
/// struct MyConnector;
///
/// let contract = Arc::new(
///     ContractDeclaration::new("svc::Health")
///         .operation(OperationDescriptor::new("ping"))
///         .build()
///         .unwrap(),
/// );
///
/// let cache = ProxyCache::new();
/// let a = cache.get_or_generate(&contract, ProviderKind::of::<MyConnector>()).unwrap();
/// let b = cache.get_or_generate(&contract, ProviderKind::of::<MyConnector>()).unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// ```
#[derive(Debug, Default)]
pub struct ProxyCache {
    generator: ProxyGenerator,
    types: RwLock<HashMap<(ContractId, TypeId), Arc<ProxyType>>>,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cache used by `get_proxy` and friends.
    pub fn global() -> &'static ProxyCache {
        &GLOBAL
    }

    /// Returns the cached proxy type for the pair, generating it on first use.
    ///
    /// # Errors
    ///
    /// [`ProxyGenerationError::NameCollision`] if a different descriptor was
    /// already generated under the same contract id, or if the generator's
    /// naming scope already holds the label.
    pub fn get_or_generate(
        &self,
        contract: &Arc<ContractDescriptor>,
        provider: ProviderKind,
    ) -> Result<Arc<ProxyType>, ProxyGenerationError> {
        let key = (contract.id().clone(), provider.type_id());

        if let Some(ty) = self.types.read().get(&key) {
            return Self::verify(ty, contract);
        }

        let mut types = self.types.write();
        if let Some(ty) = types.get(&key) {
            return Self::verify(ty, contract);
        }

        let ty = self.generator.generate(contract.clone(), provider)?;
        types.insert(key, ty.clone());
        Ok(ty)
    }

    fn verify(
        ty: &Arc<ProxyType>,
        contract: &Arc<ContractDescriptor>,
    ) -> Result<Arc<ProxyType>, ProxyGenerationError> {
        if Arc::ptr_eq(ty.contract(), contract) || **ty.contract() == **contract {
            tracing::trace!("Proxy cache hit for {}", ty.label());
            return Ok(ty.clone());
        }
        Err(ProxyGenerationError::NameCollision(ty.label().to_string()))
    }

    pub fn get(&self, contract: &ContractId, provider: ProviderKind) -> Option<Arc<ProxyType>> {
        self.types
            .read()
            .get(&(contract.clone(), provider.type_id()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.types.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.read().is_empty()
    }

    pub fn generator(&self) -> &ProxyGenerator {
        &self.generator
    }
}
