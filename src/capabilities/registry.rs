//! Capability Registry — the ordered, startup-built set of capabilities.
//!
//! Registration order is significant: it is the precedence the intent
//! matcher uses when more than one capability's predicate is true. The
//! registry is assembled once through [`RegistryBuilder`] and is read-only
//! afterwards, so it can be shared across requests behind an `Arc` without
//! any locking.

use std::collections::HashSet;

use thiserror::Error;

use super::capability::{Capability, CapabilityDescriptor};

/// Errors raised while building a registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A capability with this name was already registered.
    #[error("capability '{0}' is already registered")]
    DuplicateName(String),
}

/// Collects capabilities in registration order.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    capabilities: Vec<Capability>,
    names: HashSet<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a capability. Fails if its name is already present.
    pub fn register(mut self, capability: Capability) -> Result<Self, RegistryError> {
        if !self.names.insert(capability.name.clone()) {
            return Err(RegistryError::DuplicateName(capability.name));
        }
        tracing::debug!(
            capability = %capability.name,
            position = self.capabilities.len(),
            "registered capability"
        );
        self.capabilities.push(capability);
        Ok(self)
    }

    /// Register every capability in iteration order.
    pub fn register_all(
        self,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Result<Self, RegistryError> {
        capabilities
            .into_iter()
            .try_fold(self, |builder, cap| builder.register(cap))
    }

    /// Freeze the registry.
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry {
            capabilities: self.capabilities,
        }
    }
}

/// Immutable, ordered capability registry.
#[derive(Debug, Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: Vec<Capability>,
}

impl CapabilityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Capabilities in registration order.
    pub fn list(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Look up a capability by its exact name.
    pub fn get(&self, name: &str) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.capabilities.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities.iter().map(Capability::descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}
