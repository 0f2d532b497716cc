//! Virtualization backends.
//!
//! A hypervisor record names the backend able to manage its guests in
//! [`Machine::virtualization_api`]. Deleting a virtual machine first asks
//! that backend to decommission the guest; the record is only removed when
//! decommissioning succeeded.

mod command;

use crate::error::{Error, Result};
use crate::model::Machine;
use std::collections::HashMap;
use std::sync::Arc;

pub use command::CommandBackend;

/// Capability to decommission a virtual instance.
pub trait VirtualizationBackend: Send + Sync {
    /// Backend kind, matched against [`Machine::virtualization_api`].
    fn kind(&self) -> &str;

    /// Tear down the guest `machine`.
    fn decommission(&self, machine: &Machine) -> Result<()>;
}

/// Backends available to this process, by kind.
#[derive(Default, Clone)]
pub struct BackendRegistry {
    backends: HashMap<String, Arc<dyn VirtualizationBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configured command backends.
    pub fn from_config(configs: &[crate::config::BackendConfig]) -> Result<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(Arc::new(CommandBackend::from_config(config)?))?;
        }
        Ok(registry)
    }

    /// Register a backend. Kinds must be unique.
    pub fn register(&mut self, backend: Arc<dyn VirtualizationBackend>) -> Result<()> {
        let kind = backend.kind().to_string();
        if self.backends.contains_key(&kind) {
            return Err(Error::Config(format!(
                "virtualization backend '{}' registered twice",
                kind
            )));
        }
        tracing::debug!(kind = %kind, "registered virtualization backend");
        self.backends.insert(kind, backend);
        Ok(())
    }

    /// Backend of the given kind.
    pub fn get(&self, kind: &str) -> Option<Arc<dyn VirtualizationBackend>> {
        self.backends.get(kind).cloned()
    }

    /// Backend configured for a hypervisor record.
    pub fn for_hypervisor(&self, hypervisor: &Machine) -> Option<Arc<dyn VirtualizationBackend>> {
        hypervisor
            .virtualization_api
            .as_deref()
            .and_then(|kind| self.get(kind))
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<_> = self.backends.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
