//! API server state.

use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;

use crate::auth::{Principal, TokenStore};
use crate::command::CommandRegistry;
use crate::delete::DeleteContext;
use crate::storage::ResourceRepository;
use crate::virt::BackendRegistry;

/// Shared API server state. Read-only after startup apart from the
/// in-flight set inside the delete context.
pub struct ApiState {
    delete: DeleteContext,
    tokens: TokenStore,
    registry: CommandRegistry,
}

impl ApiState {
    /// Create a new API state.
    pub fn new(
        repository: Arc<dyn ResourceRepository>,
        backends: BackendRegistry,
        tokens: TokenStore,
    ) -> Self {
        Self {
            delete: DeleteContext::new(repository, backends),
            tokens,
            registry: CommandRegistry::new(),
        }
    }

    /// Collaborators of the delete handlers.
    pub fn delete_context(&self) -> &DeleteContext {
        &self.delete
    }

    /// The command registry.
    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Resolve the caller from request headers.
    pub fn authenticate(&self, headers: &HeaderMap) -> Principal {
        let header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
        self.tokens.authenticate(header)
    }
}
