//! Hook registry: id → hook storage behind the manager's catalog.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;

use crate::hook::Hook;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate hook id: {0}")]
    Duplicate(String),
}

/// Storage for registered hooks.
#[async_trait::async_trait]
pub trait HookRegistry: Send + Sync {
    /// All registered hooks.
    async fn get_all(&self) -> Vec<Arc<Hook>>;

    /// Store a hook. Fails without changes if `id` is taken.
    async fn put(&self, id: &str, hook: Arc<Hook>) -> Result<(), RegistryError>;

    /// Remove a hook. Returns whether it existed.
    async fn delete(&self, id: &str) -> bool;
}

/// In-process registry. Hooks live as long as the process.
pub struct MemoryRegistry {
    hooks: RwLock<HashMap<String, Arc<Hook>>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HookRegistry for MemoryRegistry {
    async fn get_all(&self) -> Vec<Arc<Hook>> {
        self.hooks.read().await.values().cloned().collect()
    }

    async fn put(&self, id: &str, hook: Arc<Hook>) -> Result<(), RegistryError> {
        let mut hooks = self.hooks.write().await;
        if hooks.contains_key(id) {
            return Err(RegistryError::Duplicate(id.to_string()));
        }
        hooks.insert(id.to_string(), hook);
        Ok(())
    }

    async fn delete(&self, id: &str) -> bool {
        self.hooks.write().await.remove(id).is_some()
    }
}
