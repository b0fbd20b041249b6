//! Inventory registry: named inventories owned by the application.
//!
//! Inventories are keyed by name plus an optional scope, so several projects
//! can keep their own copy of the same inventory side by side.

use crate::config::StrataConfig;
use crate::error::{InventoryError, Result};
use crate::inventory::Inventory;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

/// Registry of loaded inventories
#[derive(Debug, Default)]
pub struct InventoryRegistry {
    inventories: HashMap<String, Inventory>,
}

/// `name$scope`, or just `name` without a scope
fn registry_key(name: &str, scope: Option<&str>) -> String {
    match scope.filter(|s| !s.is_empty()) {
        Some(scope) => format!("{}${}", name, scope),
        None => name.to_string(),
    }
}

impl InventoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str, scope: Option<&str>) -> Option<&Inventory> {
        self.inventories.get(&registry_key(name, scope))
    }

    pub fn get_mut(&mut self, name: &str, scope: Option<&str>) -> Option<&mut Inventory> {
        self.inventories.get_mut(&registry_key(name, scope))
    }

    /// Get an inventory or fail with a registry error.
    pub fn get_or_error(&mut self, name: &str, scope: Option<&str>) -> Result<&mut Inventory> {
        let key = registry_key(name, scope);
        self.inventories
            .get_mut(&key)
            .ok_or_else(|| InventoryError::Registry(format!("Inventory not found: {}", key)))
    }

    /// Register `inventory` under (name, scope), returning the one it replaces.
    ///
    /// An inventory without a scope adopts `scope`; one already bound to a
    /// different scope is rejected.
    pub fn set(
        &mut self,
        name: &str,
        scope: Option<&str>,
        mut inventory: Inventory,
    ) -> Result<Option<Inventory>> {
        if name.is_empty() {
            return Err(InventoryError::Registry("Invalid key argument".to_string()));
        }
        let own_scope = inventory.scope().map(str::to_string);
        match (own_scope.as_deref(), scope) {
            (None, _) => inventory.set_scope(scope.map(str::to_string)),
            (Some(own), Some(requested)) if own == requested => {}
            (Some(own), requested) => {
                return Err(InventoryError::Registry(format!(
                    "Inventory is bound to scope '{}', not {:?}",
                    own, requested
                )))
            }
        }
        Ok(self.inventories.insert(registry_key(name, scope), inventory))
    }

    pub fn remove(&mut self, name: &str, scope: Option<&str>) -> Option<Inventory> {
        self.inventories.remove(&registry_key(name, scope))
    }

    pub fn len(&self) -> usize {
        self.inventories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inventories.is_empty()
    }

    /// Registry keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.inventories.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Build and load every configured inventory, including user overrides
    /// where enabled. Relative paths are resolved against `root`.
    pub fn from_config(config: &StrataConfig, root: &Path) -> Result<Self> {
        let mut registry = Self::new();
        let scope = config.project.scope.as_deref();
        for (name, settings) in &config.inventories {
            let mut inventory = Inventory::from_config(config, name, root)?;
            inventory.load()?;
            if settings.load_user_overrides {
                inventory.load_user_overrides(settings.version, scope)?;
            }
            info!(
                inventory = %name,
                elements = inventory.elements().len(),
                "Registered inventory"
            );
            registry.set(name, scope, inventory)?;
        }
        Ok(registry)
    }
}
