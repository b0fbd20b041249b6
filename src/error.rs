//! Error types for the strata template inventory.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, resolving or persisting inventory elements
#[derive(Debug, Error)]
pub enum InventoryError {
    #[error("No base found to override {0}")]
    NoBaseToOverride(String),

    #[error("Only one level of override is allowed: {0}")]
    OverrideDepthExceeded(String),

    #[error("Element <{0}> has a base attribute but no key attributes")]
    BaseWithoutKey(String),

    #[error("Invalid selection path {0:?}: must start with '/' and end with '/*'")]
    InvalidSelectionPath(String),

    #[error("Invalid file pattern {pattern:?}: {reason}")]
    InvalidFilePattern { pattern: String, reason: String },

    #[error("Element <{element}> is missing required attribute {attribute:?}")]
    MissingAttribute { element: String, attribute: String },

    #[error("Invalid version {0:?}")]
    InvalidVersion(String),

    #[error("Error reading XML file {path:?}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Cannot build an override from this path: {0}")]
    InvalidOverridePath(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Inventory I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl InventoryError {
    /// Whether this error came from the filesystem refusing access.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, InventoryError::IoError(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }
}

impl From<config::ConfigError> for InventoryError {
    fn from(err: config::ConfigError) -> Self {
        InventoryError::ConfigError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, InventoryError>;
