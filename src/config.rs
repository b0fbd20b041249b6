//! Configuration
//!
//! Layered settings for a workspace of template inventories. Each entry of
//! `[inventories.<name>]` describes one inventory: where its template files
//! live, how elements are selected and keyed, and the version user data must
//! carry. See [`sources`] for the layering order.

use crate::error::{InventoryError, Result};
use crate::key::KeySchema;
use crate::logging::LoggingConfig;
use crate::walker::TemplateWalker;
use crate::xml::SelectionPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub mod sources;

/// Directory under a project that holds user override files
pub const USER_OVERRIDE_DIR_NAME: &str = "ConfigurationSettings";

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrataConfig {
    #[serde(default)]
    pub project: ProjectConfig,

    /// Inventories by name
    #[serde(default)]
    pub inventories: BTreeMap<String, InventoryConfig>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The project whose user overrides are loaded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project directory; user overrides live in its `ConfigurationSettings`
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Scope (project name) used to prefix user override files and registry keys
    #[serde(default)]
    pub scope: Option<String>,
}

/// One inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Template directories in priority order (later ones override earlier ones)
    pub directories: Vec<PathBuf>,

    /// Glob for template file names, e.g. `*.fwlayout`
    pub file_pattern: String,

    /// `/Wrapper/.../*` path selecting the elements in each file
    pub selection_path: String,

    #[serde(default)]
    pub key_attributes: Vec<KeyAttributeSpec>,

    /// Version stamped on user data; 0 means unversioned
    #[serde(default)]
    pub version: i32,

    #[serde(default)]
    pub conventions: LayoutConventions,

    /// Overrides the default user override directory
    #[serde(default)]
    pub user_override_dir: Option<PathBuf>,

    #[serde(default)]
    pub load_user_overrides: bool,
}

/// Key attributes for one element name, identity attribute last
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyAttributeSpec {
    pub element: String,
    pub attributes: Vec<String>,
}

/// Names used by grouping elements and writing-system tagged layouts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConventions {
    /// Grouping element name
    pub grouping_element: String,
    /// Attribute identifying a grouping element
    pub grouping_attribute: String,
    /// Grouping attribute used to name persisted named views
    pub label_attribute: String,
    /// Attribute of the grouping element's first child naming its class
    pub class_attribute: String,
    /// Element name of writing-system tagged layouts
    pub ws_element: String,
    /// Required `type` of a writing-system tagged layout
    pub ws_type: String,
    /// Boolean attribute marking a layout as writing-system tagged
    pub ws_flag: String,
    /// Attribute renamed when a tagged layout is expanded
    pub name_attribute: String,
}

impl Default for LayoutConventions {
    fn default() -> Self {
        Self {
            grouping_element: "layoutType".to_string(),
            grouping_attribute: "layout".to_string(),
            label_attribute: "label".to_string(),
            class_attribute: "class".to_string(),
            ws_element: "layout".to_string(),
            ws_type: "jtview".to_string(),
            ws_flag: "tagForWs".to_string(),
            name_attribute: "name".to_string(),
        }
    }
}

/// A configuration problem found by [`StrataConfig::validate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub inventory: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Inventory '{}': {}", self.inventory, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl InventoryConfig {
    /// The key schema described by `key_attributes`.
    pub fn key_schema(&self) -> KeySchema {
        let mut schema = KeySchema::new();
        for spec in &self.key_attributes {
            schema.insert(spec.element.clone(), spec.attributes.clone());
        }
        schema
    }

    /// Directories resolved against `root` when relative.
    pub fn resolved_directories(&self, root: &Path) -> Vec<PathBuf> {
        self.directories.iter().map(|d| resolve(root, d)).collect()
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut problems = Vec::new();
        if self.directories.is_empty() {
            problems.push("at least one template directory is required".to_string());
        }
        if let Err(e) = TemplateWalker::new(&self.file_pattern) {
            problems.push(e.to_string());
        }
        if let Err(e) = SelectionPath::parse(&self.selection_path) {
            problems.push(e.to_string());
        }
        if self.version < 0 {
            problems.push(format!("version must not be negative, got {}", self.version));
        }
        let mut seen = std::collections::HashSet::new();
        for spec in &self.key_attributes {
            if spec.attributes.is_empty() {
                problems.push(format!("key attributes for <{}> are empty", spec.element));
            }
            if !seen.insert(spec.element.as_str()) {
                problems.push(format!("key attributes for <{}> given twice", spec.element));
            }
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(problems)
        }
    }
}

impl StrataConfig {
    /// Check every inventory, collecting all problems.
    pub fn validate(&self) -> std::result::Result<(), Vec<ValidationError>> {
        let errors: Vec<ValidationError> = self
            .inventories
            .iter()
            .filter_map(|(name, inventory)| inventory.validate().err().map(|p| (name, p)))
            .flat_map(|(name, problems)| {
                problems.into_iter().map(move |message| ValidationError {
                    inventory: name.clone(),
                    message,
                })
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn inventory(&self, name: &str) -> Result<&InventoryConfig> {
        self.inventories
            .get(name)
            .ok_or_else(|| InventoryError::ConfigError(format!("No inventory named '{}'", name)))
    }

    /// Where user overrides for inventory `name` live: the inventory's own
    /// setting, else `<project>/ConfigurationSettings`, else a per-inventory
    /// directory under the platform data directory.
    pub fn user_override_dir(&self, name: &str, root: &Path) -> Option<PathBuf> {
        if let Some(dir) = self.inventories.get(name)?.user_override_dir.as_ref() {
            return Some(resolve(root, dir));
        }
        if let Some(project) = self.project.path.as_ref() {
            return Some(resolve(root, project).join(USER_OVERRIDE_DIR_NAME));
        }
        directories::ProjectDirs::from("org", "strata", "strata")
            .map(|dirs| dirs.data_dir().join(name).join(USER_OVERRIDE_DIR_NAME))
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Loads [`StrataConfig`] from the layered sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Defaults, global file, workspace files, then environment.
    pub fn load(workspace_root: &Path) -> Result<StrataConfig> {
        let builder = sources::builder_with_defaults()?;
        let builder = sources::add_global_file(builder)?;
        let builder = sources::add_workspace_files(builder, workspace_root)?;
        let builder = sources::add_environment(builder);
        Ok(builder.build()?.try_deserialize()?)
    }

    /// Defaults plus a single explicit file.
    pub fn load_from_file(path: &Path) -> Result<StrataConfig> {
        if !path.exists() {
            return Err(InventoryError::ConfigError(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        let config = sources::builder_with_defaults()?
            .add_source(config::File::from(path.to_path_buf()).required(true))
            .build()?;
        Ok(config.try_deserialize()?)
    }
}
