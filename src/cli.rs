//! Command-line interface: clap definitions and command execution.

use crate::config::{ConfigLoader, StrataConfig};
use crate::element::Element;
use crate::logging::LoggingConfig;
use crate::registry::InventoryRegistry;
use crate::xml::XmlDocument;
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::fmt::Write as _;
use std::path::PathBuf;
use std::rc::Rc;

/// Value meaning "attribute absent" in key arguments
pub const ABSENT_VALUE: &str = "~";

/// Strata - layered configuration template inventories
#[derive(Parser, Debug)]
#[command(name = "strata")]
#[command(about = "Resolve layered XML configuration templates")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the resolved element for a key
    Get {
        /// Inventory name
        inventory: String,
        /// Element name
        element: String,
        /// Key attribute values in schema order; `~` for an absent attribute
        values: Vec<String>,
    },
    /// List resolved elements, optionally filtered by a path query
    List {
        inventory: String,
        /// Query such as `layout[@class='LexEntry']`
        #[arg(long)]
        path: Option<String>,
    },
    /// List grouping elements
    LayoutTypes { inventory: String },
    /// Validate the configuration and load every inventory
    Check,
}

/// Loaded configuration plus the workspace it belongs to
pub struct RunContext {
    pub workspace: PathBuf,
    pub config: StrataConfig,
}

impl RunContext {
    pub fn new(workspace: PathBuf, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let workspace = dunce::canonicalize(&workspace).unwrap_or(workspace);
        let config = match config_path {
            Some(path) => ConfigLoader::load_from_file(&path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ConfigLoader::load(&workspace)
                .with_context(|| format!("loading config for {}", workspace.display()))?,
        };
        Ok(Self { workspace, config })
    }

    fn validate(&self) -> anyhow::Result<()> {
        if let Err(errors) = self.config.validate() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            bail!("Configuration validation failed:\n{}", messages.join("\n"));
        }
        Ok(())
    }

    fn registry(&self) -> anyhow::Result<InventoryRegistry> {
        self.validate()?;
        Ok(InventoryRegistry::from_config(&self.config, &self.workspace)?)
    }

    /// Run a command and return what it prints.
    pub fn execute(&self, command: &Commands) -> anyhow::Result<String> {
        let scope = self.config.project.scope.as_deref();
        match command {
            Commands::Get {
                inventory,
                element,
                values,
            } => {
                let mut registry = self.registry()?;
                let inv = registry.get_or_error(inventory, scope)?;
                let values = parse_key_values(values);
                match inv.get_element(element, &values) {
                    Some(found) => render(&found),
                    None => bail!("No <{}> with key {:?}", element, values),
                }
            }
            Commands::List { inventory, path } => {
                let mut registry = self.registry()?;
                let inv = registry.get_or_error(inventory, scope)?;
                let elements = match path {
                    Some(path) => inv.get_elements(path)?,
                    None => inv.elements().to_vec(),
                };
                let mut out = String::new();
                for element in &elements {
                    let key = inv.key_schema().values_of(element);
                    let key: Vec<&str> = key
                        .iter()
                        .map(|v| v.as_deref().unwrap_or(ABSENT_VALUE))
                        .collect();
                    writeln!(out, "{}\t{}", element.name, key.join("\t"))?;
                }
                Ok(out.trim_end().to_string())
            }
            Commands::LayoutTypes { inventory } => {
                let mut registry = self.registry()?;
                let inv = registry.get_or_error(inventory, scope)?;
                let types = inv.get_layout_types();
                let rendered: anyhow::Result<Vec<String>> = types.iter().map(render).collect();
                Ok(rendered?.join("\n"))
            }
            Commands::Check => {
                let registry = self.registry()?;
                let mut out = String::new();
                for key in registry.keys() {
                    let (name, scope) = match key.split_once('$') {
                        Some((name, scope)) => (name, Some(scope)),
                        None => (key, None),
                    };
                    if let Some(inv) = registry.get(name, scope) {
                        writeln!(
                            out,
                            "{}: {} elements from {} files",
                            key,
                            inv.elements().len(),
                            inv.file_stamps().len()
                        )?;
                    }
                }
                Ok(out.trim_end().to_string())
            }
        }
    }
}

/// `~` becomes an absent value.
pub fn parse_key_values(values: &[String]) -> Vec<Option<&str>> {
    values
        .iter()
        .map(|v| (v != ABSENT_VALUE).then_some(v.as_str()))
        .collect()
}

fn render(element: &Rc<Element>) -> anyhow::Result<String> {
    let xml = XmlDocument::new(Element::clone(element)).to_xml_string()?;
    Ok(xml
        .lines()
        .skip_while(|line| line.starts_with("<?xml"))
        .collect::<Vec<_>>()
        .join("\n"))
}

/// Logging settings from the config file, adjusted by command-line flags.
pub fn build_logging_config(cli: &Cli) -> LoggingConfig {
    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(&cli.workspace),
    };
    let mut config = loaded.map(|c| c.logging).unwrap_or_default();

    if cli.verbose {
        config.level = "debug".to_string();
    }
    if let Some(level) = &cli.log_level {
        config.level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.format = format.clone();
    }
    if let Some(output) = &cli.log_output {
        config.output = output.clone();
    }
    config
}
