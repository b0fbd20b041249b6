//! Logging
//!
//! `tracing` subscriber setup. Level, format and destination come from the
//! `[logging]` config table, overridden by `STRATA_LOG`, `STRATA_LOG_FORMAT`,
//! `STRATA_LOG_OUTPUT` and `STRATA_LOG_MODULES`.

use crate::error::{InventoryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    /// json or text
    #[serde(default = "default_format")]
    pub format: String,

    /// stdout, stderr or file
    #[serde(default = "default_output")]
    pub output: String,

    /// Log file, used when output is "file"
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// ANSI colors for text output to a terminal
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-module levels, e.g. `strata::inventory = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

fn default_output() -> String {
    "stderr".to_string()
}

fn default_log_file() -> PathBuf {
    PathBuf::from(".strata/strata.log")
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            output: default_output(),
            file: default_log_file(),
            color: default_true(),
            modules: HashMap::new(),
        }
    }
}

/// Where log lines go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputTarget {
    Stdout,
    Stderr,
    File,
}

/// Install the global subscriber.
///
/// Environment variables win over `config`, which wins over defaults.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<()> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    let filter = build_env_filter(config)?;
    let json = determine_format(config)? == "json";
    let target = determine_output(config)?;

    let writer = match target {
        OutputTarget::Stdout => BoxMakeWriter::new(std::io::stdout),
        OutputTarget::Stderr => BoxMakeWriter::new(std::io::stderr),
        OutputTarget::File => BoxMakeWriter::new(open_log_file(&config.file)?),
    };
    let ansi = config.color && target != OutputTarget::File;

    let registry = Registry::default().with(filter);
    let installed = if json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_writer(writer),
            )
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_timer(ChronoUtc::rfc_3339())
                    .with_ansi(ansi)
                    .with_writer(writer),
            )
            .try_init()
    };
    installed.map_err(|e| InventoryError::ConfigError(format!("Failed to install logger: {}", e)))
}

fn open_log_file(path: &Path) -> Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            InventoryError::ConfigError(format!("Failed to open log file {:?}: {}", path, e))
        })
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_env("STRATA_LOG") {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    let mut directives: Vec<String> = config
        .modules
        .iter()
        .map(|(module, level)| format!("{}={}", module, level))
        .collect();
    if let Ok(modules) = std::env::var("STRATA_LOG_MODULES") {
        directives.extend(parse_module_levels(&modules));
    }
    for directive in directives {
        filter = filter.add_directive(directive.parse().map_err(|e| {
            InventoryError::ConfigError(format!("Invalid log directive {:?}: {}", directive, e))
        })?);
    }
    Ok(filter)
}

/// `a=debug, b=trace` into directives; malformed entries are skipped.
fn parse_module_levels(spec: &str) -> Vec<String> {
    spec.split(',')
        .filter_map(|entry| {
            let (module, level) = entry.split_once('=')?;
            let (module, level) = (module.trim(), level.trim());
            (!module.is_empty() && !level.is_empty()).then(|| format!("{}={}", module, level))
        })
        .collect()
}

fn determine_format(config: &LoggingConfig) -> Result<String> {
    if let Ok(format) = std::env::var("STRATA_LOG_FORMAT") {
        if format == "json" || format == "text" {
            return Ok(format);
        }
    }
    match config.format.as_str() {
        "json" | "text" => Ok(config.format.clone()),
        other => Err(InventoryError::ConfigError(format!(
            "Invalid log format: {} (must be 'json' or 'text')",
            other
        ))),
    }
}

fn determine_output(config: &LoggingConfig) -> Result<OutputTarget> {
    match std::env::var("STRATA_LOG_OUTPUT") {
        Ok(output) => parse_output_target(&output),
        Err(_) => parse_output_target(&config.output),
    }
}

fn parse_output_target(output: &str) -> Result<OutputTarget> {
    match output {
        "stdout" => Ok(OutputTarget::Stdout),
        "stderr" => Ok(OutputTarget::Stderr),
        "file" => Ok(OutputTarget::File),
        _ => Err(InventoryError::ConfigError(format!(
            "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
            output
        ))),
    }
}
