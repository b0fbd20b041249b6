//! Config sources, lowest precedence first: built-in defaults, the global
//! file (~/.config/strata/config.toml or $XDG_CONFIG_HOME/strata/config.toml),
//! the workspace files (config/strata.toml then config/{STRATA_ENV}.toml) and
//! finally `STRATA__`-prefixed environment variables.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Builder with the defaults every layer merges over.
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
        .set_default("logging.level", "warn")?
        .set_default("logging.format", "text")?
        .set_default("logging.output", "stderr")
}

/// Path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        if !xdg.is_empty() {
            return Some(PathBuf::from(xdg).join("strata").join("config.toml"));
        }
    }
    std::env::var("HOME").ok().map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("strata")
            .join("config.toml")
    })
}

/// Add the global config file if it exists.
pub fn add_global_file(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let Some(path) = global_config_path() else {
        return Ok(builder);
    };
    if !path.exists() {
        debug!(config_path = %path.display(), "No global configuration file");
        return Ok(builder);
    }
    let path = dunce::canonicalize(&path).unwrap_or(path);
    Ok(builder.add_source(File::from(path).required(false)))
}

/// Add the workspace config files that exist under `<workspace_root>/config`.
pub fn add_workspace_files(
    mut builder: ConfigBuilder<DefaultState>,
    workspace_root: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let config_dir = workspace_root.join("config");
    let env_name = std::env::var("STRATA_ENV").unwrap_or_else(|_| "development".to_string());

    let base = config_dir.join("strata.toml");
    if base.exists() {
        builder = builder.add_source(File::from(base).required(false));
    } else if workspace_root.exists() {
        warn!(
            workspace = %workspace_root.display(),
            "No config/strata.toml in workspace; only global and environment settings apply"
        );
    }

    let env_specific = config_dir.join(format!("{}.toml", env_name));
    if env_specific.exists() {
        builder = builder.add_source(File::from(env_specific).required(false));
    }
    Ok(builder)
}

/// Add `STRATA__SECTION__KEY=value` overrides.
pub fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("STRATA")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
