//! `herald-config`: Herald runtime configuration.
//!
//! Provides:
//! - Typed YAML schema (handler, prompt defaults, inhibitors, logging)
//! - YAML read/write with atomic backup rotation
//! - `${ENV_VAR}` substitution
//! - Default value application
//! - Validation with errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{collect_referenced_vars, resolve_env_vars, resolve_env_vars_with, MissingEnvVarError};
pub use io::{backup_path, config_dir, config_file_path, load_config, parse_config, render_config, write_config};
pub use schema::{HandlerConfig, HeraldConfig, InhibitorsConfig, LoggingConfig, PromptConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;

/// Load a config file, substitute env vars, apply defaults and log the
/// validation report.
pub async fn load_and_prepare(path: &Path) -> Result<HeraldConfig> {
    let raw = load_config(path).await?;
    let config = prepare(raw)?;

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok(config)
}

/// Env substitution and defaults for an already parsed config.
pub fn prepare(config: HeraldConfig) -> Result<HeraldConfig> {
    let value: Value =
        serde_json::to_value(&config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars(&value).context("Failed to resolve env vars in config")?;
    let config: HeraldConfig = serde_json::from_value(value)
        .context("Failed to deserialize config after processing")?;
    Ok(apply_all_defaults(config))
}

/// A fully defaulted config, as written by `herald init`.
pub fn default_config() -> HeraldConfig {
    apply_all_defaults(HeraldConfig::default())
}
