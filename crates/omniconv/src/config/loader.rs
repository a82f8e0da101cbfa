use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&raw)
}

/// Parses and validates a config document. Structural checks come from the
/// embedded JSON Schema; semantic checks a schema cannot express run after
/// deserialization.
pub fn load_config_from_str(raw: &str) -> Result<Config, ConfigError> {
    let document: serde_json::Value = serde_json::from_str(raw)?;
    check_against_schema(&document)?;

    let config: Config = serde_json::from_value(document)?;
    check_semantics(&config)?;
    Ok(config)
}

/// Default config location: `<platform config dir>/omniconv/config.json`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("omniconv").join("config.json"))
}

fn check_against_schema(document: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Embedded schema is not valid JSON: {}", e),
        })?;
    let compiled =
        jsonschema::JSONSchema::compile(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Embedded schema failed to compile: {}", e),
        })?;

    if let Err(violations) = compiled.validate(document) {
        let joined = violations
            .map(|v| format!("{} at {}", v, v.instance_path))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::SchemaValidation { errors: joined });
    }
    Ok(())
}

fn check_semantics(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!(
                "Unsupported config version '{}' (expected 1.0)",
                config.version
            ),
        });
    }

    if config.upload_directory.is_empty() || config.output_directory.is_empty() {
        return Err(ConfigError::Validation {
            message: "Upload and output directories must be set".to_string(),
        });
    }

    // The reaper sweeps both roots and output paths are derived from upload
    // paths; the two trees must not alias each other.
    if Path::new(&config.upload_directory) == Path::new(&config.output_directory) {
        return Err(ConfigError::Validation {
            message: "Upload and output directories must differ".to_string(),
        });
    }

    if let Some(db_path) = &config.database_path {
        if db_path.is_empty() {
            return Err(ConfigError::Validation {
                message: "database_path must not be empty when set".to_string(),
            });
        }
    }

    Ok(())
}
