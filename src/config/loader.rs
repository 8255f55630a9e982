//! Configuration loader for YAML files
//!
//! This module handles loading, validating and persisting configuration.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::AppError;

use super::types::AppConfig;

/// Load configuration from a YAML file
///
/// This function:
/// 1. Checks if the file exists
/// 2. Parses the YAML content
/// 3. Validates the configuration rules
///
/// # Returns
/// * `Ok(AppConfig)` - Successfully loaded and validated configuration
/// * `Err(AppError)` - File not found, parse error, or validation failure
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let config: AppConfig = serde_yaml::from_reader(reader).map_err(|e| {
        AppError::Config(format!(
            "YAML parse error in '{}': {}",
            path.display(),
            e
        ))
    })?;

    config.validate()?;

    Ok(config)
}

/// Load configuration from a YAML string (useful for testing)
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    let config: AppConfig = serde_yaml::from_str(yaml_content).map_err(|e| {
        AppError::Config(format!("YAML parse error: {}", e))
    })?;

    config.validate()?;

    Ok(config)
}

/// Load configuration, never failing
///
/// A missing file is created with the defaults. A malformed or invalid file
/// is logged and replaced in memory by the defaults (the file is left alone
/// so it can be fixed by hand).
pub fn load_or_default(path: &Path) -> AppConfig {
    if !path.exists() {
        let config = AppConfig::default();
        match save_config(path, &config) {
            Ok(()) => tracing::info!(path = %path.display(), "[CONFIG] Wrote default configuration"),
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "[CONFIG] Could not write default configuration"),
        }
        return config;
    }

    match load_config(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "[CONFIG] Configuration loaded");
            config
        }
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "[CONFIG] Invalid configuration, using defaults");
            AppConfig::default()
        }
    }
}

/// Write configuration to a YAML file
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), AppError> {
    config.validate()?;

    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("YAML encode error: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, yaml)?;
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
