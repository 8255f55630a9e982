//! Configuration module for engine settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `VenueConfig`)
//! - YAML loading and persistence (`load_config`, `load_or_default`, `save_config`)
//! - Shared state wrapper (`SharedConfig`)
//! - Timing constants with environment variable overrides

pub mod constants;
mod loader;
mod types;

// Re-export types
pub use types::{AppConfig, SharedConfig, VenueConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str, load_or_default, save_config};
