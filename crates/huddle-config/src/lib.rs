//! Huddle configuration system.
//!
//! TOML-based configuration shared by the presence server and the call
//! client. Every section uses serde defaults so partial configs work out
//! of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use huddle_config::load_config;
//!
//! let config = load_config().expect("failed to load config");
//! println!("default capacity: {}", config.rooms.default_capacity);
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    CallsConfig, CaptureConfig, GlarePolicy, HuddleConfig, LoggingConfig, PresenceConfig,
    RoomsConfig, SeedRoom, ServerConfig,
};
pub use toml_loader::{load_default, load_from_path};

use std::path::Path;

use huddle_common::ConfigError;

/// Load config from the platform default path and validate it.
pub fn load_config() -> Result<HuddleConfig, ConfigError> {
    let config = toml_loader::load_default()?;
    validation::validate(&config)?;
    Ok(config)
}

/// Load config from an explicit path and validate it.
pub fn load_config_from(path: &Path) -> Result<HuddleConfig, ConfigError> {
    let config = toml_loader::load_from_path(path)?;
    validation::validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(contents: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), contents).unwrap();
        file
    }

    #[test]
    fn explicit_path_loads_valid_config() {
        let file = write("[server]\nws_port = 4001\n");
        let config = load_config_from(file.path()).unwrap();
        assert_eq!(config.server.ws_port, 4001);
        assert_eq!(config.rooms.default_capacity, 20);
    }

    #[test]
    fn explicit_path_rejects_zero_heartbeat() {
        let file = write("[server]\nheartbeat_interval_secs = 0\n");
        let err = load_config_from(file.path()).unwrap_err().to_string();
        assert!(err.contains("server.heartbeat_interval_secs"), "{err}");
    }

    #[test]
    fn explicit_path_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config_from(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }
}
