//! Full configuration validation.
//!
//! Validates numeric ranges and cross-field constraints. Each domain has
//! its own submodule; this orchestrator calls them all and collects
//! errors into a single `ConfigError`.

mod helpers;
mod misc;
mod rooms;
mod server;


use crate::schema::HuddleConfig;
use huddle_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &HuddleConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    server::validate_server(&mut errors, config);
    rooms::validate_rooms(&mut errors, config);
    misc::validate_capture(&mut errors, config);
    misc::validate_calls(&mut errors, config);
    misc::validate_presence(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
