//! Validation for the client-side sections: capture, calls, presence.

use crate::schema::HuddleConfig;

use super::helpers::{validate_range, validate_range_u64};

/// Validate capture constraints.
pub(crate) fn validate_capture(errors: &mut Vec<String>, config: &HuddleConfig) {
    validate_range(
        errors,
        "capture.channel_count",
        config.capture.channel_count,
        1,
        2,
    );
}

/// Validate auto-dial windows.
pub(crate) fn validate_calls(errors: &mut Vec<String>, config: &HuddleConfig) {
    let calls = &config.calls;
    if calls.auto_dial_min_delay_ms > calls.auto_dial_max_delay_ms {
        errors.push(format!(
            "calls.auto_dial_min_delay_ms = {} exceeds calls.auto_dial_max_delay_ms = {}",
            calls.auto_dial_min_delay_ms, calls.auto_dial_max_delay_ms
        ));
    }
    validate_range_u64(
        errors,
        "calls.reconnect_jitter_ms",
        calls.reconnect_jitter_ms,
        0,
        60_000,
    );
}

/// Validate presence client reconnect settings.
pub(crate) fn validate_presence(errors: &mut Vec<String>, config: &HuddleConfig) {
    let presence = &config.presence;
    if !presence.server_url.starts_with("ws://") && !presence.server_url.starts_with("wss://") {
        errors.push(format!(
            "presence.server_url = {} must be a ws:// or wss:// URL",
            presence.server_url
        ));
    }
    validate_range_u64(
        errors,
        "presence.reconnect_delay_secs",
        presence.reconnect_delay_secs,
        1,
        presence.max_reconnect_delay_secs.max(1),
    );
    validate_range_u64(
        errors,
        "presence.heartbeat_interval_secs",
        presence.heartbeat_interval_secs,
        1,
        300,
    );
}
