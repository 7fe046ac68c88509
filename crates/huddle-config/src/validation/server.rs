//! Presence server listener and liveness validation.

use crate::schema::HuddleConfig;

use super::helpers::validate_range_u64;

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &HuddleConfig) {
    let server = &config.server;

    validate_range_u64(
        errors,
        "server.heartbeat_interval_secs",
        server.heartbeat_interval_secs,
        1,
        300,
    );
    validate_range_u64(
        errors,
        "server.hello_timeout_secs",
        server.hello_timeout_secs,
        1,
        300,
    );

    if server.idle_timeout_secs <= server.heartbeat_interval_secs {
        errors.push(format!(
            "server.idle_timeout_secs = {} must exceed server.heartbeat_interval_secs = {}",
            server.idle_timeout_secs, server.heartbeat_interval_secs
        ));
    }

    if server.ws_port != 0 && server.ws_port == server.http_port {
        errors.push(format!(
            "server.ws_port and server.http_port must differ (both {})",
            server.ws_port
        ));
    }
}
