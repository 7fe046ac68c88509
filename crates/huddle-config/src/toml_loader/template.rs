//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Huddle Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# bind_address = "0.0.0.0"
# ws_port = 3001                 # presence gateway (WebSocket)
# http_port = 3002               # room directory (HTTP)
# heartbeat_interval_secs = 25   # 1-300
# idle_timeout_secs = 60         # must exceed heartbeat_interval_secs
# hello_timeout_secs = 10

[rooms]
# default_capacity = 20          # 1-1000
# default_visibility = "public"  # public, private
# collect_empty_private = false  # drop private rooms when the last member leaves

[[rooms.seed]]
id = "conference-room"
name = "Conference Room"
description = "Default room everyone lands in"

[capture]
# echo_cancellation = true
# noise_suppression = true
# auto_gain_control = true
# channel_count = 1              # 1-2

[calls]
# auto_dial = true
# auto_dial_min_delay_ms = 500
# auto_dial_max_delay_ms = 1500
# reconnect_jitter_ms = 1000
# glare_policy = "incoming-wins" # incoming-wins, lower-id-answers

[presence]
# server_url = "ws://127.0.0.1:3001"
# room_id = "conference-room"
# reconnect_delay_secs = 1
# max_reconnect_delay_secs = 30
# heartbeat_interval_secs = 25

[logging]
# level = "huddle_presence=info"
"##
    .to_string()
}
