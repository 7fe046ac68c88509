//! Call orchestration policy.

use serde::{Deserialize, Serialize};

/// How two peers that dial each other at the same moment settle who answers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[derive(Default)]
pub enum GlarePolicy {
    /// Every peer auto-dials; an incoming call supersedes a pending outgoing one.
    #[default]
    IncomingWins,
    /// Only the peer with the larger id auto-dials; the smaller id answers.
    LowerIdAnswers,
}

/// Auto-dial and reconnect behavior of the call orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CallsConfig {
    pub auto_dial: bool,
    pub auto_dial_min_delay_ms: u64,
    pub auto_dial_max_delay_ms: u64,
    /// Upper bound of the per-peer random delay used by reconnect-all.
    pub reconnect_jitter_ms: u64,
    pub glare_policy: GlarePolicy,
}

impl Default for CallsConfig {
    fn default() -> Self {
        Self {
            auto_dial: true,
            auto_dial_min_delay_ms: 500,
            auto_dial_max_delay_ms: 1500,
            reconnect_jitter_ms: 1000,
            glare_policy: GlarePolicy::IncomingWins,
        }
    }
}
