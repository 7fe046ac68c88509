//! Room defaults and pre-seeded rooms.

use huddle_common::Visibility;
use serde::{Deserialize, Serialize};

/// A room created at process start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedRoom {
    /// Fixed id; a slug is generated from the name when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub capacity: Option<u32>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
}

/// Room registry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    /// Capacity applied when a room spec does not name one (valid range: 1-1000).
    pub default_capacity: u32,
    pub default_visibility: Visibility,
    /// Remove private rooms once their last member leaves.
    pub collect_empty_private: bool,
    pub seed: Vec<SeedRoom>,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            default_capacity: 20,
            default_visibility: Visibility::Public,
            collect_empty_private: false,
            seed: vec![SeedRoom {
                id: Some("conference-room".into()),
                name: "Conference Room".into(),
                description: Some("Default room everyone lands in".into()),
                capacity: None,
                visibility: None,
            }],
        }
    }
}
