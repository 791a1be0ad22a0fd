//! Server tunables: round timing and the arena layout.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use shared::{HazardConfig, Pose, MIN_PLAYERS_TO_START};
use std::f32::consts::TAU;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub min_players: usize,
    /// Seconds the result stays on screen before the next round.
    pub round_end_delay: f32,
    /// Seconds between countdown texts.
    pub countdown_step: f32,
    pub countdown_start: i32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            min_players: MIN_PLAYERS_TO_START,
            round_end_delay: 3.0,
            countdown_step: 1.0,
            countdown_start: 3,
        }
    }
}

/// Static layout of the arena, optionally loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub hazard_home: Pose,
    pub spawn_points: Vec<Pose>,
    pub hazard: HazardConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            hazard_home: Pose::at(Vec3::new(0.0, 0.0, 64.0)),
            spawn_points: ring_spawns(8, 600.0),
            hazard: HazardConfig::default(),
        }
    }
}

impl ArenaConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Spawn poses evenly spaced on a circle, each facing the center.
pub fn ring_spawns(count: usize, radius: f32) -> Vec<Pose> {
    (0..count)
        .map(|i| {
            let angle = TAU * i as f32 / count as f32;
            let position = Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0);
            let facing = glam::Quat::from_rotation_z(angle + std::f32::consts::PI);
            Pose::new(position, facing)
        })
        .collect()
}
