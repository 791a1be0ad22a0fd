//! Replicated hazard state and the chase math shared by authority and proxies.

use crate::{Identity, FORWARD};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Directions shorter than this are treated as "no direction".
pub const DIRECTION_EPSILON: f32 = 0.001;
/// Speeds at or below this count as stopped.
pub const SPEED_EPSILON: f32 = 0.001;
/// Time constant used by proxies when smoothing toward the replicated position.
pub const PROXY_SMOOTHING: f32 = 12.0;

const CHASE_EPSILON: f32 = 0.00001;

/// State of the ball as published by the authority every tick.
///
/// Only the authority writes this; every other machine treats it as a
/// read-only replica and interpolates its own render copy toward `position`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardState {
    pub direction: Vec3,
    pub speed: f32,
    pub is_launched: bool,
    pub direction_boost_remaining: f32,
    pub target_id: Option<Identity>,
    pub previous_target_id: Option<Identity>,
    pub position: Vec3,
}

impl HazardState {
    pub fn at_rest(position: Vec3) -> Self {
        Self {
            direction: FORWARD,
            speed: 0.0,
            is_launched: false,
            direction_boost_remaining: 0.0,
            target_id: None,
            previous_target_id: None,
            position,
        }
    }

    /// True when a tick would not move the hazard.
    pub fn is_idle(&self) -> bool {
        !self.is_launched || self.speed <= SPEED_EPSILON
    }
}

/// Tuning for the hazard. Defaults match the shipped arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub starting_speed: f32,
    pub max_speed: f32,
    pub hit_multiplier: f32,
    pub boost_turn_rate: f32,
    pub normal_turn_rate: f32,
    pub boost_duration: f32,
    pub speed_chase_rate: f32,
    /// Height above a target's origin that the hazard aims at.
    pub eye_height: f32,
    pub ground_height: f32,
    /// Radius of the collision envelope. `None` disables ground clamping.
    pub collision_radius: Option<f32>,
    pub punch_sound: String,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            starting_speed: 400.0,
            max_speed: 500.0,
            hit_multiplier: 1.05,
            boost_turn_rate: 6.0,
            normal_turn_rate: 1.75,
            boost_duration: 0.05,
            speed_chase_rate: 0.25,
            eye_height: 48.0,
            ground_height: 0.0,
            collision_radius: Some(16.0),
            punch_sound: "bing".to_string(),
        }
    }
}

/// Moves `current` toward `target` by at most `rate_per_second * dt`.
///
/// Snaps exactly onto `target` once it is within one step. Negative rates
/// and negative `dt` are treated as zero.
pub fn chase_vector(current: Vec3, target: Vec3, rate_per_second: f32, dt: f32) -> Vec3 {
    let delta = target - current;
    let max_step = rate_per_second.max(0.0) * dt.max(0.0);
    let len = delta.length();

    if len <= CHASE_EPSILON || len <= max_step {
        return target;
    }

    current + (delta / len) * max_step
}

/// Scalar version of [`chase_vector`].
pub fn chase_float(current: f32, target: f32, rate_per_second: f32, dt: f32) -> f32 {
    let max_step = rate_per_second.max(0.0) * dt.max(0.0);
    let delta = target - current;

    if delta.abs() <= max_step {
        return target;
    }

    current + delta.signum() * max_step
}

/// Frame-rate independent lerp factor for exponential smoothing.
pub fn smoothing_alpha(smoothing: f32, dt: f32) -> f32 {
    1.0 - (-smoothing * dt.max(0.0)).exp()
}
