//! Headless player used to exercise a server without a human at the keys.
//!
//! The bot circles its spawn point, reports its position and, when the
//! hazard comes close, either punches it away or admits it was hit.

use crate::game::ClientGameState;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Distance at which the bot tries to punch.
pub const PUNCH_REACH: f32 = 160.0;
/// Distance at which a missed punch counts as a hit.
pub const HIT_RADIUS: f32 = 64.0;
const WANDER_RADIUS: f32 = 40.0;
const WANDER_SPEED: f32 = 1.5;
/// Maximum random spread added to punch directions.
const PUNCH_JITTER: f32 = 0.3;
/// Seconds between two punches.
pub const PUNCH_COOLDOWN: f32 = 0.5;

#[derive(Debug, Clone, PartialEq)]
pub enum BotAction {
    Punch(Vec3),
    Die,
}

pub struct Bot {
    rng: StdRng,
    punch_probability: f64,
    phase: f32,
    punch_cooldown: f32,
}

impl Bot {
    pub fn new(punch_probability: f64) -> Self {
        Self::with_rng(punch_probability, StdRng::from_entropy())
    }

    pub fn seeded(punch_probability: f64, seed: u64) -> Self {
        Self::with_rng(punch_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(punch_probability: f64, mut rng: StdRng) -> Self {
        let phase = rng.gen_range(0.0..std::f32::consts::TAU);
        Self {
            rng,
            punch_probability: punch_probability.clamp(0.0, 1.0),
            phase,
            punch_cooldown: 0.0,
        }
    }

    /// Moves the bot along a small circle around its spawn point and lets
    /// the punch cooldown run down.
    pub fn wander(&mut self, dt: f32, state: &mut ClientGameState) {
        self.punch_cooldown = (self.punch_cooldown - dt).max(0.0);

        if !state.alive {
            return;
        }
        let Some(spawn) = state.spawn else {
            return;
        };

        self.phase = (self.phase + WANDER_SPEED * dt) % std::f32::consts::TAU;
        let offset = Vec3::new(self.phase.cos(), self.phase.sin(), 0.0) * WANDER_RADIUS;
        state.position = Some(spawn.position + offset);
    }

    /// Decides what to do about the hazard this frame.
    pub fn decide(&mut self, state: &ClientGameState) -> Option<BotAction> {
        if !state.alive || !state.hazard.synced().is_launched {
            return None;
        }

        let distance = state.distance_to_hazard()?;
        if distance > PUNCH_REACH {
            return None;
        }

        if self.punch_cooldown <= 0.0 && self.rng.gen_bool(self.punch_probability) {
            self.punch_cooldown = PUNCH_COOLDOWN;
            return Some(BotAction::Punch(self.punch_direction(state)));
        }

        if distance <= HIT_RADIUS {
            return Some(BotAction::Die);
        }

        None
    }

    /// Away from the bot, with some spread so rallies do not repeat.
    fn punch_direction(&mut self, state: &ClientGameState) -> Vec3 {
        let away = state
            .position
            .and_then(|position| (state.hazard.render_position() - position).try_normalize())
            .unwrap_or(shared::FORWARD);

        let jitter = Vec3::new(
            self.rng.gen_range(-PUNCH_JITTER..PUNCH_JITTER),
            self.rng.gen_range(-PUNCH_JITTER..PUNCH_JITTER),
            0.0,
        );
        (away + jitter).try_normalize().unwrap_or(away)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{HazardState, Pose};

    fn state_with_hazard_at(hazard: Vec3) -> ClientGameState {
        let mut state = ClientGameState::new();
        state.apply_respawn(Pose::at(Vec3::ZERO));

        let mut hazard_state = HazardState::at_rest(hazard);
        hazard_state.is_launched = true;
        hazard_state.speed = 400.0;
        state.hazard.apply_server_state(1, hazard_state);
        state
    }

    #[test]
    fn test_far_hazard_is_ignored() {
        let mut bot = Bot::seeded(1.0, 7);
        let state = state_with_hazard_at(Vec3::new(1000.0, 0.0, 0.0));
        assert_eq!(bot.decide(&state), None);
    }

    #[test]
    fn test_always_punches_when_certain() {
        let mut bot = Bot::seeded(1.0, 7);
        let state = state_with_hazard_at(Vec3::new(50.0, 0.0, 0.0));

        match bot.decide(&state) {
            Some(BotAction::Punch(direction)) => {
                assert!((direction.length() - 1.0).abs() < 1e-4);
                assert!(direction.x > 0.0);
            }
            other => panic!("expected a punch, got {:?}", other),
        }
    }

    #[test]
    fn test_punches_respect_cooldown() {
        let mut bot = Bot::seeded(0.6, 7);
        let mut state = state_with_hazard_at(Vec3::new(100.0, 0.0, 0.0));
        let dt = 1.0 / 60.0;

        let mut punch_frames = Vec::new();
        for frame in 0..120 {
            bot.wander(dt, &mut state);
            // Keep the hazard in reach while the bot circles.
            state.position = Some(Vec3::ZERO);
            if let Some(BotAction::Punch(_)) = bot.decide(&state) {
                punch_frames.push(frame);
            }
        }

        assert!(!punch_frames.is_empty());
        for pair in punch_frames.windows(2) {
            assert!(pair[1] - pair[0] >= 30, "punched at frames {:?}", punch_frames);
        }
    }

    #[test]
    fn test_cooling_bot_can_still_be_hit() {
        let mut bot = Bot::seeded(1.0, 7);
        let state = state_with_hazard_at(Vec3::new(30.0, 0.0, 0.0));

        assert!(matches!(bot.decide(&state), Some(BotAction::Punch(_))));
        assert_eq!(bot.decide(&state), Some(BotAction::Die));
    }

    #[test]
    fn test_never_punching_bot_dies_when_hit() {
        let mut bot = Bot::seeded(0.0, 7);

        let near = state_with_hazard_at(Vec3::new(100.0, 0.0, 0.0));
        assert_eq!(bot.decide(&near), None);

        let hit = state_with_hazard_at(Vec3::new(30.0, 0.0, 0.0));
        assert_eq!(bot.decide(&hit), Some(BotAction::Die));
    }

    #[test]
    fn test_dead_bot_does_nothing() {
        let mut bot = Bot::seeded(1.0, 7);
        let mut state = state_with_hazard_at(Vec3::new(10.0, 0.0, 0.0));
        state.mark_dead();
        assert_eq!(bot.decide(&state), None);
    }

    #[test]
    fn test_idle_hazard_is_ignored() {
        let mut bot = Bot::seeded(0.0, 7);
        let mut state = ClientGameState::new();
        state.apply_respawn(Pose::at(Vec3::ZERO));
        state
            .hazard
            .apply_server_state(1, HazardState::at_rest(Vec3::new(10.0, 0.0, 0.0)));

        assert_eq!(bot.decide(&state), None);
    }

    #[test]
    fn test_wander_stays_near_spawn() {
        let mut bot = Bot::seeded(0.5, 3);
        let mut state = ClientGameState::new();
        state.apply_respawn(Pose::at(Vec3::new(600.0, 0.0, 0.0)));

        for _ in 0..100 {
            bot.wander(1.0 / 60.0, &mut state);
            let position = state.position.unwrap();
            assert!((position.distance(Vec3::new(600.0, 0.0, 0.0)) - WANDER_RADIUS).abs() < 1e-2);
        }
    }
}
