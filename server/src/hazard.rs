//! Authoritative simulation of the ball.
//!
//! Only the authority owns a [`Hazard`]. Each tick it picks a target, turns
//! its travel direction toward that target's aim point with a bounded angular
//! step, chases its speed toward the ceiling, integrates and publishes the
//! resulting [`HazardState`]. Observers never run this code; they smooth a
//! local copy toward the published position instead.

use crate::environment::Environment;
use glam::{Quat, Vec3};
use log::{debug, trace, warn};
use shared::hazard::{DIRECTION_EPSILON, SPEED_EPSILON};
use shared::{chase_float, chase_vector, HazardConfig, HazardState, Identity, Pose, FORWARD, UP};

/// One-shot audio/visual cue emitted at the moment of a punch.
#[derive(Debug, Clone, PartialEq)]
pub struct PunchCue {
    pub sound: String,
    pub position: Vec3,
}

pub struct Hazard {
    config: HazardConfig,
    state: HazardState,
    home: Pose,
    position: Vec3,
    rotation: Quat,
    /// Cached snapshot of the targetable registry.
    targets: Vec<Identity>,
}

impl Hazard {
    pub fn new(config: HazardConfig, home: Pose) -> Self {
        if config.collision_radius.is_none() {
            warn!("Hazard has no collision radius, ground clamping is disabled");
        }

        Self {
            config,
            state: HazardState::at_rest(home.position),
            home,
            position: home.position,
            rotation: home.rotation,
            targets: Vec::new(),
        }
    }

    pub fn state(&self) -> &HazardState {
        &self.state
    }

    pub fn config(&self) -> &HazardConfig {
        &self.config
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn home(&self) -> Pose {
        self.home
    }

    fn publish(&mut self) {
        self.state.position = self.position;
    }

    /// Sends the hazard off in `direction`, or re-accelerates it if already out.
    pub fn launch(&mut self, direction: Vec3, exclude: Option<Identity>, env: &Environment) {
        self.refresh_targets(env);

        self.state.speed = if self.state.is_idle() {
            self.config.starting_speed
        } else {
            (self.state.speed * self.config.hit_multiplier).min(self.config.max_speed)
        };
        self.state.is_launched = true;

        if direction.length() > DIRECTION_EPSILON {
            self.state.direction = direction.normalize();
        }

        self.state.target_id = self.acquire_target(exclude, self.state.direction, env);
        self.state.direction_boost_remaining = self.config.boost_duration;
        self.publish();

        debug!(
            "Hazard launched at {:.1} u/s toward {:?}",
            self.state.speed, self.state.target_id
        );
    }

    /// Redirect by an external actor. The puncher is never the next target.
    pub fn punch(&mut self, direction: Vec3, puncher: Identity, env: &Environment) -> PunchCue {
        self.state.previous_target_id = self.state.target_id;
        self.launch(direction, Some(puncher), env);

        PunchCue {
            sound: self.config.punch_sound.clone(),
            position: self.position,
        }
    }

    /// Puts the hazard back on its spawn pose. Leaves `is_launched` alone.
    pub fn return_home(&mut self) {
        self.position = self.home.position;
        self.rotation = self.home.rotation;
        self.publish();
    }

    /// Starts a round: aim at whoever is ahead of the default forward
    /// direction, or stay inert if nobody can be targeted.
    pub fn kickoff(&mut self, env: &Environment) {
        self.refresh_targets(env);

        self.state.previous_target_id = None;
        self.state.target_id = self.acquire_target(None, FORWARD, env);

        match self.state.target_id.and_then(|id| self.aim_point(id, env)) {
            Some(aim) => {
                self.state.direction = (aim - self.position)
                    .try_normalize()
                    .unwrap_or(FORWARD);
                self.state.speed = self.config.starting_speed;
                self.state.is_launched = true;
            }
            None => {
                warn!("Hazard kickoff found no target, staying inert");
                self.state.target_id = None;
                self.state.is_launched = false;
                self.state.speed = 0.0;
            }
        }

        self.publish();
    }

    pub fn stop(&mut self) {
        self.state.is_launched = false;
        self.state.speed = 0.0;
        self.state.direction_boost_remaining = 0.0;
        self.state.previous_target_id = None;
        self.state.target_id = None;
        self.publish();
    }

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32, env: &Environment) {
        if !self.state.is_launched || self.state.speed <= SPEED_EPSILON {
            self.publish();
            return;
        }

        let target_valid = self
            .state
            .target_id
            .map_or(false, |id| env.target_position(id).is_some());
        if !target_valid {
            if self.state.target_id.is_some() {
                self.refresh_targets(env);
            }
            self.state.target_id =
                self.acquire_target(self.state.previous_target_id, self.state.direction, env);
        }

        if let Some(aim) = self.state.target_id.and_then(|id| self.aim_point(id, env)) {
            if let Some(desired) = (aim - self.position).try_normalize() {
                let rate = self.turn_rate(dt);
                let chased = chase_vector(self.state.direction, desired, rate, dt);
                self.state.direction = chased.try_normalize().unwrap_or(desired);
            }
        }

        self.state.speed = chase_float(
            self.state.speed,
            self.config.max_speed,
            self.config.speed_chase_rate,
            dt,
        );

        let mut next = self.position + self.state.direction * self.state.speed * dt;
        self.apply_ground_constraint(&mut next);

        self.position = next;
        self.publish();

        trace!(
            "Hazard at {:?} speed {:.1} target {:?}",
            self.position,
            self.state.speed,
            self.state.target_id
        );
    }

    /// Returns the boosted rate while the boost window is open, ticking it down.
    fn turn_rate(&mut self, dt: f32) -> f32 {
        if self.state.direction_boost_remaining > 0.0 {
            self.state.direction_boost_remaining =
                (self.state.direction_boost_remaining - dt).max(0.0);
            return self.config.boost_turn_rate;
        }

        self.config.normal_turn_rate
    }

    /// Keeps the bottom of the collision envelope above the floor.
    fn apply_ground_constraint(&mut self, next: &mut Vec3) {
        let Some(radius) = self.config.collision_radius else {
            return;
        };

        if next.z - radius <= self.config.ground_height {
            next.z = self.config.ground_height + radius;
            let d = self.state.direction;
            self.state.direction = Vec3::new(d.x, d.y, d.z.abs())
                .try_normalize()
                .unwrap_or(UP);
        }
    }

    fn refresh_targets(&mut self, env: &Environment) {
        self.targets = env.targetables();
    }

    fn aim_point(&self, id: Identity, env: &Environment) -> Option<Vec3> {
        env.target_position(id)
            .map(|position| position + UP * self.config.eye_height)
    }

    /// Picks the candidate most aligned with `travel_dir`, skipping `exclude`.
    pub fn acquire_target(
        &mut self,
        exclude: Option<Identity>,
        travel_dir: Vec3,
        env: &Environment,
    ) -> Option<Identity> {
        if self.targets.is_empty() {
            self.refresh_targets(env);
        }

        let travel = travel_dir.normalize_or_zero();
        let mut best = None;
        let mut best_dot = -1.0;

        for &candidate in &self.targets {
            if Some(candidate) == exclude {
                continue;
            }

            let Some(aim) = self.aim_point(candidate, env) else {
                continue;
            };

            let to_candidate = aim - self.position;
            if to_candidate.length() < DIRECTION_EPSILON {
                continue;
            }

            let dot = travel.dot(to_candidate.normalize());
            if best.is_none() || dot > best_dot {
                best_dot = dot;
                best = Some(candidate);
            }
        }

        best
    }
}
