use glam::Vec3;
use log::debug;
use shared::hazard::PROXY_SMOOTHING;
use shared::{smoothing_alpha, HazardState, Pose};

/// Local, read-only copy of the authority's hazard.
///
/// New states only move `synced`; the rendered position eases toward it
/// every frame so packet jitter never shows up as teleporting.
#[derive(Debug, Clone)]
pub struct HazardProxy {
    synced: HazardState,
    render: Vec3,
    last_tick: Option<u32>,
}

impl HazardProxy {
    pub fn new() -> Self {
        Self {
            synced: HazardState::at_rest(Vec3::ZERO),
            render: Vec3::ZERO,
            last_tick: None,
        }
    }

    /// Accepts a replicated state, ignoring anything older than what we have.
    pub fn apply_server_state(&mut self, tick: u32, state: HazardState) {
        match self.last_tick {
            Some(last) if tick <= last => {
                debug!("Dropping stale hazard state {} (have {})", tick, last);
                return;
            }
            // First state snaps, there is nothing to ease from.
            None => self.render = state.position,
            _ => {}
        }

        self.last_tick = Some(tick);
        self.synced = state;
    }

    pub fn update(&mut self, dt: f32) {
        let alpha = smoothing_alpha(PROXY_SMOOTHING, dt);
        self.render = self.render.lerp(self.synced.position, alpha);
    }

    pub fn render_position(&self) -> Vec3 {
        self.render
    }

    pub fn synced(&self) -> &HazardState {
        &self.synced
    }
}

impl Default for HazardProxy {
    fn default() -> Self {
        Self::new()
    }
}

/// What this client knows about itself and the hazard.
#[derive(Debug, Clone, Default)]
pub struct ClientGameState {
    pub hazard: HazardProxy,
    /// Where the authority last respawned us.
    pub spawn: Option<Pose>,
    pub position: Option<Vec3>,
    pub alive: bool,
}

impl ClientGameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_respawn(&mut self, pose: Pose) {
        self.spawn = Some(pose);
        self.position = Some(pose.position);
        self.alive = true;
    }

    pub fn mark_dead(&mut self) {
        self.alive = false;
    }

    pub fn distance_to_hazard(&self) -> Option<f32> {
        self.position
            .map(|position| position.distance(self.hazard.render_position()))
    }

    pub fn update(&mut self, dt: f32) {
        self.hazard.update(dt);
    }
}
