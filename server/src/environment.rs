//! Registry of everything the core queries from the surrounding world.
//!
//! Participants are kept in connection order. The hazard asks for targetable
//! identities and their positions; the match state machine asks for spawn
//! points and population. Nothing here knows about rounds or scores.

use glam::Vec3;
use log::{debug, info};
use shared::{clamp_display_name, Identity, Pose};

#[derive(Debug, Clone, PartialEq)]
pub struct Participant {
    pub id: Identity,
    pub display_name: String,
    /// Last position reported by the owning client, if any.
    pub position: Option<Vec3>,
    /// Whether the hazard may home in on this participant.
    pub targetable: bool,
}

impl Participant {
    pub fn new(id: Identity, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            position: None,
            targetable: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Environment {
    participants: Vec<Participant>,
    spawn_points: Vec<Pose>,
}

impl Environment {
    pub fn new(spawn_points: Vec<Pose>) -> Self {
        Self {
            participants: Vec::new(),
            spawn_points,
        }
    }

    /// Registers a participant at the end of the connection order.
    ///
    /// Re-joining with a known identity only updates the display name.
    /// Names are clamped to `MAX_NAME_LEN` characters.
    pub fn join(&mut self, id: Identity, display_name: impl AsRef<str>) {
        let display_name = clamp_display_name(display_name.as_ref());
        if let Some(existing) = self.participant_mut(id) {
            existing.display_name = display_name;
            return;
        }

        info!("Participant {} joined as {:?}", id, display_name);
        self.participants.push(Participant::new(id, display_name));
    }

    pub fn leave(&mut self, id: Identity) -> Option<Participant> {
        let index = self.participants.iter().position(|p| p.id == id)?;
        let participant = self.participants.remove(index);
        info!("Participant {} left", id);
        Some(participant)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, id: Identity) -> Option<&Participant> {
        self.participants.iter().find(|p| p.id == id)
    }

    fn participant_mut(&mut self, id: Identity) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.id == id)
    }

    pub fn is_connected(&self, id: Identity) -> bool {
        self.participant(id).is_some()
    }

    pub fn connected_count(&self) -> usize {
        self.participants.len()
    }

    pub fn display_name(&self, id: Identity) -> Option<&str> {
        self.participant(id).map(|p| p.display_name.as_str())
    }

    pub fn set_position(&mut self, id: Identity, position: Vec3) {
        if let Some(participant) = self.participant_mut(id) {
            participant.position = Some(position);
        }
    }

    pub fn set_targetable(&mut self, id: Identity, targetable: bool) {
        if let Some(participant) = self.participant_mut(id) {
            if participant.targetable != targetable {
                debug!("Participant {} targetable: {}", id, targetable);
            }
            participant.targetable = targetable;
        }
    }

    /// Snapshot of identities the hazard may currently home in on.
    pub fn targetables(&self) -> Vec<Identity> {
        self.participants
            .iter()
            .filter(|p| p.targetable && p.position.is_some())
            .map(|p| p.id)
            .collect()
    }

    /// Position of a valid target, `None` once it left, died or never reported.
    pub fn target_position(&self, id: Identity) -> Option<Vec3> {
        self.participant(id)
            .filter(|p| p.targetable)
            .and_then(|p| p.position)
    }

    pub fn spawn_points(&self) -> Vec<Pose> {
        self.spawn_points.clone()
    }

    pub fn set_spawn_points(&mut self, spawn_points: Vec<Pose>) {
        self.spawn_points = spawn_points;
    }
}
