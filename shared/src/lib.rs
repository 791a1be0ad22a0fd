use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

pub mod hazard;
pub mod snapshot;

pub use hazard::{chase_float, chase_vector, smoothing_alpha, HazardConfig, HazardState};
pub use snapshot::SnapshotError;

pub const PROTOCOL_VERSION: u32 = 1;
pub const MIN_PLAYERS_TO_START: usize = 2;
pub const DEFAULT_TICK_RATE: u32 = 60;
pub const MAX_PACKET_SIZE: usize = 4096;
pub const DEFAULT_MAX_CLIENTS: usize = 16;
/// Longest display name, in characters, that reaches the lobby snapshot.
pub const MAX_NAME_LEN: usize = 32;

/// World up axis. The arena floor is the XY plane.
pub const UP: Vec3 = Vec3::Z;
/// Default travel direction when nothing better is known.
pub const FORWARD: Vec3 = Vec3::X;

/// Stable key the session layer assigns to a connected participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Identity(pub u32);

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Identity {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Identity)
    }
}

/// Position plus orientation, used for spawn points and the hazard home.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    pub fn at(position: Vec3) -> Self {
        Self::new(position, Quat::IDENTITY)
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::at(Vec3::ZERO)
    }
}

/// Trims whitespace and cuts a requested display name to [`MAX_NAME_LEN`]
/// characters, so a full lobby snapshot still fits in one datagram.
pub fn clamp_display_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LEN).collect()
}

/// One-way notification pushed from the authority to observers.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum ReplicationEvent {
    /// Status text for the center of the screen.
    Message(String),
    /// Packed lobby snapshot, see [`snapshot::pack_lobby`].
    PlayerList(String),
    DeadState {
        identity: Identity,
        dead: bool,
    },
    DeadStateByName {
        name: String,
        dead: bool,
    },
    /// Packed dead snapshot, see [`snapshot::pack_dead_snapshot`].
    DeadSnapshot(String),
    PunchCue {
        sound: String,
        position: Vec3,
    },
    /// Owner-directed: move the local player to this pose and revive it.
    Respawn {
        pose: Pose,
    },
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    Connect {
        client_version: u32,
        name: String,
    },
    PlayerPosition {
        position: Vec3,
    },
    Punch {
        direction: Vec3,
    },
    PlayerDied,
    RequestSnapshot,
    Disconnect,

    Connected {
        client_id: u32,
    },
    HazardState {
        tick: u32,
        state: HazardState,
    },
    Replicate(ReplicationEvent),
    Disconnected {
        reason: String,
    },
}
