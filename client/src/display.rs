//! Applying replicated events to whatever displays them.
//!
//! The display surface may be created after the first events arrive. Until a
//! surface is registered the [`Observer`] keeps only the most recent status
//! message and lobby list and hands them over on registration. Dead-state
//! updates are not buffered; the next snapshot repairs them.

use log::{debug, info, trace, warn};
use shared::snapshot::{unpack_dead_snapshot, unpack_lobby};
use shared::{Identity, ReplicationEvent};
use std::collections::BTreeMap;

pub trait DisplaySurface {
    fn set_message(&mut self, text: &str);
    fn set_player_names(&mut self, lines: &[String]);
    fn set_player_dead(&mut self, id: Identity, dead: bool);
    fn set_player_dead_by_name(&mut self, name: &str, dead: bool);
}

pub struct Observer<S: DisplaySurface> {
    surface: Option<S>,
    pending_message: Option<String>,
    pending_names: Option<String>,
}

impl<S: DisplaySurface> Observer<S> {
    pub fn new() -> Self {
        Self {
            surface: None,
            pending_message: None,
            pending_names: None,
        }
    }

    /// Attaches a surface and flushes whatever was buffered for it.
    pub fn register(&mut self, mut surface: S) {
        if let Some(text) = self.pending_message.take() {
            surface.set_message(&text);
        }
        if let Some(packed) = self.pending_names.take() {
            surface.set_player_names(&unpack_lobby(&packed));
        }
        self.surface = Some(surface);
    }

    pub fn unregister(&mut self) -> Option<S> {
        self.surface.take()
    }

    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn apply(&mut self, event: &ReplicationEvent) {
        match event {
            ReplicationEvent::Message(text) => match self.surface.as_mut() {
                Some(surface) => surface.set_message(text),
                None => self.pending_message = Some(text.clone()),
            },
            ReplicationEvent::PlayerList(packed) => match self.surface.as_mut() {
                Some(surface) => surface.set_player_names(&unpack_lobby(packed)),
                None => self.pending_names = Some(packed.clone()),
            },
            ReplicationEvent::DeadState { identity, dead } => match self.surface.as_mut() {
                Some(surface) => surface.set_player_dead(*identity, *dead),
                None => debug!("No display surface, dropping dead state for {}", identity),
            },
            ReplicationEvent::DeadStateByName { name, dead } => match self.surface.as_mut() {
                Some(surface) => surface.set_player_dead_by_name(name, *dead),
                None => debug!("No display surface, dropping dead state for {:?}", name),
            },
            ReplicationEvent::DeadSnapshot(packed) => self.apply_dead_snapshot(packed),
            ReplicationEvent::PunchCue { .. } | ReplicationEvent::Respawn { .. } => {
                trace!("Observer ignoring non-display event");
            }
        }
    }

    fn apply_dead_snapshot(&mut self, packed: &str) {
        let Some(surface) = self.surface.as_mut() else {
            debug!("No display surface, dropping dead snapshot");
            return;
        };

        for entry in unpack_dead_snapshot(packed) {
            match entry {
                Ok((id, dead)) => surface.set_player_dead(id, dead),
                Err(e) => warn!("Skipping malformed dead snapshot line: {}", e),
            }
        }
    }
}

impl<S: DisplaySurface> Default for Observer<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Text HUD that logs changes instead of drawing them.
#[derive(Debug, Default)]
pub struct ConsoleHud {
    pub message: String,
    pub lobby: Vec<String>,
    pub dead: BTreeMap<Identity, bool>,
    pub dead_by_name: BTreeMap<String, bool>,
}

impl ConsoleHud {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DisplaySurface for ConsoleHud {
    fn set_message(&mut self, text: &str) {
        if text != self.message && !text.is_empty() {
            info!("[hud] {}", text);
        }
        self.message = text.to_string();
    }

    fn set_player_names(&mut self, lines: &[String]) {
        if lines != self.lobby.as_slice() {
            info!("[hud] lobby: {}", lines.join(", "));
        }
        self.lobby = lines.to_vec();
    }

    fn set_player_dead(&mut self, id: Identity, dead: bool) {
        self.dead.insert(id, dead);
    }

    fn set_player_dead_by_name(&mut self, name: &str, dead: bool) {
        if self.dead_by_name.insert(name.to_string(), dead) != Some(dead) && dead {
            info!("[hud] {} is out", name);
        }
    }
}
