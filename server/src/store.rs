//! Replicated dead-set and scoreboard, owned by the authority.
//!
//! Every mutation applies locally and then pushes a [`ReplicationEvent`] into
//! the outbound channel; the network sender task fans it out to observers.
//! Nothing is acknowledged or retried, observers that miss an update catch up
//! on the next full snapshot.
//!
//! The authority object itself can go away (for example when the hosting
//! scene is torn down). The maps outlive it, and every entry point resolves
//! the authority again through [`ReplicatedStore::ensure_authority`] instead
//! of holding on to a previous instance.

use crate::environment::Environment;
use log::{debug, info, trace, warn};
use shared::snapshot::{pack_dead_snapshot, pack_lobby};
use shared::{Identity, ReplicationEvent};
use std::collections::{HashMap, HashSet};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// This machine is the single writer.
    Host,
    /// This machine only observes. Used by a store embedded in an observer
    /// process; every mutation becomes a no-op there.
    Proxy,
}

/// Where an event should be delivered.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Broadcast(ReplicationEvent),
    ToOwner {
        identity: Identity,
        event: ReplicationEvent,
    },
}

pub type OutboundSender = mpsc::UnboundedSender<Outbound>;
pub type OutboundReceiver = mpsc::UnboundedReceiver<Outbound>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Authority {
    pub role: Role,
    pub generation: u32,
}

pub struct ReplicatedStore {
    dead: HashSet<Identity>,
    scores: HashMap<Identity, u32>,
    authority: Option<Authority>,
    role: Role,
    generation: u32,
    outbox: OutboundSender,
}

impl ReplicatedStore {
    pub fn new(role: Role, outbox: OutboundSender) -> Self {
        Self {
            dead: HashSet::new(),
            scores: HashMap::new(),
            authority: None,
            role,
            generation: 0,
            outbox,
        }
    }

    /// Resolves the authority, creating it again if it was destroyed.
    pub fn ensure_authority(&mut self) -> Authority {
        if let Some(authority) = self.authority {
            return authority;
        }

        self.generation += 1;
        let authority = Authority {
            role: self.role,
            generation: self.generation,
        };
        if self.generation > 1 {
            info!(
                "Replicated store authority recreated (generation {})",
                self.generation
            );
        }
        self.authority = Some(authority);
        authority
    }

    /// Drops the cached authority, as when the hosting arena is torn down and
    /// reloaded. The next write resolves a fresh one through
    /// [`ensure_authority`](Self::ensure_authority).
    pub fn destroy_authority(&mut self) {
        if self.authority.take().is_some() {
            info!("Replicated store authority destroyed");
        }
    }

    fn authorized(&mut self, operation: &str) -> bool {
        if self.ensure_authority().role == Role::Host {
            return true;
        }
        trace!("Ignoring {} from a non-authority context", operation);
        false
    }

    fn emit(&self, outbound: Outbound) {
        if self.outbox.send(outbound).is_err() {
            debug!("No observer channel, dropping replication event");
        }
    }

    fn broadcast(&self, event: ReplicationEvent) {
        self.emit(Outbound::Broadcast(event));
    }

    /// Unicast-style update keyed by identity, plus by display name for
    /// observers that index their roster by name.
    fn broadcast_dead_state(&self, id: Identity, dead: bool, env: &Environment) {
        self.broadcast(ReplicationEvent::DeadState { identity: id, dead });
        if let Some(name) = env.display_name(id) {
            self.broadcast(ReplicationEvent::DeadStateByName {
                name: name.to_string(),
                dead,
            });
        }
    }

    fn set_dead_state(&mut self, id: Identity, dead: bool, env: &Environment) {
        if !self.authorized("dead state change") {
            return;
        }

        if dead {
            self.dead.insert(id);
        } else {
            self.dead.remove(&id);
        }

        self.broadcast_dead_state(id, dead, env);
    }

    pub fn mark_dead(&mut self, id: Identity, env: &Environment) {
        self.set_dead_state(id, true, env);
    }

    pub fn mark_alive(&mut self, id: Identity, env: &Environment) {
        self.set_dead_state(id, false, env);
    }

    /// Host-directed death signal sent by the player's owning machine.
    pub fn report_death(&mut self, id: Identity, env: &Environment) {
        if !env.is_connected(id) {
            warn!("Death reported for unknown participant {}", id);
            return;
        }

        info!(
            "Marking player dead: {}",
            env.display_name(id).unwrap_or("<unnamed>")
        );
        self.mark_dead(id, env);
    }

    pub fn add_point(&mut self, id: Identity) {
        if !self.authorized("score change") {
            return;
        }

        let score = self.scores.entry(id).or_insert(0);
        *score += 1;
        debug!("Participant {} now has {} points", id, score);
    }

    pub fn remove_participant(&mut self, id: Identity) {
        if !self.authorized("participant removal") {
            return;
        }

        self.dead.remove(&id);
        self.scores.remove(&id);
    }

    /// Broadcasts `"{name}  {score}"` for every participant in roster order.
    pub fn refresh_lobby(&mut self, env: &Environment) {
        if !self.authorized("lobby refresh") {
            return;
        }

        let packed = pack_lobby(
            env.participants()
                .iter()
                .map(|p| (p.display_name.as_str(), self.score(p.id))),
        );
        self.broadcast(ReplicationEvent::PlayerList(packed));
    }

    pub fn broadcast_dead_snapshot(&mut self, env: &Environment) {
        if !self.authorized("dead snapshot") {
            return;
        }

        let packed = pack_dead_snapshot(
            env.participants()
                .iter()
                .map(|p| (p.id, self.dead.contains(&p.id))),
        );
        self.broadcast(ReplicationEvent::DeadSnapshot(packed));
    }

    /// An observer asked for the current state, typically right after its
    /// display surface was built.
    pub fn request_snapshot(&mut self, env: &Environment) {
        self.refresh_lobby(env);
        self.broadcast_dead_snapshot(env);
    }

    pub fn reset_match(&mut self, reset_scores: bool, env: &Environment) {
        if !self.authorized("match reset") {
            return;
        }

        self.dead.clear();
        if reset_scores {
            self.scores.clear();
        }

        for participant in env.participants() {
            self.broadcast_dead_state(participant.id, false, env);
        }

        self.broadcast_message("");
        self.refresh_lobby(env);
    }

    /// Fire-and-forget status text for every observer.
    pub fn broadcast_message(&mut self, text: &str) {
        if !self.authorized("status message") {
            return;
        }

        self.broadcast(ReplicationEvent::Message(text.to_string()));
    }

    pub fn is_dead(&self, id: Identity) -> bool {
        self.dead.contains(&id)
    }

    pub fn score(&self, id: Identity) -> u32 {
        self.scores.get(&id).copied().unwrap_or(0)
    }

    pub fn dead_set(&self) -> &HashSet<Identity> {
        &self.dead
    }

    pub fn scores(&self) -> &HashMap<Identity, u32> {
        &self.scores
    }

    /// Connected participants not in the dead-set, in roster order.
    pub fn alive_participants(&self, env: &Environment) -> Vec<Identity> {
        env.participants()
            .iter()
            .map(|p| p.id)
            .filter(|id| !self.dead.contains(id))
            .collect()
    }
}
