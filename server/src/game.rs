use crate::config::{ArenaConfig, MatchConfig};
use crate::environment::Environment;
use crate::hazard::Hazard;
use crate::match_state::{self, MatchEffect, MatchState, Phase, Survivor, TickInput};
use crate::store::{Outbound, OutboundSender, ReplicatedStore, Role};
use glam::Vec3;
use log::{debug, info, warn};
use shared::{HazardState, Identity, Pose, ReplicationEvent};

/// Everything the authority simulates, owned by the tick task.
pub struct GameState {
    pub tick: u32,
    environment: Environment,
    hazard: Hazard,
    store: ReplicatedStore,
    match_state: MatchState,
    match_config: MatchConfig,
    outbox: OutboundSender,
    /// Spawn list captured when a round is about to start.
    spawn_cache: Vec<Pose>,
}

impl GameState {
    pub fn new(arena: ArenaConfig, match_config: MatchConfig, outbox: OutboundSender) -> Self {
        let mut game = Self {
            tick: 0,
            environment: Environment::new(arena.spawn_points),
            hazard: Hazard::new(arena.hazard, arena.hazard_home),
            store: ReplicatedStore::new(Role::Host, outbox.clone()),
            match_state: MatchState::default(),
            match_config,
            outbox,
            spawn_cache: Vec::new(),
        };

        let (state, effects) = match_state::activate(0, &game.match_config);
        game.match_state = state;
        game.apply_effects(effects);
        game
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn hazard(&self) -> &Hazard {
        &self.hazard
    }

    pub fn store(&self) -> &ReplicatedStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ReplicatedStore {
        &mut self.store
    }

    pub fn match_state(&self) -> &MatchState {
        &self.match_state
    }

    pub fn phase(&self) -> Phase {
        self.match_state.phase
    }

    pub fn hazard_state(&self) -> HazardState {
        *self.hazard.state()
    }

    pub fn add_participant(&mut self, id: Identity, display_name: &str) {
        self.environment.join(id, display_name);

        let effects = match_state::on_participant_joined(
            &self.match_state,
            self.environment.connected_count(),
            &self.match_config,
        );
        self.apply_effects(effects);
    }

    pub fn remove_participant(&mut self, id: Identity) {
        if self.environment.leave(id).is_none() {
            return;
        }

        let (state, effects) = match_state::on_participant_left(
            &self.match_state,
            id,
            self.environment.connected_count(),
            &self.match_config,
        );
        self.match_state = state;
        self.apply_effects(effects);
    }

    pub fn set_player_position(&mut self, id: Identity, position: Vec3) {
        self.environment.set_position(id, position);
    }

    pub fn report_death(&mut self, id: Identity) {
        self.store.report_death(id, &self.environment);
        if self.store.is_dead(id) {
            self.environment.set_targetable(id, false);
        }
    }

    /// Redirects the hazard on behalf of a living participant. Only live
    /// rounds accept punches.
    pub fn punch(&mut self, id: Identity, direction: Vec3) {
        if self.match_state.phase != Phase::Playing
            || !self.environment.is_connected(id)
            || self.store.is_dead(id)
        {
            debug!("Ignoring punch from {}", id);
            return;
        }

        let cue = self.hazard.punch(direction, id, &self.environment);
        self.emit(Outbound::Broadcast(ReplicationEvent::PunchCue {
            sound: cue.sound,
            position: cue.position,
        }));
    }

    pub fn request_snapshot(&mut self) {
        self.store.request_snapshot(&self.environment);
    }

    /// One authority tick: advance the match, then the hazard.
    pub fn update(&mut self, dt: f32) {
        self.tick = self.tick.wrapping_add(1);

        let input = TickInput {
            dt,
            connected: self.environment.connected_count(),
            alive: self
                .store
                .alive_participants(&self.environment)
                .into_iter()
                .map(|id| Survivor {
                    id,
                    display_name: self
                        .environment
                        .display_name(id)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect(),
        };

        let (state, effects) = match_state::transition(&self.match_state, &input, &self.match_config);
        self.match_state = state;
        self.apply_effects(effects);

        self.hazard.tick(dt, &self.environment);
    }

    fn emit(&self, outbound: Outbound) {
        if self.outbox.send(outbound).is_err() {
            debug!("Outbound channel closed");
        }
    }

    fn apply_effects(&mut self, effects: Vec<MatchEffect>) {
        for effect in effects {
            self.apply(effect);
        }
    }

    fn apply(&mut self, effect: MatchEffect) {
        match effect {
            MatchEffect::ResetMatch { reset_scores } => {
                self.store.reset_match(reset_scores, &self.environment);
                let ids: Vec<Identity> =
                    self.environment.participants().iter().map(|p| p.id).collect();
                for id in ids {
                    self.environment.set_targetable(id, true);
                }
            }
            MatchEffect::CacheSpawns => self.spawn_cache = self.environment.spawn_points(),
            MatchEffect::RespawnAll => self.respawn_all(),
            MatchEffect::StopHazard => self.hazard.stop(),
            MatchEffect::ReturnHazardHome => self.hazard.return_home(),
            MatchEffect::ActivateHazard => {
                self.hazard.return_home();
                self.hazard.kickoff(&self.environment);
            }
            MatchEffect::Message(text) => self.store.broadcast_message(&text),
            MatchEffect::AwardPoint(id) => self.store.add_point(id),
            MatchEffect::RefreshLobby => self.store.refresh_lobby(&self.environment),
            MatchEffect::SendDeadSnapshot => self.store.broadcast_dead_snapshot(&self.environment),
            MatchEffect::RemoveParticipant(id) => self.store.remove_participant(id),
        }
    }

    /// Puts every participant back on a spawn point, round-robin in
    /// connection order, and marks them alive.
    fn respawn_all(&mut self) {
        if self.spawn_cache.is_empty() {
            warn!("No spawn points configured, skipping respawn");
            return;
        }

        let ids: Vec<Identity> = self.environment.participants().iter().map(|p| p.id).collect();
        for (index, id) in ids.into_iter().enumerate() {
            let pose = self.spawn_cache[index % self.spawn_cache.len()];

            self.emit(Outbound::ToOwner {
                identity: id,
                event: ReplicationEvent::Respawn { pose },
            });
            self.store.mark_alive(id, &self.environment);
            self.environment.set_position(id, pose.position);
            self.environment.set_targetable(id, true);
        }

        info!("Respawned {} participants", self.environment.connected_count());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OutboundReceiver;
    use tokio::sync::mpsc;

    const DT: f32 = 0.1;

    fn game() -> (GameState, OutboundReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            GameState::new(ArenaConfig::default(), MatchConfig::default(), tx),
            rx,
        )
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Ok(outbound) = rx.try_recv() {
            out.push(outbound);
        }
        out
    }

    fn broadcasts(out: &[Outbound]) -> Vec<ReplicationEvent> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::Broadcast(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    fn run_until(game: &mut GameState, phase: Phase) {
        for _ in 0..1000 {
            if game.phase() == phase {
                return;
            }
            game.update(DT);
        }
        panic!("never reached {:?}", phase);
    }

    #[test]
    fn test_new_game_waits_with_idle_hazard() {
        let (game, mut rx) = game();
        let events = broadcasts(&drain(&mut rx));

        assert_eq!(game.phase(), Phase::Waiting);
        assert!(!game.hazard_state().is_launched);
        assert!(events.contains(&ReplicationEvent::Message(
            "Waiting for players (0/2)".to_string()
        )));
    }

    #[test]
    fn test_single_player_keeps_waiting() {
        let (mut game, mut rx) = game();
        game.add_participant(Identity(1), "Alice");
        drain(&mut rx);

        game.update(DT);
        assert_eq!(game.phase(), Phase::Waiting);
        let events = broadcasts(&drain(&mut rx));
        assert!(events.contains(&ReplicationEvent::Message(
            "Waiting for players (1/2)".to_string()
        )));
    }

    #[test]
    fn test_join_broadcasts_lobby_and_dead_snapshot() {
        let (mut game, mut rx) = game();
        drain(&mut rx);

        game.add_participant(Identity(7), "Alice");
        let events = broadcasts(&drain(&mut rx));

        assert!(events.contains(&ReplicationEvent::PlayerList("Alice  0".to_string())));
        assert!(events.contains(&ReplicationEvent::DeadSnapshot("7|0".to_string())));
    }

    #[test]
    fn test_countdown_respawns_every_owner() {
        let (mut game, mut rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        drain(&mut rx);

        game.update(DT);
        assert_eq!(game.phase(), Phase::Countdown);

        let respawned: Vec<Identity> = drain(&mut rx)
            .into_iter()
            .filter_map(|o| match o {
                Outbound::ToOwner {
                    identity,
                    event: ReplicationEvent::Respawn { .. },
                } => Some(identity),
                _ => None,
            })
            .collect();
        assert_eq!(respawned, vec![Identity(1), Identity(2)]);
        assert_eq!(game.environment().targetables().len(), 2);
    }

    #[test]
    fn test_empty_spawn_list_skips_respawn() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let arena = ArenaConfig {
            spawn_points: Vec::new(),
            ..ArenaConfig::default()
        };
        let mut game = GameState::new(arena, MatchConfig::default(), tx);
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        drain(&mut rx);

        game.update(DT);

        assert_eq!(game.phase(), Phase::Countdown);
        assert!(!drain(&mut rx)
            .iter()
            .any(|o| matches!(o, Outbound::ToOwner { .. })));
    }

    #[test]
    fn test_hazard_launches_when_playing() {
        let (mut game, _rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");

        run_until(&mut game, Phase::Playing);

        let state = game.hazard_state();
        assert!(state.is_launched);
        assert!(state.target_id.is_some());
    }

    #[test]
    fn test_death_removes_target_and_ends_round() {
        let (mut game, mut rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        run_until(&mut game, Phase::Playing);
        drain(&mut rx);

        game.report_death(Identity(1));
        assert_eq!(game.environment().targetables(), vec![Identity(2)]);

        game.update(DT);
        assert_eq!(game.phase(), Phase::Ending);
        assert_eq!(game.store().score(Identity(2)), 1);
        assert!(!game.hazard_state().is_launched);

        let events = broadcasts(&drain(&mut rx));
        assert!(events.contains(&ReplicationEvent::Message("Bob wins +1".to_string())));
        assert!(events.contains(&ReplicationEvent::PlayerList("Alice  0\nBob  1".to_string())));
    }

    #[test]
    fn test_dead_player_cannot_punch() {
        let (mut game, mut rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        game.add_participant(Identity(3), "Carol");
        run_until(&mut game, Phase::Playing);
        game.report_death(Identity(1));
        drain(&mut rx);

        game.punch(Identity(1), Vec3::X);
        assert!(!broadcasts(&drain(&mut rx))
            .iter()
            .any(|e| matches!(e, ReplicationEvent::PunchCue { .. })));

        game.punch(Identity(2), Vec3::X);
        assert!(broadcasts(&drain(&mut rx))
            .iter()
            .any(|e| matches!(e, ReplicationEvent::PunchCue { .. })));
        assert_ne!(game.hazard_state().target_id, Some(Identity(2)));
    }

    #[test]
    fn test_punch_outside_round_is_ignored() {
        let (mut game, mut rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        game.update(DT);
        assert_eq!(game.phase(), Phase::Countdown);
        drain(&mut rx);

        game.punch(Identity(1), Vec3::X);

        assert!(!game.hazard_state().is_launched);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_leave_mid_round_resets_to_waiting() {
        let (mut game, _rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        run_until(&mut game, Phase::Playing);
        game.store_mut().add_point(Identity(1));

        game.remove_participant(Identity(2));

        assert_eq!(game.phase(), Phase::Waiting);
        assert_eq!(game.store().score(Identity(1)), 0);
        assert!(!game.hazard_state().is_launched);
    }

    #[test]
    fn test_removing_unknown_participant_is_ignored() {
        let (mut game, _rx) = game();
        game.add_participant(Identity(1), "Alice");
        game.remove_participant(Identity(9));
        assert_eq!(game.environment().connected_count(), 1);
    }
}
