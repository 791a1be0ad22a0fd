//! Round lifecycle as a pure state machine.
//!
//! [`transition`] takes the current [`MatchState`] and what happened this
//! tick and returns the next state plus a list of [`MatchEffect`]s. Applying
//! the effects (moving the hazard, touching the store) is the caller's job,
//! which keeps this module free of I/O and easy to drive from tests.

use crate::config::MatchConfig;
use log::info;
use shared::Identity;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    Countdown,
    Playing,
    Ending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchState {
    pub phase: Phase,
    /// Seconds since the last phase change.
    pub state_elapsed: f32,
    pub countdown_value: i32,
    pub next_tick_deadline: f32,
}

impl Default for MatchState {
    fn default() -> Self {
        Self {
            phase: Phase::Waiting,
            state_elapsed: 0.0,
            countdown_value: 0,
            next_tick_deadline: 0.0,
        }
    }
}

impl MatchState {
    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            info!("Match {:?} -> {:?}", self.phase, phase);
        }
        self.phase = phase;
        self.state_elapsed = 0.0;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Survivor {
    pub id: Identity,
    pub display_name: String,
}

/// What the state machine observes each tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickInput {
    pub dt: f32,
    pub connected: usize,
    /// Participants not in the dead-set, in roster order.
    pub alive: Vec<Survivor>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MatchEffect {
    ResetMatch { reset_scores: bool },
    CacheSpawns,
    RespawnAll,
    StopHazard,
    ReturnHazardHome,
    /// Return home, then kick off toward the first target.
    ActivateHazard,
    Message(String),
    AwardPoint(Identity),
    RefreshLobby,
    SendDeadSnapshot,
    RemoveParticipant(Identity),
}

pub fn waiting_message(connected: usize, min_players: usize) -> String {
    format!("Waiting for players ({}/{})", connected, min_players)
}

fn deactivate_hazard(effects: &mut Vec<MatchEffect>) {
    effects.push(MatchEffect::StopHazard);
    effects.push(MatchEffect::ReturnHazardHome);
}

/// First activation of the authority: full reset and an idle hazard.
pub fn activate(connected: usize, config: &MatchConfig) -> (MatchState, Vec<MatchEffect>) {
    let effects = vec![
        MatchEffect::CacheSpawns,
        MatchEffect::ResetMatch { reset_scores: true },
        MatchEffect::StopHazard,
        MatchEffect::Message(waiting_message(connected, config.min_players)),
    ];
    (MatchState::default(), effects)
}

/// Advances the match by one tick.
pub fn transition(
    state: &MatchState,
    input: &TickInput,
    config: &MatchConfig,
) -> (MatchState, Vec<MatchEffect>) {
    let mut next = state.clone();
    let mut effects = Vec::new();
    next.state_elapsed += input.dt.max(0.0);

    if input.connected < config.min_players {
        enter_waiting(&mut next, &mut effects);
        effects.push(MatchEffect::Message(waiting_message(
            input.connected,
            config.min_players,
        )));
        return (next, effects);
    }

    match next.phase {
        Phase::Waiting => {
            deactivate_hazard(&mut effects);
            effects.push(MatchEffect::CacheSpawns);
            begin_countdown(&mut next, &mut effects, config);
        }
        Phase::Countdown => {
            deactivate_hazard(&mut effects);
            update_countdown(&mut next, &mut effects, config);
        }
        Phase::Playing => check_round_end(&mut next, &mut effects, input),
        Phase::Ending => {
            if next.state_elapsed > config.round_end_delay {
                effects.push(MatchEffect::CacheSpawns);
                begin_countdown(&mut next, &mut effects, config);
            }
        }
    }

    (next, effects)
}

pub fn on_participant_joined(
    state: &MatchState,
    connected: usize,
    config: &MatchConfig,
) -> Vec<MatchEffect> {
    let mut effects = vec![MatchEffect::RefreshLobby, MatchEffect::SendDeadSnapshot];
    if state.phase == Phase::Waiting {
        effects.push(MatchEffect::Message(waiting_message(
            connected,
            config.min_players,
        )));
    }
    effects
}

/// Drops the participant and re-checks population right away.
pub fn on_participant_left(
    state: &MatchState,
    id: Identity,
    connected: usize,
    config: &MatchConfig,
) -> (MatchState, Vec<MatchEffect>) {
    let mut next = state.clone();
    let mut effects = vec![
        MatchEffect::RemoveParticipant(id),
        MatchEffect::RefreshLobby,
    ];

    if connected < config.min_players {
        enter_waiting(&mut next, &mut effects);
        effects.push(MatchEffect::Message(waiting_message(
            connected,
            config.min_players,
        )));
    }

    (next, effects)
}

/// Population loss: idle the hazard and, when leaving a round, reset it.
fn enter_waiting(next: &mut MatchState, effects: &mut Vec<MatchEffect>) {
    deactivate_hazard(effects);
    if next.phase != Phase::Waiting {
        next.enter(Phase::Waiting);
        effects.push(MatchEffect::ResetMatch { reset_scores: true });
    }
}

fn begin_countdown(next: &mut MatchState, effects: &mut Vec<MatchEffect>, config: &MatchConfig) {
    next.enter(Phase::Countdown);

    effects.push(MatchEffect::RespawnAll);
    deactivate_hazard(effects);

    next.countdown_value = config.countdown_start;
    next.next_tick_deadline = config.countdown_step;

    effects.push(MatchEffect::Message(config.countdown_start.to_string()));
    effects.push(MatchEffect::RefreshLobby);
}

fn update_countdown(next: &mut MatchState, effects: &mut Vec<MatchEffect>, config: &MatchConfig) {
    if next.state_elapsed < next.next_tick_deadline {
        return;
    }

    next.countdown_value -= 1;

    if next.countdown_value > 0 {
        effects.push(MatchEffect::Message(next.countdown_value.to_string()));
        next.next_tick_deadline += config.countdown_step;
        return;
    }

    if next.countdown_value == 0 {
        effects.push(MatchEffect::Message("GO".to_string()));
        next.next_tick_deadline += config.countdown_step;
        return;
    }

    // "GO" has been up for one step.
    effects.push(MatchEffect::Message(String::new()));
    next.enter(Phase::Playing);
    effects.push(MatchEffect::ActivateHazard);
}

fn check_round_end(next: &mut MatchState, effects: &mut Vec<MatchEffect>, input: &TickInput) {
    if input.alive.len() > 1 {
        return;
    }

    next.enter(Phase::Ending);
    deactivate_hazard(effects);

    match input.alive.first() {
        Some(winner) => {
            info!("{} wins the round", winner.display_name);
            effects.push(MatchEffect::AwardPoint(winner.id));
            effects.push(MatchEffect::Message(format!(
                "{} wins +1",
                winner.display_name
            )));
        }
        None => {
            info!("Round ended in a draw");
            effects.push(MatchEffect::Message("Draw".to_string()));
        }
    }

    effects.push(MatchEffect::RefreshLobby);
}
