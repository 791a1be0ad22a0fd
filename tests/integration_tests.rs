//! Integration tests for the authority, its replication stream and observers
//!
//! These tests drive the server's game aggregate the way the tick loop does
//! and feed what it emits into client-side sessions.

use bincode::{deserialize, serialize};
use client::bot::Bot;
use client::network::ClientSession;
use glam::Vec3;
use server::config::{ArenaConfig, MatchConfig};
use server::environment::Environment;
use server::game::GameState;
use server::match_state::Phase;
use server::store::{Outbound, OutboundReceiver, ReplicatedStore, Role};
use shared::{Identity, Packet, ReplicationEvent};
use std::time::Duration;
use tokio::sync::mpsc;

const DT: f32 = 1.0 / 60.0;

fn new_game(config: MatchConfig) -> (GameState, OutboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (GameState::new(ArenaConfig::default(), config, tx), rx)
}

fn drain(rx: &mut OutboundReceiver) -> Vec<Outbound> {
    let mut out = Vec::new();
    while let Ok(outbound) = rx.try_recv() {
        out.push(outbound);
    }
    out
}

/// Delivers outbound events to the sessions they are addressed to.
fn deliver(out: Vec<Outbound>, sessions: &mut [(Identity, &mut ClientSession)]) {
    for outbound in out {
        match outbound {
            Outbound::Broadcast(event) => {
                for (_, session) in sessions.iter_mut() {
                    session.handle_packet(Packet::Replicate(event.clone()));
                }
            }
            Outbound::ToOwner { identity, event } => {
                for (id, session) in sessions.iter_mut() {
                    if *id == identity {
                        session.handle_packet(Packet::Replicate(event.clone()));
                    }
                }
            }
        }
    }
}

fn messages(out: &[Outbound]) -> Vec<String> {
    out.iter()
        .filter_map(|o| match o {
            Outbound::Broadcast(ReplicationEvent::Message(text)) => Some(text.clone()),
            _ => None,
        })
        .collect()
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests that replicated payloads survive the wire byte-for-byte
    #[test]
    fn replicated_payloads_survive_bincode() {
        let packet = Packet::Replicate(ReplicationEvent::PlayerList("Alice  3\nBob  0".to_string()));
        let decoded: Packet = deserialize(&serialize(&packet).unwrap()).unwrap();
        assert_eq!(decoded, packet);
    }

    /// Tests that garbage datagrams are rejected instead of misparsed
    #[test]
    fn malformed_packet_handling() {
        let malformed: Vec<Vec<u8>> = vec![vec![], vec![0xFF; 3], vec![200, 0, 0, 0, 1]];

        for data in malformed {
            assert!(deserialize::<Packet>(&data).is_err());
        }
    }

    /// Tests that a full lobby of overlong names still fits one datagram
    #[test]
    fn full_lobby_fits_in_one_datagram() {
        let (mut game, mut rx) = new_game(MatchConfig::default());
        for id in 1..=shared::DEFAULT_MAX_CLIENTS as u32 {
            game.add_participant(Identity(id), &"N".repeat(2100));
        }

        let largest = drain(&mut rx)
            .into_iter()
            .filter_map(|o| match o {
                Outbound::Broadcast(event @ ReplicationEvent::PlayerList(_)) => {
                    Some(serialize(&Packet::Replicate(event)).unwrap().len())
                }
                _ => None,
            })
            .max()
            .unwrap();
        assert!(largest <= shared::MAX_PACKET_SIZE, "lobby packet is {} bytes", largest);

        // Widest names the clamp allows, with the largest possible scores.
        let name: String = "\u{1F3D0}".repeat(shared::MAX_NAME_LEN);
        let payload = shared::snapshot::pack_lobby(
            (0..shared::DEFAULT_MAX_CLIENTS).map(|_| (name.as_str(), u32::MAX)),
        );
        let packet = Packet::Replicate(ReplicationEvent::PlayerList(payload));
        assert!(serialize(&packet).unwrap().len() <= shared::MAX_PACKET_SIZE);
    }

    /// Tests the connect handshake and the first countdown over real UDP
    #[tokio::test]
    async fn two_clients_start_a_countdown_over_udp() {
        let mut server = server::network::Server::new(
            "127.0.0.1:0",
            Duration::from_millis(16),
            8,
            ArenaConfig::default(),
            MatchConfig::default(),
        )
        .await
        .unwrap();
        let server_addr = server.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let alice = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let bob = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();

        for (socket, name) in [(&alice, "Alice"), (&bob, "Bob")] {
            let connect = ClientSession::new(name, Bot::seeded(0.0, 1)).connect_packet();
            socket
                .send_to(&serialize(&connect).unwrap(), server_addr)
                .await
                .unwrap();
        }

        let mut buffer = [0u8; shared::MAX_PACKET_SIZE];
        let mut saw_countdown = false;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);

        while tokio::time::Instant::now() < deadline {
            let received =
                tokio::time::timeout(Duration::from_millis(500), alice.recv_from(&mut buffer))
                    .await;
            let Ok(Ok((len, _))) = received else {
                continue;
            };
            if let Ok(Packet::Replicate(ReplicationEvent::Message(text))) =
                deserialize::<Packet>(&buffer[..len])
            {
                if text == "3" {
                    saw_countdown = true;
                    break;
                }
            }
        }

        assert!(saw_countdown, "Alice never saw the countdown start");
    }
}

/// ROUND LIFECYCLE TESTS
mod round_tests {
    use super::*;

    /// Two players connect, play a round, one is hit, the other scores,
    /// and after the delay a fresh countdown respawns both.
    #[test]
    fn two_player_round_scenario() {
        let (mut game, mut rx) = new_game(MatchConfig::default());
        let mut alice = ClientSession::new("Alice", Bot::seeded(0.0, 1));
        let mut bob = ClientSession::new("Bob", Bot::seeded(0.0, 2));
        alice.handle_packet(Packet::Connected { client_id: 1 });
        bob.handle_packet(Packet::Connected { client_id: 2 });

        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        drain(&mut rx);

        // Countdown starts on the very next tick.
        game.update(DT);
        assert_eq!(game.phase(), Phase::Countdown);
        let out = drain(&mut rx);
        assert_eq!(messages(&out), vec!["3"]);
        deliver(
            out,
            &mut [(Identity(1), &mut alice), (Identity(2), &mut bob)],
        );
        assert!(alice.game_state.alive && bob.game_state.alive);
        assert!(alice.game_state.position.is_some());

        // Four countdown steps precede Playing.
        let mut countdown = Vec::new();
        while game.phase() == Phase::Countdown {
            game.update(DT);
            countdown.extend(messages(&drain(&mut rx)));
        }
        assert_eq!(countdown, vec!["2", "1", "GO", ""]);
        assert_eq!(game.phase(), Phase::Playing);
        assert!(game.hazard_state().is_launched);

        // Alice is hit.
        game.report_death(Identity(1));
        game.update(DT);
        assert_eq!(game.phase(), Phase::Ending);
        assert_eq!(game.store().score(Identity(2)), 1);
        assert!(!game.hazard_state().is_launched);

        let out = drain(&mut rx);
        deliver(
            out,
            &mut [(Identity(1), &mut alice), (Identity(2), &mut bob)],
        );
        let hud = bob.observer.surface().unwrap();
        assert_eq!(hud.message, "Bob wins +1");
        assert_eq!(hud.lobby, vec!["Alice  0", "Bob  1"]);
        assert_eq!(hud.dead.get(&Identity(1)), Some(&true));
        assert_eq!(hud.dead_by_name.get("Alice"), Some(&true));

        // After the delay, both are alive again in a new countdown.
        let mut ticks = 0;
        while game.phase() == Phase::Ending {
            game.update(DT);
            ticks += 1;
        }
        assert!(ticks as f32 * DT >= 3.0);
        assert_eq!(game.phase(), Phase::Countdown);
        assert!(game.store().dead_set().is_empty());
        assert_eq!(game.store().score(Identity(2)), 1);

        deliver(
            drain(&mut rx),
            &mut [(Identity(1), &mut alice), (Identity(2), &mut bob)],
        );
        assert!(alice.game_state.alive);
    }

    /// Both players hit in the same tick is a draw
    #[test]
    fn simultaneous_elimination_is_a_draw() {
        let (mut game, mut rx) = new_game(MatchConfig {
            countdown_step: DT,
            ..MatchConfig::default()
        });
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        while game.phase() != Phase::Playing {
            game.update(DT);
        }
        drain(&mut rx);

        game.report_death(Identity(1));
        game.report_death(Identity(2));
        game.update(DT);

        assert_eq!(game.phase(), Phase::Ending);
        assert!(messages(&drain(&mut rx)).contains(&"Draw".to_string()));
        assert!(game.store().scores().values().all(|score| *score == 0));
    }

    /// A disconnect mid-round drops back to Waiting with a full reset
    #[test]
    fn disconnect_mid_round_resets_scores() {
        let (mut game, mut rx) = new_game(MatchConfig::default());
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        while game.phase() != Phase::Playing {
            game.update(DT);
        }
        game.store_mut().add_point(Identity(1));
        drain(&mut rx);

        game.remove_participant(Identity(2));

        assert_eq!(game.phase(), Phase::Waiting);
        assert_eq!(game.store().score(Identity(1)), 0);
        let out = drain(&mut rx);
        assert!(messages(&out).contains(&"Waiting for players (1/2)".to_string()));

        // Staying below the minimum never restarts the countdown.
        for _ in 0..120 {
            game.update(DT);
        }
        assert_eq!(game.phase(), Phase::Waiting);
    }

    /// Hazard speed never exceeds the configured ceiling, however often it is punched
    #[test]
    fn punched_hazard_respects_max_speed() {
        let (mut game, _rx) = new_game(MatchConfig {
            countdown_step: DT,
            ..MatchConfig::default()
        });
        game.add_participant(Identity(1), "Alice");
        game.add_participant(Identity(2), "Bob");
        game.add_participant(Identity(3), "Carol");
        while game.phase() != Phase::Playing {
            game.update(DT);
        }

        let max_speed = game.hazard().config().max_speed;
        for i in 0..200 {
            let puncher = Identity(1 + i % 3);
            game.punch(puncher, Vec3::new(1.0, 0.5, 0.0));
            assert_ne!(game.hazard_state().target_id, Some(puncher));
            game.update(DT);
            assert!(game.hazard_state().speed <= max_speed + 1e-3);
        }
    }
}

/// REPLICATED STORE TESTS
mod store_tests {
    use super::*;

    fn roster() -> Environment {
        let mut env = Environment::default();
        env.join(Identity(1), "Alice");
        env.join(Identity(2), "Bob");
        env
    }

    fn lobby(out: &[Outbound]) -> Option<String> {
        out.iter().rev().find_map(|o| match o {
            Outbound::Broadcast(ReplicationEvent::PlayerList(list)) => Some(list.clone()),
            _ => None,
        })
    }

    #[test]
    fn lobby_payload_format() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = ReplicatedStore::new(Role::Host, tx);
        let env = roster();

        for _ in 0..3 {
            store.add_point(Identity(1));
        }
        store.refresh_lobby(&env);

        assert_eq!(lobby(&drain(&mut rx)).as_deref(), Some("Alice  3\nBob  0"));
    }

    #[test]
    fn reset_without_scores_is_idempotent() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = ReplicatedStore::new(Role::Host, tx);
        let env = roster();
        store.add_point(Identity(2));
        store.mark_dead(Identity(1), &env);

        store.reset_match(false, &env);
        let first = drain(&mut rx);
        let dead_after_first = store.dead_set().clone();
        let scores_after_first = store.scores().clone();

        store.reset_match(false, &env);
        let second = drain(&mut rx);

        assert_eq!(first, second);
        assert_eq!(store.dead_set(), &dead_after_first);
        assert_eq!(store.scores(), &scores_after_first);
        assert_eq!(store.score(Identity(2)), 1);
    }

    #[test]
    fn store_survives_authority_teardown() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = ReplicatedStore::new(Role::Host, tx);
        let env = roster();
        store.add_point(Identity(1));
        let first = store.ensure_authority();

        store.destroy_authority();
        store.add_point(Identity(1));
        store.refresh_lobby(&env);

        assert!(store.ensure_authority().generation > first.generation);
        assert_eq!(lobby(&drain(&mut rx)).as_deref(), Some("Alice  2\nBob  0"));
    }

    #[test]
    fn proxy_store_never_emits() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut store = ReplicatedStore::new(Role::Proxy, tx);
        let env = roster();

        store.mark_dead(Identity(1), &env);
        store.add_point(Identity(1));
        store.refresh_lobby(&env);
        store.reset_match(true, &env);
        store.broadcast_message("hello");

        assert!(drain(&mut rx).is_empty());
        assert!(!store.is_dead(Identity(1)));
        assert_eq!(store.score(Identity(1)), 0);
    }
}
