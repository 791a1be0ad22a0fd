//! # Dodgeball Authority Server
//!
//! The authoritative side of a small arena game: one ball that homes in on
//! players, a round lifecycle that decides when the ball is live, and a
//! replicated scoreboard and alive-state shared with every connected client.
//!
//! ## Single Authority
//!
//! Exactly one process runs the simulation and issues mutations. Clients
//! report their own position, punches and deaths; they never simulate the
//! ball or decide who won. Everything they display is a read replica of what
//! this process broadcasts.
//!
//! ## Module Organization
//!
//! ### Environment (`environment`)
//! Participant roster in connection order, last known positions, which
//! participants may be targeted, and the spawn points of the arena.
//!
//! ### Hazard (`hazard`)
//! The ball itself: launch, punch, kickoff, stop and the per-tick homing
//! step with bounded turn rate, speed chase and ground clamping.
//!
//! ### Match State (`match_state`)
//! Waiting, Countdown, Playing and Ending as a pure transition function that
//! returns effects instead of performing them.
//!
//! ### Store (`store`)
//! Dead-set and scores. Every mutation re-resolves the authority and pushes a
//! replication event into an outbound channel.
//!
//! ### Game (`game`)
//! Owns all of the above and applies match effects to them once per tick.
//!
//! ### Client Manager and Network (`client_manager`, `network`)
//! UDP socket, address to identity mapping, timeouts, and the tasks that
//! move packets between the socket and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::{ArenaConfig, MatchConfig};
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(
//!         "127.0.0.1:8080",
//!         Duration::from_millis(16),
//!         16,
//!         ArenaConfig::default(),
//!         MatchConfig::default(),
//!     )
//!     .await?;
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! Internally the server runs a receiver task, a sender task and a timeout
//! checker next to the tick loop. Only the tick loop touches game state.

pub mod client_manager;
pub mod config;
pub mod environment;
pub mod game;
pub mod hazard;
pub mod match_state;
pub mod network;
pub mod store;
