//! # Dodgeball Observer Client
//!
//! A passive observer of the authority server. It never simulates the ball
//! or decides outcomes; it reproduces what the server broadcasts and reports
//! the few things only the owning machine knows: where its player stands,
//! when it punched, and when it was hit.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The hazard proxy, which eases a render position toward the last replicated
//! state with frame-rate independent exponential smoothing, and the local
//! player's spawn, position and alive flag.
//!
//! ### Display Module (`display`)
//! The `DisplaySurface` trait and the `Observer` that applies replication
//! events to it. Status text and the lobby list are buffered until a surface
//! exists; dead-state updates are not.
//!
//! ### Bot Module (`bot`)
//! A headless player that wanders around its spawn point and randomly punches
//! or gets hit when the ball comes close.
//!
//! ### Network Module (`network`)
//! UDP connection handling and the session that turns packets into state
//! changes and state changes into packets.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new("127.0.0.1:8080", "Alice", 0, 0.6, 60).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod display;
pub mod game;
pub mod network;
