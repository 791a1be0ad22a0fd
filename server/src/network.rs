//! Server network layer handling UDP communications and game loop coordination

use crate::client_manager::ClientManager;
use crate::config::{ArenaConfig, MatchConfig};
use crate::game::GameState;
use crate::store::{Outbound, OutboundReceiver};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{clamp_display_name, Identity, Packet, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};

/// Longest step the simulation takes after a stall.
const MAX_TICK_DT: f32 = 0.05;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: Identity },
}

/// Messages sent from game loop to network tasks
#[derive(Debug, Clone, PartialEq)]
pub enum GameMessage {
    SendPacket {
        packet: Packet,
        addr: SocketAddr,
    },
    BroadcastPacket {
        packet: Packet,
        exclude: Option<Identity>,
    },
}

/// Turns a store event into something the sender task can deliver.
///
/// Owner-directed events for clients that already left are dropped.
pub fn route_outbound(outbound: Outbound, clients: &ClientManager) -> Option<GameMessage> {
    match outbound {
        Outbound::Broadcast(event) => Some(GameMessage::BroadcastPacket {
            packet: Packet::Replicate(event),
            exclude: None,
        }),
        Outbound::ToOwner { identity, event } => {
            let addr = clients.addr_of(identity)?;
            Some(GameMessage::SendPacket {
                packet: Packet::Replicate(event),
                addr,
            })
        }
    }
}

/// Main server coordinating networking and game simulation
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    tick_duration: Duration,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: Option<mpsc::UnboundedReceiver<GameMessage>>,
    outbound_rx: OutboundReceiver,
}

impl Server {
    pub async fn new(
        addr: &str,
        tick_duration: Duration,
        max_clients: usize,
        arena: ArenaConfig,
        match_config: MatchConfig,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients))),
            game_state: GameState::new(arena, match_config, outbound_tx),
            tick_duration,
            server_tx,
            server_rx,
            game_tx,
            game_rx: Some(game_rx),
            outbound_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; MAX_PACKET_SIZE];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<Packet>(&buffer[..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Failed to deserialize packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let Some(mut game_rx) = self.game_rx.take() else {
            warn!("Network sender already running");
            return;
        };
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::BroadcastPacket { packet, exclude } => {
                        let client_addrs = {
                            let clients_guard = clients.read().await;
                            clients_guard.get_client_addrs()
                        };

                        for (client_id, addr) in client_addrs {
                            if Some(client_id) == exclude {
                                continue;
                            }

                            if let Err(e) = send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to send to client {}: {}", client_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    info!("Client {} timed out", client_id);
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    fn queue(&self, message: GameMessage) {
        if let Err(e) = self.game_tx.send(message) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        self.queue(GameMessage::SendPacket { packet, addr });
    }

    fn broadcast_packet(&self, packet: Packet) {
        self.queue(GameMessage::BroadcastPacket {
            packet,
            exclude: None,
        });
    }

    /// Forwards everything the game emitted since the last flush.
    async fn flush_outbound(&mut self) {
        let clients = self.clients.read().await;
        while let Ok(outbound) = self.outbound_rx.try_recv() {
            match route_outbound(outbound, &clients) {
                Some(message) => {
                    if let Err(e) = self.game_tx.send(message) {
                        error!("Failed to queue replication packet: {}", e);
                    }
                }
                None => debug!("Dropping owner event for a departed client"),
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, name: String, addr: SocketAddr) {
        let name = clamp_display_name(&name);
        info!(
            "Client {:?} connecting from {} (version: {})",
            name, addr, client_version
        );

        if client_version != PROTOCOL_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing = self.clients.read().await.find_client_by_addr(addr);
        if let Some(existing_id) = existing {
            info!("Removing existing client {} from {}", existing_id, addr);
            self.clients.write().await.remove_client(existing_id);
            self.game_state.remove_participant(existing_id);
        }

        let client_id = self.clients.write().await.add_client(addr, &name);
        match client_id {
            Some(client_id) => {
                self.send_packet(Packet::Connected { client_id: client_id.0 }, addr);
                self.game_state.add_participant(client_id, &name);
            }
            None => self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            ),
        }
    }

    /// Processes incoming packets and updates game state
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        let packet = match packet {
            Packet::Connect {
                client_version,
                name,
            } => {
                self.handle_connect(client_version, name, addr).await;
                return;
            }
            other => other,
        };

        let Some(client_id) = self.clients.write().await.touch(addr) else {
            debug!("Packet from unknown address {}", addr);
            return;
        };

        match packet {
            Packet::PlayerPosition { position } => {
                self.game_state.set_player_position(client_id, position);
            }
            Packet::Punch { direction } => self.game_state.punch(client_id, direction),
            Packet::PlayerDied => self.game_state.report_death(client_id),
            Packet::RequestSnapshot => self.game_state.request_snapshot(),
            Packet::Disconnect => {
                self.clients.write().await.remove_client(client_id);
                self.game_state.remove_participant(client_id);
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    fn broadcast_hazard_state(&self) {
        self.broadcast_packet(Packet::HazardState {
            tick: self.game_state.tick,
            state: self.game_state.hazard_state(),
        });
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();

        info!("Server started successfully");
        self.flush_outbound().await;

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        }
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            self.game_state.remove_participant(client_id);
                        }
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                }

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32().min(MAX_TICK_DT);
                    last_tick = now;

                    self.game_state.update(dt);
                    self.broadcast_hazard_state();

                    if self.game_state.tick % 60 == 0 {
                        debug!(
                            "Tick {}: {} clients, phase {:?}",
                            self.game_state.tick,
                            self.clients.read().await.len(),
                            self.game_state.phase()
                        );
                    }
                }
            }

            self.flush_outbound().await;
        }

        Ok(())
    }
}

async fn send_packet_impl(
    socket: &UdpSocket,
    packet: &Packet,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    socket.send_to(&data, addr).await?;
    Ok(())
}
