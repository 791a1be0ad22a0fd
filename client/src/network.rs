use crate::bot::{Bot, BotAction};
use crate::display::{ConsoleHud, Observer};
use crate::game::ClientGameState;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Identity, Packet, ReplicationEvent, MAX_PACKET_SIZE, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Protocol-facing state of one connected player, without the socket.
pub struct ClientSession {
    pub name: String,
    pub client_id: Option<Identity>,
    pub connected: bool,
    pub game_state: ClientGameState,
    pub observer: Observer<ConsoleHud>,
    bot: Bot,
}

impl ClientSession {
    pub fn new(name: &str, bot: Bot) -> Self {
        Self {
            name: name.to_string(),
            client_id: None,
            connected: false,
            game_state: ClientGameState::new(),
            observer: Observer::new(),
            bot,
        }
    }

    pub fn connect_packet(&self) -> Packet {
        Packet::Connect {
            client_version: PROTOCOL_VERSION,
            name: self.name.clone(),
        }
    }

    /// Applies a packet from the server and returns any replies.
    pub fn handle_packet(&mut self, packet: Packet) -> Vec<Packet> {
        match packet {
            Packet::Connected { client_id } => {
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(Identity(client_id));
                self.connected = true;
                // A restarted server counts ticks from the beginning again.
                self.game_state = ClientGameState::new();

                // The HUD comes up after the handshake; anything that arrived
                // earlier was buffered by the observer.
                if self.observer.surface().is_none() {
                    self.observer.register(ConsoleHud::new());
                }
                vec![Packet::RequestSnapshot]
            }

            Packet::HazardState { tick, state } => {
                self.game_state.hazard.apply_server_state(tick, state);
                Vec::new()
            }

            Packet::Replicate(event) => {
                self.apply_event(&event);
                Vec::new()
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                Vec::new()
            }

            _ => {
                warn!("Unexpected packet type");
                Vec::new()
            }
        }
    }

    fn apply_event(&mut self, event: &ReplicationEvent) {
        match event {
            ReplicationEvent::Respawn { pose } => {
                debug!("Respawned at {:?}", pose.position);
                self.game_state.apply_respawn(*pose);
            }
            ReplicationEvent::PunchCue { sound, position } => {
                debug!("Cue {:?} at {:?}", sound, position);
            }
            ReplicationEvent::DeadState { identity, dead } if Some(*identity) == self.client_id => {
                self.game_state.alive = !dead;
            }
            _ => {}
        }

        self.observer.apply(event);
    }

    /// Advances local state by `dt` and returns what to tell the server.
    pub fn step(&mut self, dt: f32) -> Vec<Packet> {
        self.game_state.update(dt);
        if !self.connected {
            return Vec::new();
        }

        let mut outgoing = Vec::new();
        self.bot.wander(dt, &mut self.game_state);

        if let Some(position) = self.game_state.position {
            outgoing.push(Packet::PlayerPosition { position });
        }

        match self.bot.decide(&self.game_state) {
            Some(BotAction::Punch(direction)) => outgoing.push(Packet::Punch { direction }),
            Some(BotAction::Die) => {
                info!("{} was hit", self.name);
                self.game_state.mark_dead();
                outgoing.push(Packet::PlayerDied);
            }
            None => {}
        }

        outgoing
    }
}

pub struct Client {
    socket: UdpSocket,
    server_addr: SocketAddr,
    session: ClientSession,
    fake_ping_ms: u64,
    tick_duration: Duration,
}

impl Client {
    pub async fn new(
        server_addr: &str,
        name: &str,
        fake_ping_ms: u64,
        punch_probability: f64,
        tick_rate: u32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        let server_addr = server_addr.parse()?;

        Ok(Client {
            socket,
            server_addr,
            session: ClientSession::new(name, Bot::new(punch_probability)),
            fake_ping_ms,
            tick_duration: Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64),
        })
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), Box<dyn std::error::Error>> {
        if self.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
        }

        let data = serialize(packet)?;
        self.socket.send_to(&data, self.server_addr).await?;
        Ok(())
    }

    async fn send_all(&self, packets: Vec<Packet>) {
        for packet in packets {
            if let Err(e) = self.send_packet(&packet).await {
                error!("Error sending packet: {}", e);
            }
        }
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to server...");
        self.send_packet(&self.session.connect_packet()).await?;

        let mut tick_interval = interval(self.tick_duration);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_tick = Instant::now();
        let mut buffer = [0u8; MAX_PACKET_SIZE];

        loop {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    match result {
                        Ok((len, _)) => {
                            if self.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.fake_ping_ms / 2)).await;
                            }

                            match deserialize::<Packet>(&buffer[..len]) {
                                Ok(packet) => {
                                    let replies = self.session.handle_packet(packet);
                                    self.send_all(replies).await;
                                }
                                Err(e) => warn!("Failed to deserialize packet: {}", e),
                            }
                        }
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                }

                _ = tick_interval.tick() => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_tick).as_secs_f32();
                    last_tick = now;

                    let outgoing = self.session.step(dt);
                    self.send_all(outgoing).await;
                }

                _ = tokio::signal::ctrl_c() => {
                    info!("Received Ctrl+C, leaving");
                    break;
                }
            }
        }

        if self.session.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        Ok(())
    }
}
