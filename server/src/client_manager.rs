//! Connection bookkeeping for the authority.
//!
//! Maps UDP addresses to participant identities, enforces the player cap and
//! evicts clients that went silent. Game-facing state (names, positions,
//! dead-set) lives in the game aggregate; this module only knows who is on
//! the other end of the socket.

use log::info;
use shared::Identity;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default silence after which a client is considered gone.
pub const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A connected client and its connection metadata.
#[derive(Debug)]
pub struct Client {
    pub id: Identity,
    pub addr: SocketAddr,
    pub name: String,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: Identity, addr: SocketAddr, name: String) -> Self {
        Self {
            id,
            addr,
            name,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All connected clients, capped at `max_clients`.
pub struct ClientManager {
    clients: HashMap<Identity, Client>,
    /// Next identity to hand out. Identities are never reused.
    next_client_id: u32,
    max_clients: usize,
    timeout: Duration,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self::with_timeout(max_clients, CLIENT_TIMEOUT)
    }

    pub fn with_timeout(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Returns the new identity, or `None` if the server is full.
    pub fn add_client(&mut self, addr: SocketAddr, name: &str) -> Option<Identity> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let id = Identity(self.next_client_id);
        self.next_client_id += 1;

        info!("Client {} ({:?}) connected from {}", id, name, addr);
        self.clients
            .insert(id, Client::new(id, addr, name.to_string()));

        Some(id)
    }

    pub fn remove_client(&mut self, id: Identity) -> Option<Client> {
        let client = self.clients.remove(&id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<Identity> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    /// Records activity from `addr` and returns who sent it.
    pub fn touch(&mut self, addr: SocketAddr) -> Option<Identity> {
        let client = self.clients.values_mut().find(|client| client.addr == addr)?;
        client.touch();
        Some(client.id)
    }

    pub fn addr_of(&self, id: Identity) -> Option<SocketAddr> {
        self.clients.get(&id).map(|client| client.addr)
    }

    /// Removes clients that have been silent too long and returns them.
    pub fn check_timeouts(&mut self) -> Vec<Identity> {
        let timeout = self.timeout;
        let timed_out: Vec<Identity> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        for id in &timed_out {
            self.remove_client(*id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(Identity, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.id, client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
