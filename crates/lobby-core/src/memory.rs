//! In-memory [`Transport`] that records everything the roles ask of it.
//!
//! Useful for hosts that bridge the roles onto their own networking and
//! for exercising the roles without sockets.

use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::net::{IpAddr, SocketAddr};

use crate::transport::{Reliability, Target, TrafficStats, Transport};
use crate::types::ConnectionId;
use crate::LobbyError;

/// A packet handed to [`Transport::send`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentPacket {
    /// Packet bytes
    pub payload: Bytes,
    /// Destination
    pub target: Target,
    /// Requested delivery guarantee
    pub reliability: Reliability,
}

/// Recording transport with scriptable connection state
#[derive(Debug, Default)]
pub struct MemoryTransport {
    /// Packets sent, in order
    pub sent: Vec<SentPacket>,
    /// Addresses probed, in order
    pub probes: Vec<SocketAddr>,
    /// Addresses connect was called with
    pub connects: Vec<SocketAddr>,
    /// Connections closed
    pub closed: Vec<ConnectionId>,
    /// Banned IPs
    pub banned: HashSet<IpAddr>,
    connected: HashSet<ConnectionId>,
    stats: HashMap<ConnectionId, TrafficStats>,
    refuse_connect: bool,
}

impl MemoryTransport {
    /// Create an empty transport
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a connection as established
    pub fn add_connection(&mut self, id: ConnectionId) {
        self.connected.insert(id);
    }

    /// Mark a connection as gone
    pub fn drop_connection(&mut self, id: ConnectionId) {
        self.connected.remove(&id);
    }

    /// Set the traffic counters reported for `id`
    pub fn set_stats(&mut self, id: ConnectionId, stats: TrafficStats) {
        self.stats.insert(id, stats);
    }

    /// Make subsequent `connect` calls fail
    pub fn refuse_connections(&mut self, refuse: bool) {
        self.refuse_connect = refuse;
    }

    /// Take the packets sent so far
    pub fn take_sent(&mut self) -> Vec<SentPacket> {
        std::mem::take(&mut self.sent)
    }
}

impl Transport for MemoryTransport {
    fn connect(&mut self, address: SocketAddr) -> crate::Result<()> {
        if self.refuse_connect {
            return Err(LobbyError::Transport(format!("connect to {address} refused")));
        }
        self.connects.push(address);
        Ok(())
    }

    fn send(&mut self, payload: Bytes, target: Target, reliability: Reliability) {
        self.sent.push(SentPacket {
            payload,
            target,
            reliability,
        });
    }

    fn probe(&mut self, address: SocketAddr) {
        self.probes.push(address);
    }

    fn is_connected(&self, id: ConnectionId) -> bool {
        self.connected.contains(&id)
    }

    fn traffic_stats(&self, id: ConnectionId) -> Option<TrafficStats> {
        self.stats.get(&id).copied()
    }

    fn close(&mut self, id: ConnectionId) {
        self.connected.remove(&id);
        self.stats.remove(&id);
        self.closed.push(id);
    }

    fn ban(&mut self, ip: IpAddr) {
        self.banned.insert(ip);
    }
}
