//! Contract between the lobby roles and the reliable-messaging transport.
//!
//! The roles never block: sends are fire-and-forget, and inbound traffic is
//! pushed into them by the host as [`InboundMessage`]s and
//! [`TransportEvent`]s.

use bytes::Bytes;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::types::{ConnectionId, Timestamp};

/// Destination of an outbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    /// One connection
    Connection(ConnectionId),
    /// Every connected peer (a client role is connected only to its master)
    Broadcast,
}

/// Delivery guarantee requested for an outbound packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reliability {
    /// Delivered, in any order
    Reliable,
    /// Delivered, in send order
    #[default]
    ReliableOrdered,
}

/// Live traffic counters for one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficStats {
    /// When the connection was established
    pub connection_start: Timestamp,
    /// Total bytes received on the connection so far
    pub bytes_received: u64,
}

/// A packet received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    /// Connection the packet arrived on
    pub sender: ConnectionId,
    /// Public address of the sender
    pub address: SocketAddr,
    /// Raw packet, starting with the message tag
    pub payload: Bytes,
}

impl InboundMessage {
    /// Build an inbound message
    #[must_use]
    pub fn new(sender: ConnectionId, address: SocketAddr, payload: impl Into<Bytes>) -> Self {
        Self {
            sender,
            address,
            payload: payload.into(),
        }
    }
}

/// Connection lifecycle notifications delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An outgoing connection attempt succeeded
    Connected { id: ConnectionId, address: SocketAddr },
    /// An established connection dropped or was closed by the peer
    ConnectionLost { id: ConnectionId },
    /// An outgoing connection attempt failed
    ConnectionFailed { address: SocketAddr },
    /// The remote end has no free connection slots
    NoFreeConnections { address: SocketAddr },
    /// Reply to a liveness probe
    Pong { address: SocketAddr, round_trip: Duration },
}

/// Outcome of handing a packet or event to a role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The role consumed it
    Handled,
    /// Not (only) for the role; the host should pass it on to the game
    Forward,
}

impl Dispatch {
    /// Returns true if the host should pass the packet on
    #[must_use]
    pub const fn should_forward(self) -> bool {
        matches!(self, Self::Forward)
    }
}

/// Primitives the lobby roles need from the transport
pub trait Transport {
    /// Start connecting to `address`; completion arrives as a [`TransportEvent`]
    fn connect(&mut self, address: SocketAddr) -> crate::Result<()>;

    /// Queue a packet for sending
    fn send(&mut self, payload: Bytes, target: Target, reliability: Reliability);

    /// Send an unacknowledged liveness probe; replies arrive as [`TransportEvent::Pong`]
    fn probe(&mut self, address: SocketAddr);

    /// Returns true if `id` currently has an established connection
    fn is_connected(&self, id: ConnectionId) -> bool;

    /// Traffic counters for an established connection
    fn traffic_stats(&self, id: ConnectionId) -> Option<TrafficStats>;

    /// Close a connection
    fn close(&mut self, id: ConnectionId);

    /// Refuse all further traffic from `ip`
    fn ban(&mut self, ip: IpAddr);
}
