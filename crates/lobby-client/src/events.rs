//! Notifications a session hands back to the game.

use std::net::SocketAddr;

use lobby_core::ConnectionId;

/// Something the game may want to react to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A server appeared in the local listing
    ServerAdded { identity: ConnectionId },

    /// A server already in the listing got new rules
    ServerUpdated { identity: ConnectionId },

    /// A listing was applied; `removed` stale servers were dropped
    QueryComplete { servers: usize, removed: usize },

    /// The master connection dropped
    ConnectionLost,

    /// The master could not be reached
    ConnectionFailed,

    /// The master has no free connection slots
    MasterFull,

    /// A player wants to join the local server; a probe to `peer` has
    /// already been sent to open the NAT mapping
    IntroductionRequested { peer: SocketAddr },
}
