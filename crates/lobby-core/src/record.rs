//! One registered game server.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::rules::RuleSet;
use crate::types::{ConnectionId, Timestamp};
use crate::wire::ServerEntry;

/// A game server's identity, advertised rules and liveness bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    /// Connection identifier this record is keyed by
    pub identity: ConnectionId,

    /// Connection through which the server registered (relay routing target)
    pub origination_id: ConnectionId,

    /// Advertised game address
    pub address: SocketAddr,

    /// Advertised rules
    pub rules: RuleSet,

    /// Last time the record was inserted or merged
    pub last_update: Timestamp,

    /// Next time the liveness monitor looks at this record
    pub next_ping: Timestamp,

    /// Consecutive probes sent without a reply
    pub failed_pings: u32,
}

impl ServerRecord {
    /// Create a record with no rules
    #[must_use]
    pub fn new(identity: ConnectionId, address: SocketAddr) -> Self {
        Self {
            identity,
            origination_id: identity,
            address,
            rules: RuleSet::new(),
            last_update: Timestamp::ZERO,
            next_ping: Timestamp::ZERO,
            failed_pings: 0,
        }
    }

    /// An unassigned record advertising `port` on an unspecified address
    ///
    /// This is what a client publishes about itself: the master fills in the
    /// identity and public IP from the connection the record arrives on.
    #[must_use]
    pub fn local(port: u16) -> Self {
        Self::new(
            ConnectionId::UNASSIGNED,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port),
        )
    }

    /// Returns true if the record can be matched by queries
    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        !self.identity.is_unassigned()
    }

    /// Wire form of the full record
    #[must_use]
    pub fn to_entry(&self) -> ServerEntry {
        ServerEntry {
            identity: self.identity,
            address: self.address,
            rules: self.rules.clone(),
        }
    }

    /// Reset to an empty unassigned record, keeping the advertised port
    pub fn clear(&mut self) {
        *self = Self::local(self.address.port());
    }
}

impl From<ServerEntry> for ServerRecord {
    fn from(entry: ServerEntry) -> Self {
        let mut record = Self::new(entry.identity, entry.address);
        record.rules = entry.rules;
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_record_is_unassigned() {
        let record = ServerRecord::local(27015);
        assert!(!record.is_assigned());
        assert_eq!(record.address.port(), 27015);
        assert!(record.address.ip().is_unspecified());
    }

    #[test]
    fn test_entry_conversion_keeps_rules() {
        let mut record = ServerRecord::new(ConnectionId::new(9), "10.1.1.1:7777".parse().unwrap());
        record.rules.set_rule("map", Some("harbor"), None);

        let entry = record.to_entry();
        let back = ServerRecord::from(entry);
        assert_eq!(back.identity, record.identity);
        assert_eq!(back.origination_id, record.identity);
        assert_eq!(back.rules, record.rules);
    }

    #[test]
    fn test_clear_keeps_port() {
        let mut record = ServerRecord::local(4000);
        record.rules.set_rule("mode", Some("ctf"), None);
        record.failed_pings = 2;
        record.clear();
        assert!(record.rules.is_empty());
        assert_eq!(record.failed_pings, 0);
        assert_eq!(record.address.port(), 4000);
    }
}
