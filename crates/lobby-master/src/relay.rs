//! Relay broker: forwards NAT-traversal introductions to listed servers.
//!
//! A client that cannot reach a game server directly asks the master to
//! introduce it. The master looks the server up by its advertised game
//! address and tells it, over the connection it registered through, the
//! client's public address so both sides can punch through their NATs.
//! Introductions to unknown servers are dropped without telling the
//! requester.

use std::net::{IpAddr, SocketAddr};
use tracing::debug;

use lobby_core::{ConnectionId, Registry, Reliability, Target, ToClient, Transport};

/// What happened to a relay request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The introduction was sent to the server's registering connection
    Forwarded { target: ConnectionId },
    /// No listed server has the requested address
    UnknownTarget { address: SocketAddr },
    /// The requested address was empty or unparsable
    InvalidAddress,
}

/// A decoded relay request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRequest<'a> {
    /// Public address the request arrived from
    pub requester: SocketAddr,
    /// Game port the requester will accept the connection on
    pub requester_port: u16,
    /// Game port of the target server
    pub target_port: u16,
    /// Game IP of the target server, as text
    pub target_address: &'a str,
}

/// Forward an introduction, if the target server is known.
pub fn broker<T: Transport + ?Sized>(
    registry: &Registry,
    transport: &mut T,
    request: &RelayRequest<'_>,
) -> RelayOutcome {
    let Ok(ip) = request.target_address.trim().parse::<IpAddr>() else {
        debug!(addr = request.target_address, "relay request with invalid address");
        return RelayOutcome::InvalidAddress;
    };
    let address = SocketAddr::new(ip, request.target_port);

    let Some(record) = registry.find_by_address(address) else {
        debug!(
            to = %address,
            from = %request.requester,
            "relay target unknown, introduction dropped"
        );
        return RelayOutcome::UnknownTarget { address };
    };

    let introduction = ToClient::RelayIntroduction {
        requester_address: request.requester.ip().to_string(),
        requester_port: request.requester_port,
    };
    transport.send(
        introduction.encode(),
        Target::Connection(record.origination_id),
        Reliability::Reliable,
    );
    debug!(
        to = %address,
        from = %request.requester,
        via = %record.origination_id,
        "relay introduction forwarded"
    );

    RelayOutcome::Forwarded {
        target: record.origination_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_core::{MemoryTransport, ServerRecord, Timestamp};

    fn registry() -> Registry {
        let mut registry = Registry::new();
        let mut record = ServerRecord::new(ConnectionId::new(7), "203.0.113.5:27015".parse().unwrap());
        record.origination_id = ConnectionId::new(70);
        registry.upsert(&record, true, Timestamp::ZERO);
        registry
    }

    fn request(target_address: &str, target_port: u16) -> RelayRequest<'_> {
        RelayRequest {
            requester: "198.51.100.9:61000".parse().unwrap(),
            requester_port: 5000,
            target_port,
            target_address,
        }
    }

    #[test]
    fn test_known_target_forwarded_once_to_origination() {
        let registry = registry();
        let mut transport = MemoryTransport::new();

        let outcome = broker(&registry, &mut transport, &request("203.0.113.5", 27015));
        assert_eq!(
            outcome,
            RelayOutcome::Forwarded {
                target: ConnectionId::new(70)
            }
        );

        assert_eq!(transport.sent.len(), 1);
        let packet = &transport.sent[0];
        assert_eq!(packet.target, Target::Connection(ConnectionId::new(70)));
        assert_eq!(
            ToClient::decode(&packet.payload).unwrap(),
            Some(ToClient::RelayIntroduction {
                requester_address: "198.51.100.9".into(),
                requester_port: 5000,
            })
        );
    }

    #[test]
    fn test_unknown_target_sends_nothing() {
        let registry = registry();
        let mut transport = MemoryTransport::new();

        let outcome = broker(&registry, &mut transport, &request("203.0.113.5", 27016));
        assert!(matches!(outcome, RelayOutcome::UnknownTarget { .. }));
        assert!(transport.sent.is_empty());
    }

    #[test]
    fn test_invalid_address_sends_nothing() {
        let registry = registry();
        let mut transport = MemoryTransport::new();

        for bad in ["", "not-an-ip", "203.0.113"] {
            assert_eq!(
                broker(&registry, &mut transport, &request(bad, 27015)),
                RelayOutcome::InvalidAddress
            );
        }
        assert!(transport.sent.is_empty());
    }
}
