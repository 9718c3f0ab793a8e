//! Liveness monitor: probes silent servers and evicts unresponsive ones.

use std::time::Duration;
use tracing::{debug, info};

use lobby_core::{ConnectionId, Registry, Timestamp, Transport};

use crate::config::MasterConfig;

/// When to probe and when to give up on a server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessPolicy {
    /// Time between looks at the same server
    pub keep_alive: Duration,
    /// Unanswered probes after which the server is evicted
    pub missed_ping_limit: u32,
}

impl From<&MasterConfig> for LivenessPolicy {
    fn from(config: &MasterConfig) -> Self {
        Self {
            keep_alive: config.keep_alive_interval(),
            missed_ping_limit: config.missed_ping_limit,
        }
    }
}

/// What one sweep did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Servers sent a liveness probe
    pub probed: Vec<ConnectionId>,
    /// Servers not probed because they are connected
    pub skipped: Vec<ConnectionId>,
    /// Servers removed for missing too many probes
    pub evicted: Vec<ConnectionId>,
}

/// Run one liveness pass over every record whose ping time has come.
pub fn sweep<T: Transport + ?Sized>(
    registry: &mut Registry,
    transport: &mut T,
    policy: &LivenessPolicy,
    now: Timestamp,
) -> SweepReport {
    let mut report = SweepReport::default();

    for identity in registry.identities() {
        let Some(record) = registry.find_mut(identity) else {
            continue;
        };
        if now < record.next_ping {
            continue;
        }

        if record.failed_pings >= policy.missed_ping_limit {
            info!(
                server = %identity,
                addr = %record.address,
                missed = record.failed_pings,
                "dropping server for lack of ping response"
            );
            registry.remove(identity);
            report.evicted.push(identity);
            continue;
        }

        record.next_ping = now.saturating_add(policy.keep_alive);

        if transport.is_connected(identity) {
            debug!(server = %identity, "not probing connected server");
            report.skipped.push(identity);
        } else {
            transport.probe(record.address);
            record.failed_pings += 1;
            debug!(
                server = %identity,
                addr = %record.address,
                waiting = record.failed_pings,
                "probing server"
            );
            report.probed.push(identity);
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_core::{MemoryTransport, ServerRecord};
    use std::net::SocketAddr;

    const POLICY: LivenessPolicy = LivenessPolicy {
        keep_alive: Duration::from_millis(1_000),
        missed_ping_limit: 3,
    };

    fn registry_with(ids: &[u64]) -> Registry {
        let mut registry = Registry::new();
        for id in ids {
            let record = ServerRecord::new(
                ConnectionId::new(*id),
                format!("10.0.0.{id}:7000").parse().unwrap(),
            );
            registry.upsert(&record, true, Timestamp::ZERO);
        }
        registry
    }

    fn at(millis: u64) -> Timestamp {
        Timestamp::from_millis(millis)
    }

    #[test]
    fn test_silent_server_evicted_after_limit() {
        let mut registry = registry_with(&[1]);
        let mut transport = MemoryTransport::new();
        let id = ConnectionId::new(1);

        for round in 0..3 {
            let report = sweep(&mut registry, &mut transport, &POLICY, at(round * 1_000));
            assert_eq!(report.probed, vec![id]);
        }
        assert_eq!(registry.find(id).unwrap().failed_pings, 3);
        assert_eq!(transport.probes.len(), 3);

        // Not due yet: nothing happens.
        let report = sweep(&mut registry, &mut transport, &POLICY, at(2_500));
        assert_eq!(report, SweepReport::default());

        let report = sweep(&mut registry, &mut transport, &POLICY, at(3_000));
        assert_eq!(report.evicted, vec![id]);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_connected_server_is_never_probed() {
        let mut registry = registry_with(&[1, 2]);
        let mut transport = MemoryTransport::new();
        transport.add_connection(ConnectionId::new(1));

        for round in 0..10 {
            sweep(&mut registry, &mut transport, &POLICY, at(round * 1_000));
        }

        let connected = registry.find(ConnectionId::new(1)).unwrap();
        assert_eq!(connected.failed_pings, 0);
        assert!(registry.find(ConnectionId::new(2)).is_none());
        assert!(transport
            .probes
            .iter()
            .all(|addr| *addr == "10.0.0.2:7000".parse::<SocketAddr>().unwrap()));
    }

    #[test]
    fn test_pong_resets_the_count() {
        let mut registry = registry_with(&[1]);
        let mut transport = MemoryTransport::new();

        sweep(&mut registry, &mut transport, &POLICY, at(0));
        sweep(&mut registry, &mut transport, &POLICY, at(1_000));
        registry.record_pong("10.0.0.1:7000".parse().unwrap());
        sweep(&mut registry, &mut transport, &POLICY, at(2_000));

        assert_eq!(registry.find(ConnectionId::new(1)).unwrap().failed_pings, 1);
    }

    #[test]
    fn test_reschedules_after_probe() {
        let mut registry = registry_with(&[1]);
        let mut transport = MemoryTransport::new();

        sweep(&mut registry, &mut transport, &POLICY, at(500));
        assert_eq!(
            registry.find(ConnectionId::new(1)).unwrap().next_ping,
            at(1_500)
        );
    }
}
