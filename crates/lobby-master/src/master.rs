//! The master role: owns the registry and answers client traffic.

use std::net::SocketAddr;
use tracing::{debug, info, warn};

use lobby_core::{
    Clock, ConnectionId, Dispatch, InboundMessage, Registry, Reliability, ServerEntry,
    ServerRecord, SystemClock, Target, ToMaster, Transport, TransportEvent,
};

use crate::config::MasterConfig;
use crate::flood::{FloodGuard, FloodVerdict};
use crate::liveness::{self, LivenessPolicy, SweepReport};
use crate::query::{self, Listing};
use crate::quota::QueryQuota;
use crate::relay::{self, RelayOutcome, RelayRequest};

/// Central server directory.
///
/// Drive it by calling [`Master::update`] once per tick and handing every
/// inbound packet and transport event to [`Master::handle_message`] and
/// [`Master::handle_event`] from the same thread.
#[derive(Debug)]
pub struct Master<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    registry: Registry,
    liveness: LivenessPolicy,
    flood: FloodGuard,
    quota: Option<QueryQuota>,
}

impl<T: Transport> Master<T> {
    /// Create a master on the wall clock
    pub fn new(transport: T, config: &MasterConfig) -> Self {
        Self::with_clock(transport, SystemClock, config)
    }
}

impl<T: Transport, C: Clock> Master<T, C> {
    /// Create a master with an explicit clock
    pub fn with_clock(transport: T, clock: C, config: &MasterConfig) -> Self {
        Self {
            transport,
            clock,
            registry: Registry::new(),
            liveness: LivenessPolicy::from(config),
            flood: FloodGuard::from(config),
            quota: config.query_quota_per_second.map(QueryQuota::per_second),
        }
    }

    /// Registered servers
    pub const fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Per-tick work: probe silent servers and evict dead ones
    pub fn update(&mut self) -> SweepReport {
        let now = self.clock.now();
        if let Some(quota) = &self.quota {
            quota.prune();
        }
        let report = liveness::sweep(&mut self.registry, &mut self.transport, &self.liveness, now);
        if !report.evicted.is_empty() {
            info!(
                evicted = report.evicted.len(),
                servers = self.registry.len(),
                "liveness sweep evicted servers"
            );
        }
        report
    }

    /// Handle one inbound packet.
    ///
    /// The flood check runs first; a banned peer's packet is consumed
    /// without further processing. Malformed lobby packets are dropped.
    /// Packets that are not lobby messages are returned as [`Dispatch::Forward`].
    pub fn handle_message(&mut self, message: &InboundMessage) -> Dispatch {
        let now = self.clock.now();

        let stats = self.transport.traffic_stats(message.sender);
        if let FloodVerdict::Ban { bytes_per_ms } = self.flood.inspect(stats, now) {
            self.ban(message.sender, message.address, bytes_per_ms);
            return Dispatch::Handled;
        }

        let decoded = match ToMaster::decode(&message.payload) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Dispatch::Forward,
            Err(e) => {
                debug!(from = %message.address, error = %e, "dropping malformed message");
                return Dispatch::Handled;
            }
        };

        match decoded {
            ToMaster::Query { keys } => self.handle_query(message, &keys),
            ToMaster::SetServer(entry) => self.handle_set_server(message, entry),
            ToMaster::DelistServer { .. } => self.handle_delist(message.sender),
            ToMaster::RelayRequest {
                requester_port,
                target_port,
                target_address,
            } => {
                let request = RelayRequest {
                    requester: message.address,
                    requester_port,
                    target_port,
                    target_address: &target_address,
                };
                self.handle_relay(&request);
            }
        }

        Dispatch::Handled
    }

    /// Handle a transport lifecycle event.
    ///
    /// Pongs reset the missed-probe count of the replying server. Events are
    /// always forwarded so the game sees them too.
    pub fn handle_event(&mut self, event: &TransportEvent) -> Dispatch {
        match event {
            TransportEvent::Pong { address, round_trip } => {
                if let Some(record) = self.registry.record_pong(*address) {
                    debug!(
                        server = %record.identity,
                        rtt_ms = round_trip.as_millis(),
                        "server answered probe"
                    );
                }
            }
            TransportEvent::ConnectionLost { id } => {
                debug!(peer = %id, "connection lost");
            }
            TransportEvent::Connected { .. }
            | TransportEvent::ConnectionFailed { .. }
            | TransportEvent::NoFreeConnections { .. } => {}
        }
        Dispatch::Forward
    }

    fn handle_query(&mut self, message: &InboundMessage, keys: &[String]) {
        if let Some(quota) = &self.quota {
            if !quota.allow(message.address.ip()) {
                debug!(from = %message.address, "query quota exceeded, dropping query");
                return;
            }
        }

        let listing = query::run_query(&self.registry, keys);
        let full = matches!(listing, Listing::Full(_));
        debug!(
            from = %message.address,
            keys = keys.len(),
            servers = listing.len(),
            full,
            "answering query"
        );

        self.transport.send(
            listing.into_message().encode(),
            Target::Connection(message.sender),
            Reliability::Reliable,
        );
    }

    fn handle_set_server(&mut self, message: &InboundMessage, entry: ServerEntry) {
        let now = self.clock.now();
        let advertised_port = match entry.address.port() {
            0 => message.address.port(),
            port => port,
        };

        let mut candidate = ServerRecord::from(entry);
        candidate.identity = message.sender;
        candidate.origination_id = message.sender;
        candidate.address = SocketAddr::new(message.address.ip(), advertised_port);
        self.supersede(message.sender, candidate.address);

        let (record, added) = self.registry.upsert(&candidate, true, now);
        if added {
            record.next_ping = now.saturating_add(self.liveness.keep_alive);
            let address = record.address;
            info!(
                server = %message.sender,
                addr = %address,
                servers = self.registry.len(),
                "server added"
            );
        } else {
            debug!(
                server = %message.sender,
                servers = self.registry.len(),
                "server updated"
            );
        }
    }

    /// Drop records left at `address` by earlier connections of the same server
    fn supersede(&mut self, sender: ConnectionId, address: SocketAddr) {
        let stale: Vec<ConnectionId> = self
            .registry
            .iter()
            .filter(|record| record.address == address && record.identity != sender)
            .map(|record| record.identity)
            .collect();
        for identity in stale {
            self.registry.remove(identity);
            info!(server = %identity, by = %sender, addr = %address, "server record superseded");
        }
    }

    fn handle_delist(&mut self, sender: ConnectionId) {
        if self.registry.remove(sender).is_some() {
            info!(server = %sender, servers = self.registry.len(), "server delisted");
        }
    }

    fn handle_relay(&mut self, request: &RelayRequest<'_>) {
        if let RelayOutcome::UnknownTarget { address } =
            relay::broker(&self.registry, &mut self.transport, request)
        {
            debug!(to = %address, "master does not know about relay target");
        }
    }

    fn ban(&mut self, sender: ConnectionId, address: SocketAddr, bytes_per_ms: f64) {
        self.transport.close(sender);
        self.transport.ban(address.ip());
        let purged = self.registry.purge_ip(address.ip());
        warn!(
            peer = %address,
            bytes_per_ms,
            purged = purged.len(),
            "banned for flood attack"
        );
    }
}
