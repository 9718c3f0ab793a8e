//! Client side of the lobby: publishes the local server and browses the listing.

use bytes::Bytes;
use std::mem;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{debug, info};

use lobby_core::{
    is_reserved_key, is_valid_key, Clock, ConnectionId, Dispatch, InboundMessage, LobbyError,
    Registry, Reliability, ServerEntry, ServerRecord, SystemClock, Target, Timestamp, ToClient,
    ToMaster, Transport, TransportEvent, PING_KEY,
};

use crate::config::SessionConfig;
use crate::events::SessionEvent;

/// Where a session stands with its master
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No master connection
    Disconnected,
    /// Waiting for the transport to report the connection
    Connecting,
    /// Connected, local server not published
    Unlisted,
    /// Connected, local server published
    Listed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Link {
    Idle,
    Connecting(SocketAddr),
    Connected { id: ConnectionId, address: SocketAddr },
}

/// A game's connection to the master server.
///
/// Holds the local server record that gets published, the rule keys used for
/// the next query, and the listing received from the master. Like the master,
/// it is driven by [`Session::update`] plus the two `handle_*` entry points.
#[derive(Debug)]
pub struct Session<T: Transport, C: Clock = SystemClock> {
    transport: T,
    clock: C,
    link: Link,
    local: ServerRecord,
    list_intent: bool,
    listed: bool,
    modified: bool,
    query_keys: Vec<String>,
    listing: Registry,
    /// Update stamp of the last applied listing; strictly increasing
    listing_stamp: Timestamp,
    events: Vec<SessionEvent>,
}

impl<T: Transport> Session<T> {
    /// Create a session on the wall clock
    pub fn new(transport: T, config: &SessionConfig) -> Self {
        Self::with_clock(transport, SystemClock, config)
    }
}

impl<T: Transport, C: Clock> Session<T, C> {
    /// Create a session with an explicit clock
    pub fn with_clock(transport: T, clock: C, config: &SessionConfig) -> Self {
        Self {
            transport,
            clock,
            link: Link::Idle,
            local: ServerRecord::local(config.game_port),
            list_intent: false,
            listed: false,
            modified: false,
            query_keys: Vec::new(),
            listing: Registry::new(),
            listing_stamp: Timestamp::ZERO,
            events: Vec::new(),
        }
    }

    /// Current connection and listing state
    pub const fn state(&self) -> SessionState {
        match self.link {
            Link::Idle => SessionState::Disconnected,
            Link::Connecting(_) => SessionState::Connecting,
            Link::Connected { .. } if self.listed => SessionState::Listed,
            Link::Connected { .. } => SessionState::Unlisted,
        }
    }

    /// Servers received from the master
    pub const fn listing(&self) -> &Registry {
        &self.listing
    }

    /// The record this session publishes
    pub const fn local_server(&self) -> &ServerRecord {
        &self.local
    }

    /// Keys the next [`Session::query_master`] will ask for
    pub fn query_keys(&self) -> &[String] {
        &self.query_keys
    }

    /// Advertised game port
    pub const fn game_port(&self) -> u16 {
        self.local.address.port()
    }

    /// Address of the master, once connected
    pub const fn master_address(&self) -> Option<SocketAddr> {
        match self.link {
            Link::Connected { address, .. } => Some(address),
            _ => None,
        }
    }

    /// The underlying transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// The underlying transport, mutably
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Take every event queued since the last call
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        mem::take(&mut self.events)
    }

    /// Start connecting to a master.
    ///
    /// Resets the local rules, listing flags and query keys; the game port
    /// is kept. An existing master connection is closed first.
    pub fn connect(&mut self, master: SocketAddr) -> lobby_core::Result<()> {
        if let Link::Connected { id, .. } = self.link {
            self.transport.close(id);
        }
        self.local.clear();
        self.reset_flags();
        self.query_keys.clear();
        self.link = Link::Idle;

        self.transport.connect(master)?;
        self.link = Link::Connecting(master);
        debug!(master = %master, "connecting to master");
        Ok(())
    }

    /// Delist (if connected) and drop the master connection
    pub fn disconnect(&mut self) {
        if self.is_connected() {
            self.delist_server();
        }
        if let Link::Connected { id, .. } = self.link {
            self.transport.close(id);
        }
        self.link = Link::Idle;
        self.reset_flags();
    }

    /// Returns true while the master connection is up
    pub fn is_connected(&self) -> bool {
        match self.link {
            Link::Connected { id, .. } => self.transport.is_connected(id),
            _ => false,
        }
    }

    /// Ask for the local server to be published on the next update
    pub fn list_server(&mut self) {
        self.list_intent = true;
    }

    /// Stop publishing; tells the master right away if currently listed
    pub fn delist_server(&mut self) {
        self.list_intent = false;
        if self.listed {
            let delist = ToMaster::DelistServer {
                port: self.game_port(),
            };
            self.send(delist.encode(), Reliability::ReliableOrdered);
            self.listed = false;
            info!(port = self.game_port(), "local server delisted");
        }
    }

    /// Per-tick work: publish the local record when it is new or changed.
    ///
    /// Returns true if a SET_SERVER went out.
    pub fn update(&mut self) -> bool {
        if !matches!(self.link, Link::Connected { .. }) {
            return false;
        }
        if !self.list_intent || (self.listed && !self.modified) {
            return false;
        }

        let publish = ToMaster::SetServer(self.local.to_entry());
        self.send(publish.encode(), Reliability::ReliableOrdered);
        if !self.listed {
            info!(port = self.game_port(), rules = self.local.rules.len(), "local server listed");
        }
        self.listed = true;
        self.modified = false;
        true
    }

    /// Set a rule on the local server; reserved keys are ignored
    pub fn post_rule(&mut self, key: &str, text: Option<&str>, int: Option<i32>) -> bool {
        let changed = self.local.rules.set_rule(key, text, int);
        self.modified |= changed;
        changed
    }

    /// Remove a rule from the local server
    pub fn remove_rule(&mut self, key: &str) -> bool {
        let changed = self.local.rules.remove_rule(key);
        self.modified |= changed;
        changed
    }

    /// Change the advertised game port
    pub fn set_game_port(&mut self, port: u16) {
        if self.local.address.port() != port {
            self.local.address.set_port(port);
            self.modified = true;
        }
    }

    /// Add a key to the next query; reserved or malformed keys are ignored
    pub fn add_query_rule(&mut self, key: &str) -> bool {
        if !is_valid_key(key) || is_reserved_key(key) {
            return false;
        }
        self.query_keys.push(key.to_string());
        true
    }

    /// Forget every query key
    pub fn clear_query_rules(&mut self) {
        self.query_keys.clear();
    }

    /// Ask the master for servers holding any of the query keys (all
    /// servers when there are none)
    pub fn query_master(&mut self) -> lobby_core::Result<()> {
        self.require_connected()?;
        let query = ToMaster::Query {
            keys: self.query_keys.clone(),
        };
        debug!(keys = self.query_keys.len(), "querying master");
        self.send(query.encode(), Reliability::ReliableOrdered);
        Ok(())
    }

    /// Probe every listed server; replies update their `Ping` rule
    pub fn ping_servers(&mut self) {
        for record in self.listing.iter() {
            self.transport.probe(record.address);
        }
    }

    /// Ask the master to have a listed server open its NAT towards us
    pub fn request_introduction(
        &mut self,
        server_ip: IpAddr,
        server_port: u16,
    ) -> lobby_core::Result<()> {
        self.require_connected()?;
        let request = ToMaster::RelayRequest {
            requester_port: self.game_port(),
            target_port: server_port,
            target_address: server_ip.to_string(),
        };
        debug!(addr = %server_ip, port = server_port, "requesting introduction");
        self.send(request.encode(), Reliability::Reliable);
        Ok(())
    }

    /// Handle one inbound packet; non-lobby packets are forwarded
    pub fn handle_message(&mut self, message: &InboundMessage) -> Dispatch {
        let decoded = match ToClient::decode(&message.payload) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return Dispatch::Forward,
            Err(e) => {
                debug!(from = %message.address, error = %e, "dropping malformed message");
                return Dispatch::Handled;
            }
        };

        match decoded {
            ToClient::FullListing(entries) => self.apply_listing(entries, true),
            ToClient::FilteredListing(entries) => self.apply_listing(entries, false),
            ToClient::RelayIntroduction {
                requester_address,
                requester_port,
            } => self.handle_introduction(&requester_address, requester_port),
        }
        Dispatch::Handled
    }

    /// Handle a transport lifecycle event; always forwarded
    pub fn handle_event(&mut self, event: &TransportEvent) -> Dispatch {
        match *event {
            TransportEvent::Connected { id, address } => {
                if self.link == Link::Connecting(address) {
                    self.link = Link::Connected { id, address };
                    info!(master = %address, "connected to master");
                }
            }
            TransportEvent::ConnectionLost { id } => {
                if matches!(self.link, Link::Connected { id: master, .. } if master == id) {
                    info!("lost connection to master");
                    self.drop_link(SessionEvent::ConnectionLost);
                }
            }
            TransportEvent::ConnectionFailed { address } => {
                if self.link == Link::Connecting(address) {
                    info!(master = %address, "master connection attempt failed");
                    self.drop_link(SessionEvent::ConnectionFailed);
                }
            }
            TransportEvent::NoFreeConnections { address } => {
                if self.link == Link::Connecting(address) {
                    info!(master = %address, "master is full");
                    self.drop_link(SessionEvent::MasterFull);
                }
            }
            TransportEvent::Pong { address, round_trip } => {
                if let Some(record) = self.listing.record_pong(address) {
                    let millis = i32::try_from(round_trip.as_millis()).unwrap_or(i32::MAX);
                    record.rules.set_internal(PING_KEY, None, Some(millis));
                }
            }
        }
        Dispatch::Forward
    }

    fn apply_listing(&mut self, entries: Vec<ServerEntry>, overwrite: bool) {
        // every batch gets its own stamp, even within one clock tick,
        // so the sweep below only keeps what this batch refreshed
        let now = self
            .clock
            .now()
            .max(self.listing_stamp.saturating_add(Duration::from_millis(1)));
        self.listing_stamp = now;

        for entry in entries {
            let candidate = ServerRecord::from(entry);
            let (record, added) = self.listing.upsert(&candidate, overwrite, now);
            let identity = record.identity;
            if added {
                self.transport.probe(record.address);
                self.events.push(SessionEvent::ServerAdded { identity });
            } else {
                self.events.push(SessionEvent::ServerUpdated { identity });
            }
        }

        let removed = self.listing.sweep_stale(now);
        let servers = self.listing.len();
        debug!(servers, removed, overwrite, "listing applied");
        self.events
            .push(SessionEvent::QueryComplete { servers, removed });
    }

    fn handle_introduction(&mut self, requester_address: &str, requester_port: u16) {
        let Ok(ip) = requester_address.trim().parse::<IpAddr>() else {
            debug!(addr = requester_address, "introduction with invalid address");
            return;
        };
        let peer = SocketAddr::new(ip, requester_port);
        self.transport.probe(peer);
        info!(peer = %peer, "introduction requested");
        self.events.push(SessionEvent::IntroductionRequested { peer });
    }

    fn require_connected(&self) -> lobby_core::Result<()> {
        match self.link {
            Link::Connected { .. } => Ok(()),
            _ => Err(LobbyError::NotConnected),
        }
    }

    fn send(&mut self, payload: Bytes, reliability: Reliability) {
        self.transport.send(payload, Target::Broadcast, reliability);
    }

    fn drop_link(&mut self, event: SessionEvent) {
        self.link = Link::Idle;
        self.reset_flags();
        self.events.push(event);
    }

    fn reset_flags(&mut self) {
        self.list_intent = false;
        self.listed = false;
        self.modified = false;
    }
}
