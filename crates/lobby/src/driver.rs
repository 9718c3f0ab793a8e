//! Async drivers that own a role and feed it ticks and traffic.
//!
//! A role object is single-writer: the driver holds it mutably for its whole
//! run and interleaves periodic `update` calls with inbound packets and
//! events from an `mpsc` channel. Anything the role does not consume is
//! passed on through the `forward` channel. The driver returns once the
//! inbound channel closes.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use lobby_client::Session;
use lobby_core::{Clock, Dispatch, InboundMessage, LobbyError, Transport, TransportEvent};
use lobby_master::Master;

/// Traffic delivered to a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A packet from a peer
    Message(InboundMessage),
    /// A connection lifecycle notification
    Event(TransportEvent),
}

/// Something a driver can run
pub trait Role {
    /// Per-tick work
    fn tick(&mut self);

    /// Handle one packet
    fn on_message(&mut self, message: &InboundMessage) -> Dispatch;

    /// Handle one lifecycle event
    fn on_event(&mut self, event: &TransportEvent) -> Dispatch;
}

impl<T: Transport, C: Clock> Role for Master<T, C> {
    fn tick(&mut self) {
        self.update();
    }

    fn on_message(&mut self, message: &InboundMessage) -> Dispatch {
        self.handle_message(message)
    }

    fn on_event(&mut self, event: &TransportEvent) -> Dispatch {
        self.handle_event(event)
    }
}

impl<T: Transport, C: Clock> Role for Session<T, C> {
    fn tick(&mut self) {
        self.update();
    }

    fn on_message(&mut self, message: &InboundMessage) -> Dispatch {
        self.handle_message(message)
    }

    fn on_event(&mut self, event: &TransportEvent) -> Dispatch {
        self.handle_event(event)
    }
}

/// Run a master until `inbound` closes
pub async fn run_master<T: Transport, C: Clock>(
    master: &mut Master<T, C>,
    tick: Duration,
    inbound: mpsc::Receiver<Inbound>,
    forward: mpsc::UnboundedSender<Inbound>,
) -> lobby_core::Result<()> {
    info!(tick_ms = tick.as_millis(), "master driver started");
    run(master, tick, inbound, forward).await
}

/// Run a client session until `inbound` closes
pub async fn run_session<T: Transport, C: Clock>(
    session: &mut Session<T, C>,
    tick: Duration,
    inbound: mpsc::Receiver<Inbound>,
    forward: mpsc::UnboundedSender<Inbound>,
) -> lobby_core::Result<()> {
    info!(tick_ms = tick.as_millis(), "session driver started");
    run(session, tick, inbound, forward).await
}

/// Drive any [`Role`] until `inbound` closes
pub async fn run<R: Role + ?Sized>(
    role: &mut R,
    tick: Duration,
    mut inbound: mpsc::Receiver<Inbound>,
    forward: mpsc::UnboundedSender<Inbound>,
) -> lobby_core::Result<()> {
    if tick.is_zero() {
        return Err(LobbyError::Config("tick interval must be non-zero".to_string()));
    }

    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = ticker.tick() => role.tick(),
            item = inbound.recv() => {
                let Some(item) = item else {
                    debug!("inbound channel closed, stopping driver");
                    break;
                };
                let dispatch = match &item {
                    Inbound::Message(message) => role.on_message(message),
                    Inbound::Event(event) => role.on_event(event),
                };
                if dispatch.should_forward() && forward.send(item).is_err() {
                    debug!("forward receiver dropped");
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lobby_client::SessionConfig;
    use lobby_core::{
        ConnectionId, ManualClock, MemoryTransport, RuleSet, ServerEntry, Target, Timestamp,
        ToClient, ToMaster,
    };
    use lobby_master::MasterConfig;
    use std::net::SocketAddr;
    use tokio_test::{assert_err, assert_ok};

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn set_server(id: u64, from: &str) -> Inbound {
        let entry = ServerEntry {
            identity: ConnectionId::UNASSIGNED,
            address: addr("0.0.0.0:27015"),
            rules: RuleSet::new(),
        };
        Inbound::Message(InboundMessage::new(
            ConnectionId::new(id),
            addr(from),
            ToMaster::SetServer(entry).encode(),
        ))
    }

    #[tokio::test]
    async fn test_master_driver_handles_traffic_until_closed() {
        let clock = ManualClock::new(Timestamp::from_millis(1_000));
        let mut master = Master::with_clock(MemoryTransport::new(), clock, &MasterConfig::default());

        let (tx, rx) = mpsc::channel(8);
        let (forward, mut forwarded) = mpsc::unbounded_channel();

        tx.send(set_server(1, "203.0.113.1:50000")).await.unwrap();
        tx.send(set_server(2, "203.0.113.2:50000")).await.unwrap();
        let query = ToMaster::Query { keys: Vec::new() };
        tx.send(Inbound::Message(InboundMessage::new(
            ConnectionId::new(9),
            addr("198.51.100.1:40000"),
            query.encode(),
        )))
        .await
        .unwrap();
        let game_packet = Inbound::Message(InboundMessage::new(
            ConnectionId::new(9),
            addr("198.51.100.1:40000"),
            vec![0x01, 0x02],
        ));
        tx.send(game_packet.clone()).await.unwrap();
        drop(tx);

        assert_ok!(run_master(&mut master, Duration::from_millis(50), rx, forward).await);

        assert_eq!(master.registry().len(), 2);
        let sent = master.transport_mut().take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].target, Target::Connection(ConnectionId::new(9)));
        let Some(ToClient::FullListing(entries)) = ToClient::decode(&sent[0].payload).unwrap() else {
            panic!("expected full listing");
        };
        assert_eq!(entries.len(), 2);

        assert_eq!(forwarded.recv().await, Some(game_packet));
        assert!(forwarded.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_session_driver_publishes_on_tick() {
        let master_id = ConnectionId::new(100);
        let master_addr = addr("192.0.2.1:60000");
        let mut session = Session::new(MemoryTransport::new(), &SessionConfig { game_port: 27015 });
        session.connect(master_addr).unwrap();
        session.transport_mut().add_connection(master_id);
        session.list_server();

        let (tx, rx) = mpsc::channel(8);
        let (forward, mut forwarded) = mpsc::unbounded_channel();
        let connected = Inbound::Event(TransportEvent::Connected {
            id: master_id,
            address: master_addr,
        });
        tx.send(connected.clone()).await.unwrap();

        let driver = tokio::spawn(async move {
            let result = run_session(&mut session, Duration::from_millis(5), rx, forward).await;
            (session, result)
        });

        // lifecycle events are always passed through
        assert_eq!(forwarded.recv().await, Some(connected));
        tokio::time::sleep(Duration::from_millis(30)).await;
        drop(tx);

        let (session, result) = driver.await.unwrap();
        assert_ok!(result);
        assert!(session.transport().sent.iter().any(|packet| matches!(
            ToMaster::decode(&packet.payload),
            Ok(Some(ToMaster::SetServer(_)))
        )));
    }

    #[tokio::test]
    async fn test_zero_tick_is_rejected() {
        let mut master = Master::new(MemoryTransport::new(), &MasterConfig::default());
        let (_tx, rx) = mpsc::channel(1);
        let (forward, _forwarded) = mpsc::unbounded_channel();

        assert_err!(run_master(&mut master, Duration::ZERO, rx, forward).await);
    }
}
