//! Core types and contracts for the lobby master server.
//!
//! This crate provides the pieces shared by the master and client roles:
//!
//! - **Rules**: per-server key/value rules with reserved-key protection
//! - **Registry**: ordered identity → [`ServerRecord`] storage with merge semantics
//! - **Wire**: tagged message codec ([`ToMaster`], [`ToClient`])
//! - **Transport**: the [`Transport`] collaborator contract and an in-memory implementation
//! - **Errors**: error handling with [`LobbyError`]
//!
//! # Example
//!
//! ```rust,ignore
//! use lobby_core::{ConnectionId, Registry, ServerRecord, Timestamp};
//!
//! let mut registry = Registry::new();
//! let mut record = ServerRecord::new(ConnectionId::new(7), "10.0.0.7:27015".parse()?);
//! record.rules.set_rule("map", Some("dust"), None);
//! let (_, added) = registry.upsert(&record, true, Timestamp::from_millis(0));
//! assert!(added);
//! ```

#![doc(html_root_url = "https://docs.rs/lobby-core/0.1.0")]

mod error;
pub mod memory;
pub mod record;
pub mod registry;
pub mod rules;
pub mod transport;
pub mod types;
pub mod wire;

pub use error::{LobbyError, Result};
pub use memory::{MemoryTransport, SentPacket};
pub use record::ServerRecord;
pub use registry::Registry;
pub use rules::{is_reserved_key, is_valid_key, Rule, RuleSet, MAX_KEY_LEN, PING_KEY, RESERVED_KEYS};
pub use transport::{
    Dispatch, InboundMessage, Reliability, Target, TrafficStats, Transport, TransportEvent,
};
pub use types::*;
pub use wire::{DecodeError, MessageTag, ServerEntry, ToClient, ToMaster};
