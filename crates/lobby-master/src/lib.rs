//! Master server role for the lobby.
//!
//! The [`Master`] keeps the authoritative [`Registry`](lobby_core::Registry)
//! of listed game servers and answers client traffic:
//!
//! - **Queries**: full or rule-filtered listings ([`query`])
//! - **Liveness**: keep-alive probing and eviction ([`liveness`])
//! - **Flood defense**: bandwidth-based banning ([`flood`]) and an optional per-IP query quota ([`quota`])
//! - **Relay**: NAT punch-through introductions ([`relay`])
//!
//! # Example
//!
//! ```rust,ignore
//! use lobby_core::MemoryTransport;
//! use lobby_master::{Master, MasterConfig};
//!
//! let config = MasterConfig::load("master.toml".as_ref())?;
//! let mut master = Master::new(MemoryTransport::new(), &config);
//! master.update();
//! ```

#![doc(html_root_url = "https://docs.rs/lobby-master/0.1.0")]

pub mod config;
pub mod flood;
pub mod liveness;
mod master;
pub mod query;
pub mod quota;
pub mod relay;

pub use config::MasterConfig;
pub use flood::{FloodGuard, FloodVerdict};
pub use liveness::{LivenessPolicy, SweepReport};
pub use master::Master;
pub use query::{run_query, Listing, QueryMatch};
pub use quota::QueryQuota;
pub use relay::{RelayOutcome, RelayRequest};
