//! Game-server discovery and matchmaking.
//!
//! Game servers publish themselves to a master together with descriptive
//! rules; game clients query the master for servers, filtered by rule key,
//! and ask it to introduce them to servers sitting behind NAT.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use lobby::{driver, Master, MasterConfig};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main]
//! async fn main() -> lobby::Result<()> {
//!     let config = MasterConfig::load("master.toml".as_ref())?;
//!     let mut master = Master::new(my_transport(), &config);
//!
//!     let (packets, inbound) = mpsc::channel(256);
//!     let (forward, _game) = mpsc::unbounded_channel();
//!     // hand `packets` to the socket reader...
//!     driver::run_master(&mut master, config.keep_alive_interval() / 4, inbound, forward).await
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/lobby/0.1.0")]

pub mod driver;

// Re-export core types
pub use lobby_core::*;

// Re-export roles
pub use lobby_client::{Session, SessionConfig, SessionEvent, SessionState};
pub use lobby_master::{Master, MasterConfig, SweepReport};

pub use lobby_client as client;
pub use lobby_master as master;

// Re-export runtime for convenience
pub use tokio;
