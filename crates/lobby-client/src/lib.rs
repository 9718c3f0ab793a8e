//! Client role for the lobby.
//!
//! A [`Session`] connects a game to a master server. It can publish the
//! game's own server (with rules such as map or mode), browse the servers
//! other games have published, and ask the master to introduce it to a
//! server behind NAT.
//!
//! # Example
//!
//! ```rust,ignore
//! use lobby_client::{Session, SessionConfig};
//! use lobby_core::MemoryTransport;
//!
//! let mut session = Session::new(MemoryTransport::new(), &SessionConfig { game_port: 27015 });
//! session.connect("192.0.2.1:60000".parse()?)?;
//! session.post_rule("map", Some("harbor"), None);
//! session.list_server();
//! ```

#![doc(html_root_url = "https://docs.rs/lobby-client/0.1.0")]

pub mod config;
pub mod events;
mod session;

pub use config::SessionConfig;
pub use events::SessionEvent;
pub use session::{Session, SessionState};
