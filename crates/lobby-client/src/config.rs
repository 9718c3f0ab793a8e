//! Client session configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;

use lobby_core::LobbyError;

/// Settings for a client session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Port the local game server accepts players on.
    /// `0` lets the master use the port the session connected from.
    #[serde(default)]
    pub game_port: u16,
}

impl SessionConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> lobby_core::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str(&content).map_err(|e| LobbyError::Config(e.to_string()))
        } else {
            Ok(Self::default())
        }
    }
}
