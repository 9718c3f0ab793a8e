use serde::{Deserialize, Serialize};

/// Opaque identifier of a transport connection
///
/// Server records are keyed by the connection that registered them. The
/// [`ConnectionId::UNASSIGNED`] sentinel marks a record that has no live
/// connection yet (for example a client's own local record) and is never
/// matched by queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Sentinel for "no connection"
    pub const UNASSIGNED: Self = Self(u64::MAX);

    /// Wrap a raw transport identifier
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw transport identifier
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true for the unassigned sentinel
    #[must_use]
    pub const fn is_unassigned(self) -> bool {
        self.0 == u64::MAX
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::UNASSIGNED
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unassigned() {
            write!(f, "unassigned")
        } else {
            write!(f, "{:016x}", self.0)
        }
    }
}

impl From<u64> for ConnectionId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}
