//! Flood guard: bans peers whose average inbound rate is too high.
//!
//! The check runs on every inbound packet before it is decoded. A peer is
//! only judged once its connection is older than the check delay, so short
//! bursts during connection setup are tolerated.

use std::time::Duration;

use lobby_core::{Timestamp, TrafficStats};

use crate::config::MasterConfig;

/// Result of inspecting a connection's traffic
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FloodVerdict {
    /// Traffic is acceptable
    Allow,
    /// Traffic is abusive; the peer should be closed and banned
    Ban {
        /// Observed average inbound rate
        bytes_per_ms: f64,
    },
}

/// Per-connection traffic-rate check
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloodGuard {
    check_delay_ms: u64,
    bytes_per_ms: f64,
}

impl FloodGuard {
    /// Create a guard that bans peers above `bytes_per_ms` once older than `check_delay`
    #[must_use]
    pub fn new(check_delay: Duration, bytes_per_ms: f64) -> Self {
        Self {
            check_delay_ms: u64::try_from(check_delay.as_millis()).unwrap_or(u64::MAX),
            bytes_per_ms,
        }
    }

    /// Judge a connection. Connections without stats are allowed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn inspect(&self, stats: Option<TrafficStats>, now: Timestamp) -> FloodVerdict {
        let Some(stats) = stats else {
            return FloodVerdict::Allow;
        };

        let age = now.millis_since(stats.connection_start);
        let bytes_per_ms = stats.bytes_received as f64 / age.max(1) as f64;

        if age > self.check_delay_ms && bytes_per_ms > self.bytes_per_ms {
            FloodVerdict::Ban { bytes_per_ms }
        } else {
            FloodVerdict::Allow
        }
    }
}

impl From<&MasterConfig> for FloodGuard {
    fn from(config: &MasterConfig) -> Self {
        Self::new(config.flood_check_delay(), config.flood_bytes_per_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(start: u64, bytes: u64) -> Option<TrafficStats> {
        Some(TrafficStats {
            connection_start: Timestamp::from_millis(start),
            bytes_received: bytes,
        })
    }

    fn guard() -> FloodGuard {
        FloodGuard::new(Duration::from_millis(5_000), 2.0)
    }

    #[test]
    fn test_heavy_old_connection_is_banned() {
        let verdict = guard().inspect(stats(0, 30_000), Timestamp::from_millis(6_000));
        assert_eq!(verdict, FloodVerdict::Ban { bytes_per_ms: 5.0 });
    }

    #[test]
    fn test_young_connection_is_allowed() {
        // 100 bytes/ms, but only 5s old (not strictly past the delay).
        let verdict = guard().inspect(stats(0, 500_000), Timestamp::from_millis(5_000));
        assert_eq!(verdict, FloodVerdict::Allow);
    }

    #[test]
    fn test_rate_at_threshold_is_allowed() {
        let verdict = guard().inspect(stats(0, 12_000), Timestamp::from_millis(6_000));
        assert_eq!(verdict, FloodVerdict::Allow);
    }

    #[test]
    fn test_missing_stats_are_allowed() {
        assert_eq!(
            guard().inspect(None, Timestamp::from_millis(60_000)),
            FloodVerdict::Allow
        );
    }

    #[test]
    fn test_clock_skew_does_not_divide_by_zero() {
        let verdict = guard().inspect(stats(10_000, 1_000), Timestamp::from_millis(9_000));
        assert_eq!(verdict, FloodVerdict::Allow);
    }
}
