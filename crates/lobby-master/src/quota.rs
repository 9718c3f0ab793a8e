//! Per-IP query quota backed by `governor`.

use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::net::IpAddr;
use std::num::NonZeroU32;

/// Limits how many queries one IP may issue per second
pub struct QueryQuota {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl QueryQuota {
    /// Allow `per_second` queries per IP, with bursts of the same size.
    ///
    /// Replenishment follows governor's monotonic wall clock, not the
    /// [`Clock`](lobby_core::Clock) the owning [`Master`](crate::Master) runs on,
    /// so a manual clock does not refill the quota.
    #[must_use]
    pub fn per_second(per_second: NonZeroU32) -> Self {
        Self {
            limiter: RateLimiter::keyed(Quota::per_second(per_second)),
        }
    }

    /// Returns true if `ip` may issue a query now (and counts it)
    pub fn allow(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Forget IPs whose quota has fully replenished
    pub fn prune(&self) {
        self.limiter.retain_recent();
    }
}

impl std::fmt::Debug for QueryQuota {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryQuota")
            .field("tracked_ips", &self.limiter.len())
            .finish()
    }
}
