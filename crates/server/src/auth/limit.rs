use std::net::IpAddr;
use std::num::NonZeroU32;

use governor::clock::DefaultClock;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use tracing::warn;

use crate::error::RequestError;

const AUTH_ATTEMPTS_PER_MINUTE: u32 = 5;

/// Per-IP limiter for the credential endpoints (register/login), keyed on
/// the peer address
pub struct AuthRateLimiter {
    limiter: RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>,
}

impl AuthRateLimiter {
    pub fn new() -> Self {
        let quota = Quota::per_minute(
            NonZeroU32::new(AUTH_ATTEMPTS_PER_MINUTE).expect("nonzero quota"),
        );
        Self {
            limiter: RateLimiter::dashmap(quota),
        }
    }

    pub fn check(&self, ip: IpAddr) -> Result<(), RequestError> {
        self.limiter.check_key(&ip).map_err(|_| {
            warn!("rate limited auth attempt from {ip}");
            RequestError::RateLimited
        })
    }
}

impl Default for AuthRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_quota_then_rejects() {
        let limiter = AuthRateLimiter::new();
        let ip: IpAddr = "203.0.113.7".parse().unwrap();
        for _ in 0..AUTH_ATTEMPTS_PER_MINUTE {
            assert!(limiter.check(ip).is_ok());
        }
        assert!(limiter.check(ip).is_err());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = AuthRateLimiter::new();
        let first: IpAddr = "203.0.113.7".parse().unwrap();
        let second: IpAddr = "203.0.113.8".parse().unwrap();
        for _ in 0..AUTH_ATTEMPTS_PER_MINUTE {
            assert!(limiter.check(first).is_ok());
        }
        assert!(limiter.check(first).is_err());
        assert!(limiter.check(second).is_ok());
    }
}
