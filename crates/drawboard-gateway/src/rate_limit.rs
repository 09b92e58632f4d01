//! Per-IP sliding-window request limiter.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// In-memory per-IP limiter: at most `max_per_window` calls per `window`.
pub struct RateLimiter {
    name: &'static str,
    max_per_window: u32,
    window: Duration,
    calls: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, max_per_window: u32, window: Duration) -> Self {
        Self {
            name,
            max_per_window,
            window,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Record a call from `ip`. Returns false when the call is over the limit.
    pub fn check(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut map = self.lock();
        let timestamps = map.entry(ip).or_default();

        // Remove stale entries
        timestamps.retain(|t| now.duration_since(*t) < self.window);

        if timestamps.len() >= self.max_per_window as usize {
            warn!(%ip, limiter = self.name, count = timestamps.len(), limit = self.max_per_window,
                "Rate limited");
            return false;
        }

        timestamps.push(now);
        true
    }

    /// Forget addresses whose calls have all expired.
    pub fn sweep(&self) {
        let now = Instant::now();
        let mut map = self.lock();
        map.retain(|_, timestamps| {
            timestamps.retain(|t| now.duration_since(*t) < self.window);
            !timestamps.is_empty()
        });
        debug!(limiter = self.name, entries = map.len(), "Rate limiter cleanup");
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<IpAddr, Vec<Instant>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
