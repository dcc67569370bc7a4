use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Windows are pruned once the table holds this many client addresses.
const PRUNE_THRESHOLD: usize = 1024;

/// Source of "now" for the limiter, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed-window request counter keyed by client address.
///
/// State lives as long as the limiter; nothing is persisted.
#[derive(Clone)]
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
    windows: Arc<Mutex<HashMap<String, Window>>>,
}

impl RateLimiter {
    /// Creates a new `RateLimiter` on the system clock.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self::with_clock(max_requests, window, Arc::new(SystemClock))
    }

    pub fn with_clock(max_requests: u32, window: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            max_requests,
            window,
            clock,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request from `client` and reports whether it may proceed.
    pub async fn check(&self, client: &str) -> bool {
        let now = self.clock.now();
        let mut windows = self.windows.lock().await;

        if windows.len() >= PRUNE_THRESHOLD {
            windows.retain(|_, w| now < w.reset_at);
        }

        if let Some(w) = windows.get_mut(client) {
            if now < w.reset_at {
                if w.count >= self.max_requests {
                    tracing::warn!("Rate limit hit for {} ({} requests)", client, w.count);
                    return false;
                }
                w.count += 1;
                return true;
            }
        }

        windows.insert(
            client.to_string(),
            Window {
                count: 1,
                reset_at: now + self.window,
            },
        );
        true
    }

    /// Time left until `client`'s window resets, if it has one.
    pub async fn retry_after(&self, client: &str) -> Option<Duration> {
        let now = self.clock.now();
        let windows = self.windows.lock().await;
        windows
            .get(client)
            .and_then(|w| w.reset_at.checked_duration_since(now))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    /// A clock that only moves when told to.
    pub struct ManualClock {
        now: StdMutex<Instant>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                now: StdMutex::new(Instant::now()),
            }
        }

        pub fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn test_n_plus_one_request_is_rejected() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(3, Duration::from_secs(60), clock.clone());

        for _ in 0..3 {
            assert!(limiter.check("10.0.0.1").await);
        }
        assert!(!limiter.check("10.0.0.1").await);
        // Other clients have their own window.
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn test_window_elapsing_resets_counter() {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(2, Duration::from_secs(60), clock.clone());

        assert!(limiter.check("ip").await);
        assert!(limiter.check("ip").await);
        assert!(!limiter.check("ip").await);

        clock.advance(Duration::from_secs(30));
        assert!(!limiter.check("ip").await);
        assert_eq!(limiter.retry_after("ip").await, Some(Duration::from_secs(30)));

        clock.advance(Duration::from_secs(30));
        assert!(limiter.check("ip").await);
        assert!(limiter.check("ip").await);
        assert!(!limiter.check("ip").await);
    }
}
