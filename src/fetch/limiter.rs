//! Per-domain politeness delay.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::debug;

/// Advisory per-domain rate limiter.
///
/// `wait` sleeps the calling task until a randomly drawn delay in the
/// configured window has elapsed since the previous request to the same
/// domain; a domain seen for the first time does not wait. The random draw
/// keeps parallel ingesters from falling into synchronized bursts.
///
/// State is in-memory and per-instance. This is politeness, not a hard
/// concurrency gate: callers that bypass the limiter are not policed, and
/// two tasks waiting on the same domain may wake together.
#[derive(Debug)]
pub struct RateLimiter {
    min_delay: Duration,
    max_delay: Duration,
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    /// Create a limiter with the given delay window in milliseconds.
    /// An inverted window collapses to `min_delay_ms`.
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        let min_delay = Duration::from_millis(min_delay_ms);
        let max_delay = Duration::from_millis(max_delay_ms.max(min_delay_ms));
        Self {
            min_delay,
            max_delay,
            last_request: Mutex::new(HashMap::new()),
        }
    }

    /// Wait out the domain's politeness delay, then stamp the request time
    pub async fn wait(&self, domain: &str) {
        let remaining = {
            let last = self.last_request.lock().await;
            last.get(domain)
                .and_then(|prev| self.random_delay().checked_sub(prev.elapsed()))
        };

        if let Some(remaining) = remaining {
            debug!(
                domain,
                wait_ms = remaining.as_millis() as u64,
                "Waiting on politeness delay"
            );
            tokio::time::sleep(remaining).await;
        }

        self.last_request
            .lock()
            .await
            .insert(domain.to_string(), Instant::now());
    }

    fn random_delay(&self) -> Duration {
        if self.max_delay == self.min_delay {
            return self.min_delay;
        }
        let span_ms = (self.max_delay - self.min_delay).as_millis() as u64;
        let jitter = rand::thread_rng().gen_range(0..=span_ms);
        self.min_delay + Duration::from_millis(jitter)
    }
}
