//! Token bucket shared by all operations against one directory backend.
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Longest single sleep; the bucket is checked again afterwards.
const MAX_WAIT: Duration = Duration::from_secs(3600);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Steady state `rate` tokens per second, at most `burst` tokens banked.
#[derive(Debug)]
pub struct RateLimiter {
    rate: f64,
    burst: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    pub fn new(rate: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last: Instant::now(),
            }),
        }
    }

    /// Wait until a token is available and take it.
    ///
    /// Callers bound the wait with their own deadline; dropping the future
    /// gives up the wait without consuming a token.
    pub async fn acquire(&self) {
        loop {
            let wait = match self.try_take(Instant::now()).await {
                None => return,
                Some(wait) => wait,
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Takes a token, or returns how long until one becomes available.
    async fn try_take(&self, now: Instant) -> Option<Duration> {
        let mut bucket = self.bucket.lock().await;

        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return None;
        }

        if self.rate.is_nan() || self.rate <= 0.0 {
            return Some(MAX_WAIT);
        }
        let wait = Duration::try_from_secs_f64((1.0 - bucket.tokens) / self.rate);
        Some(wait.map_or(MAX_WAIT, |wait| wait.min(MAX_WAIT)))
    }
}
