//! Per-connection token bucket.

use std::time::{Duration, Instant};

/// Default burst capacity for rate limiting (messages).
pub const DEFAULT_RATE_LIMIT_BURST: u32 = 100;
/// Default sustained rate for rate limiting (messages per second).
///
/// Drawing clients stream strokes, so this sits well above what a chat-style
/// protocol would need.
pub const DEFAULT_RATE_LIMIT_SUSTAINED: u32 = 30;

/// Token bucket rate limiter for WebSocket connections.
///
/// Allows burst traffic up to `capacity` tokens, refilling at `refill_rate` tokens per second.
#[derive(Debug)]
pub struct RateLimiter {
    /// Current number of available tokens.
    tokens: f64,
    /// Maximum token capacity (burst limit).
    capacity: f64,
    /// Tokens added per second (sustained rate).
    refill_rate: f64,
    /// Last time tokens were refilled.
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    ///
    /// * `burst_capacity` - Maximum number of tokens (burst limit)
    /// * `sustained_rate` - Tokens added per second (sustained rate)
    #[must_use]
    pub fn new(burst_capacity: u32, sustained_rate: u32) -> Self {
        Self {
            tokens: f64::from(burst_capacity),
            capacity: f64::from(burst_capacity),
            refill_rate: f64::from(sustained_rate),
            last_refill: Instant::now(),
        }
    }

    /// Try to consume one token. Returns true if allowed, false if rate limited.
    pub fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill);
        let new_tokens = elapsed.as_secs_f64() * self.refill_rate;
        self.tokens = (self.tokens + new_tokens).min(self.capacity);
        self.last_refill = now;
    }

    /// Get the time until the next token is available.
    ///
    /// Returns `None` if tokens are already available. A zero refill rate
    /// never recovers, which is reported as one second so clients back off.
    #[must_use]
    pub fn time_until_available(&self) -> Option<Duration> {
        if self.tokens >= 1.0 {
            None
        } else if self.refill_rate <= 0.0 {
            Some(Duration::from_secs(1))
        } else {
            let needed = 1.0 - self.tokens;
            let seconds = needed / self.refill_rate;
            Some(Duration::from_secs_f64(seconds))
        }
    }

    /// Suggested client back-off in milliseconds, capped at ten seconds.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)] // capped at 10_000
    pub fn retry_after_ms(&self) -> u64 {
        self.time_until_available()
            .map_or(100, |d| d.as_millis().min(10_000) as u64)
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_RATE_LIMIT_BURST, DEFAULT_RATE_LIMIT_SUSTAINED)
    }
}
