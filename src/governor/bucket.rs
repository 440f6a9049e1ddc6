//! Continuous-refill token bucket.

use parking_lot::Mutex;
use tokio::time::{sleep, Duration, Instant};

/// Tokens within this distance of a whole token count as a whole token.
const EPSILON: f64 = 1e-9;

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket refilled in proportion to elapsed time.
///
/// Fractional tokens are tracked. Acquisition never polls: when the bucket is
/// empty the caller sleeps exactly until the next whole token is due.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    /// Tokens added per millisecond.
    refill_rate: f64,
}

impl TokenBucket {
    /// A full bucket holding `capacity` tokens and refilling `per_minute` tokens a minute.
    pub fn new(capacity: u32, per_minute: u32) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_rate: f64::from(per_minute.max(1)) / 60_000.0,
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(state.last_refill).as_secs_f64() * 1_000.0;
        state.tokens = (state.tokens + elapsed_ms * self.refill_rate).min(self.capacity);
        state.last_refill = now;
    }

    /// Take a token if one is available, otherwise report how long until one is.
    pub fn try_acquire(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());

        if state.tokens + EPSILON >= 1.0 {
            state.tokens = (state.tokens - 1.0).max(0.0);
            Ok(())
        } else {
            let missing = 1.0 - state.tokens;
            let micros = (missing / self.refill_rate * 1_000.0).ceil();
            Err(Duration::from_micros(micros as u64))
        }
    }

    /// Wait for and take a token. Returns the total time spent waiting.
    pub async fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        loop {
            match self.try_acquire() {
                Ok(()) => return waited,
                Err(wait) => {
                    sleep(wait).await;
                    waited += wait;
                }
            }
        }
    }

    /// Tokens currently available, including fractions.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_full_bucket_serves_capacity_immediately() {
        let bucket = TokenBucket::new(3, 60);
        for _ in 0..3 {
            assert!(bucket.try_acquire().is_ok());
        }
        let wait = bucket.try_acquire().unwrap_err();
        assert_eq!(wait.as_millis(), 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acquire_waits_exactly_one_refill_interval() {
        let bucket = TokenBucket::new(2, 30);
        bucket.acquire().await;
        bucket.acquire().await;

        let start = Instant::now();
        let waited = bucket.acquire().await;
        let elapsed = start.elapsed();

        assert!(elapsed >= Duration::from_millis(2_000), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(2_050), "elapsed {:?}", elapsed);
        assert!(waited >= Duration::from_millis(2_000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_fractional_and_capped() {
        let bucket = TokenBucket::new(2, 60);
        bucket.acquire().await;
        bucket.acquire().await;

        tokio::time::advance(Duration::from_millis(500)).await;
        let available = bucket.available();
        assert!((available - 0.5).abs() < 0.01, "available {}", available);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(bucket.available(), 2.0);
    }
}
