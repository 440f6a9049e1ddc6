//! Retry delay computation.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::GovernorConfig;

/// Exponential backoff with bounded additive jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub multiplier: f64,
    pub max: Duration,
    pub jitter_max: Duration,
}

impl BackoffPolicy {
    pub fn from_config(config: &GovernorConfig) -> Self {
        Self {
            initial: Duration::from_millis(config.initial_backoff_ms),
            multiplier: config.backoff_multiplier,
            max: Duration::from_millis(config.max_backoff_ms),
            jitter_max: Duration::from_millis(config.jitter_max_ms),
        }
    }

    /// `initial * multiplier^attempt`, capped at `max`. `attempt` counts from zero.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = self.initial.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max.as_millis() as f64);
        Duration::from_millis(capped.max(0.0) as u64)
    }

    /// Base delay plus a random jitter in `0..=jitter_max`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter_max.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(jitter)
    }

    /// Delay requested by a `Retry-After` header, capped at `max`.
    pub fn retry_after(&self, header: &str, now: DateTime<Utc>) -> Option<Duration> {
        parse_retry_after(header, now).map(|d| d.min(self.max))
    }
}

/// Parse `Retry-After` as delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(header: &str, now: DateTime<Utc>) -> Option<Duration> {
    let header = header.trim();
    if header.is_empty() {
        return None;
    }

    if let Ok(seconds) = header.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(seconds) = header.parse::<f64>() {
        // Out-of-range values saturate; a later cap brings them down to `max`.
        if seconds.is_nan() || seconds < 0.0 {
            return None;
        }
        return Some(Duration::try_from_secs_f64(seconds).unwrap_or(Duration::MAX));
    }

    let date = DateTime::parse_from_rfc2822(header).ok()?;
    let delta = date.with_timezone(&Utc) - now;
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> BackoffPolicy {
        BackoffPolicy {
            initial: Duration::from_millis(500),
            multiplier: 2.0,
            max: Duration::from_millis(3_000),
            jitter_max: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let p = policy();
        assert_eq!(p.base_delay(0), Duration::from_millis(500));
        assert_eq!(p.base_delay(1), Duration::from_millis(1_000));
        assert_eq!(p.base_delay(2), Duration::from_millis(2_000));
        assert_eq!(p.base_delay(3), Duration::from_millis(3_000));
        assert_eq!(p.base_delay(30), Duration::from_millis(3_000));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let p = policy();
        for _ in 0..100 {
            let d = p.delay(1);
            assert!(d >= Duration::from_millis(1_000));
            assert!(d <= Duration::from_millis(1_250));
        }
    }

    #[test]
    fn test_retry_after_seconds() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("2", now), Some(Duration::from_secs(2)));
        assert_eq!(parse_retry_after(" 0 ", now), Some(Duration::ZERO));
        assert_eq!(parse_retry_after("soon", now), None);
        assert_eq!(parse_retry_after("", now), None);
    }

    #[test]
    fn test_retry_after_http_date() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 50).unwrap();
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(10))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
    }

    #[test]
    fn test_retry_after_is_capped() {
        let now = Utc::now();
        assert_eq!(policy().retry_after("120", now), Some(Duration::from_millis(3_000)));
    }

    #[test]
    fn test_oversized_retry_after_saturates() {
        let now = Utc::now();
        assert_eq!(parse_retry_after("99999999999999999999", now), Some(Duration::MAX));
        assert_eq!(parse_retry_after("1e300", now), Some(Duration::MAX));
        assert_eq!(parse_retry_after("inf", now), Some(Duration::MAX));
        assert_eq!(parse_retry_after("1.5", now), Some(Duration::from_millis(1_500)));
        assert_eq!(parse_retry_after("-3", now), None);
        assert_eq!(parse_retry_after("NaN", now), None);

        let p = policy();
        assert_eq!(p.retry_after("99999999999999999999", now), Some(p.max));
        assert_eq!(p.retry_after("1e30", now), Some(p.max));
    }
}
