//! Inbound request limiting for the `/api` surface.

use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use governor::{
    clock::{Clock, DefaultClock},
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};

pub type InboundLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// A process-wide limiter, or `None` when `per_minute` is zero.
pub fn inbound_limiter(per_minute: u32) -> Option<Arc<InboundLimiter>> {
    let quota = Quota::per_minute(NonZeroU32::new(per_minute)?);
    Some(Arc::new(RateLimiter::direct(quota)))
}

pub async fn limit_requests(
    State(limiter): State<Arc<InboundLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    match limiter.check() {
        Ok(()) => next.run(request).await,
        Err(not_until) => {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            let retry_after = wait.as_secs_f64().ceil().max(1.0) as u64;
            tracing::debug!(retry_after, "Inbound rate limit hit");

            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "Too many requests",
                    "status": 429,
                    "detail": format!("Retry in {}s", retry_after),
                })),
            )
                .into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_disables_limiter() {
        assert!(inbound_limiter(0).is_none());
    }

    #[test]
    fn test_burst_is_one_minute_of_quota() {
        let limiter = inbound_limiter(3).unwrap();
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_ok());
        assert!(limiter.check().is_err());
    }
}
