//! JSON error responses for the HTTP surface.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use dracin_common::Error;
use serde::Serialize;

use super::ACTIVE_PROVIDER_HEADER;

/// An [`Error`] tagged with the provider that produced it.
#[derive(Debug)]
pub struct ProxyError {
    pub error: Error,
    pub provider: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    status: u16,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider: Option<&'a str>,
}

impl ProxyError {
    pub fn new(error: Error, provider: impl Into<String>) -> Self {
        Self {
            error,
            provider: Some(provider.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.error.http_status()).unwrap_or(StatusCode::BAD_GATEWAY)
    }

    fn title(&self) -> &'static str {
        match self.error.root() {
            Error::UpstreamHttp { .. } => "Upstream API error",
            Error::EmptyUpstreamResponse => "Empty response from API",
            Error::QueueOverflow { .. } => "Too many pending upstream requests",
            Error::Timeout { .. } | Error::Network(_) | Error::Decode(_) => "Proxy fetch failed",
            Error::NotFound { .. } => "Not found",
            _ => "Internal error",
        }
    }

    fn detail(&self) -> String {
        match &self.error {
            Error::UpstreamHttp { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}

impl From<Error> for ProxyError {
    fn from(error: Error) -> Self {
        Self {
            error,
            provider: None,
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(provider = ?self.provider, error = %self.error, "Request failed");
        } else {
            tracing::debug!(provider = ?self.provider, error = %self.error, "Request failed");
        }

        let body = ErrorBody {
            error: self.title(),
            status: status.as_u16(),
            detail: self.detail(),
            provider: self.provider.as_deref(),
        };
        let mut response = (status, Json(body)).into_response();

        if let Some(value) = self
            .provider
            .as_deref()
            .and_then(|p| HeaderValue::from_str(p).ok())
        {
            response.headers_mut().insert(ACTIVE_PROVIDER_HEADER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_status_is_relayed() {
        let err = ProxyError::new(Error::upstream(404, "no such book"), "api_primary");
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.title(), "Upstream API error");
        assert_eq!(err.detail(), "no such book");
    }

    #[test]
    fn test_exhausted_keeps_last_status() {
        let err = ProxyError::from(Error::Exhausted {
            attempts: 4,
            last: Box::new(Error::upstream(503, "busy")),
        });
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.title(), "Upstream API error");
        assert!(err.detail().contains("4 attempts"));
    }

    #[test]
    fn test_empty_body_is_bad_gateway() {
        let err = ProxyError::from(Error::EmptyUpstreamResponse);
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_response_carries_provider_header() {
        let response = ProxyError::new(Error::Network("refused".into()), "api_backup1").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[ACTIVE_PROVIDER_HEADER], "api_backup1");
    }
}
