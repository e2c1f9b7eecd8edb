//! Errors returned by the Messages API client.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnthropicError {
    /// HTTP 429. `retry_after_ms` comes from the `retry-after` header, 1s when absent.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success status, with the response body as message.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// DNS, connect, TLS, or body decoding failure.
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl AnthropicError {
    /// Whether repeating the same request may succeed.
    ///
    /// Server-side failures (5xx, 529 overloaded) and network problems are
    /// transient. Client errors such as a bad key or malformed request are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AnthropicError::RateLimited { .. } | AnthropicError::NetworkError(_) => true,
            AnthropicError::ApiError { status, .. } => *status >= 500 || *status == 408,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = AnthropicError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn transient_classification() {
        assert!(AnthropicError::RateLimited { retry_after_ms: 1 }.is_transient());
        let server = AnthropicError::ApiError {
            status: 529,
            message: "overloaded".into(),
        };
        assert!(server.is_transient());
        let auth = AnthropicError::ApiError {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert!(!auth.is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AnthropicError>();
    }
}
