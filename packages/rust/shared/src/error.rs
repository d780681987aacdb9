//! Error types for invoicematch.
//!
//! Library crates use [`InvoiceMatchError`] via `thiserror`.
//! The CLI app wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;
use std::time::Duration;

/// Top-level error type for all invoicematch operations.
#[derive(Debug, thiserror::Error)]
pub enum InvoiceMatchError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Remote service failure: non-2xx status or transport error from the
    /// document service or the assistant API.
    #[error("service error from {service}: {message}")]
    Service { service: &'static str, message: String },

    /// A polling loop exhausted its deadline without reaching a terminal state.
    #[error("timed out waiting for {waiting_for} after {attempts} attempts ({elapsed:?})")]
    Timeout {
        waiting_for: &'static str,
        attempts: u32,
        elapsed: Duration,
    },

    /// JSON parse failure or a missing expected field in a response payload.
    #[error("format error: {message}")]
    Format { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad arguments, empty results, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, InvoiceMatchError>;

impl InvoiceMatchError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a service error tagged with the originating service.
    pub fn service(service: &'static str, msg: impl Into<String>) -> Self {
        Self::Service {
            service,
            message: msg.into(),
        }
    }

    /// Create a format error from any displayable message.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = InvoiceMatchError::config("missing assistant id");
        assert_eq!(err.to_string(), "config error: missing assistant id");

        let err = InvoiceMatchError::service("document", "HTTP 502 Bad Gateway");
        assert!(err.to_string().contains("document"));
        assert!(err.to_string().contains("502"));
    }

    #[test]
    fn timeout_display_names_the_wait() {
        let err = InvoiceMatchError::Timeout {
            waiting_for: "assistant reply",
            attempts: 12,
            elapsed: Duration::from_secs(60),
        };
        let text = err.to_string();
        assert!(text.contains("assistant reply"));
        assert!(text.contains("12 attempts"));
    }
}
