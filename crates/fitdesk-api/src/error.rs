//! API Error Types

use fitdesk_checkout::CheckoutError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors talking to the FitDesk backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// Transport failure or timeout
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend answered with a non-2xx status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Checkout precondition or payment rejection
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
}

impl ApiError {
    /// Check if this error is retryable
    ///
    /// Only transport failures and 5xx answers. A rejected payment needs the
    /// member to resubmit.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Network(_) => {
                "Could not reach FitDesk. Check your connection and try again.".into()
            }
            Self::Http { message, .. } if !message.is_empty() => message.clone(),
            Self::Checkout(e) => e.user_message(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ApiError::Http { status: 503, message: String::new() }.is_retryable());
        assert!(!ApiError::Http { status: 400, message: String::new() }.is_retryable());
        assert!(!ApiError::from(CheckoutError::MissingToken).is_retryable());
    }

    #[test]
    fn test_backend_message_is_surfaced() {
        let err = ApiError::Http {
            status: 422,
            message: "Plan no longer available".into(),
        };
        assert_eq!(err.user_message(), "Plan no longer available");
    }
}
