//! Error types for the WG-Gesucht client.

use thiserror::Error;

/// Result type for WG-Gesucht client operations.
pub type Result<T> = std::result::Result<T, WgError>;

/// WG-Gesucht client errors.
#[derive(Debug, Error)]
pub enum WgError {
    /// Operation requires a session but the client is not logged in
    #[error("not logged in")]
    NotLoggedIn,

    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// API error (non-2xx response)
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape
    #[error("parse error: {0}")]
    Parse(String),

    /// Offer id that cannot be sent as a numeric ad id
    #[error("invalid offer id: {0}")]
    InvalidOfferId(String),
}

impl WgError {
    /// True when the API rejected our tokens (expired or revoked session).
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, WgError::Api { status: 401, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_unauthorized() {
        let unauthorized = WgError::Api {
            status: 401,
            message: "token expired".into(),
        };
        assert!(unauthorized.is_unauthorized());

        let forbidden = WgError::Api {
            status: 403,
            message: "nope".into(),
        };
        assert!(!forbidden.is_unauthorized());
        assert!(!WgError::NotLoggedIn.is_unauthorized());
    }
}
