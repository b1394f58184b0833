//! Error types for Keygate

use hyper::StatusCode;

/// Main error type for Keygate operations.
///
/// Verification-stage errors carry the exact client-visible messages; the
/// request-processing stage maps every one of them to 401 Unauthorized so a
/// caller cannot distinguish a malformed header from a forged signature.
#[derive(Debug, thiserror::Error)]
pub enum KeygateError {
    #[error("{0} is required on headers")]
    MissingHeader(&'static str),

    #[error("{0} not to be empty")]
    EmptyHeader(&'static str),

    #[error("X-Signature must be base64 format")]
    MalformedSignature,

    #[error("X-Timestamp must be date format")]
    MalformedTimestamp,

    #[error("X-Signature invalid")]
    SignatureNotFound,

    #[error("X-Signature invalid")]
    SlotNotFound,

    #[error("X-Signature invalid | X-Timestamp expired")]
    TimestampExpired,

    #[error("X-Signature not verified")]
    SignatureMismatch,

    #[error("Session expired")]
    SessionExpired,

    #[error("Credential not verified")]
    CredentialVerification,

    #[error("Invalid signature")]
    TokenInvalid,

    #[error("Cache operation timed out")]
    CacheTimeout,

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KeygateError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingHeader(_)
            | Self::EmptyHeader(_)
            | Self::MalformedSignature
            | Self::MalformedTimestamp
            | Self::SignatureNotFound
            | Self::SlotNotFound
            | Self::TimestampExpired
            | Self::SignatureMismatch
            | Self::SessionExpired
            | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::CredentialVerification => StatusCode::INTERNAL_SERVER_ERROR,
            Self::CacheTimeout | Self::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Crypto(_) | Self::Internal(_) | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<serde_json::Error> for KeygateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON error: {}", err))
    }
}

/// Result type alias for Keygate operations
pub type Result<T> = std::result::Result<T, KeygateError>;
