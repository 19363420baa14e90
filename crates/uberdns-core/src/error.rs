//! Error types for the UberDNS API core
//!
//! Every failure a request can hit is one of these variants. Store and bus
//! failures are request-scoped: they turn into a 5xx for the offending request
//! and never take the process down.

use http::StatusCode;
use thiserror::Error;

/// Result type alias for UberDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the UberDNS API
#[derive(Error, Debug)]
pub enum Error {
    /// Requested domain, record or user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Malformed, expired or unsigned token, or unknown API key
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// Login failed (unknown user or wrong password)
    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    /// Authenticated (or anonymous) caller is not allowed to do this
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Entity already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Request body is unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Relational store unreachable or query failed
    #[error("Store error: {0}")]
    Store(String),

    /// Pub/sub bus unreachable or publish failed
    #[error("Bus error: {0}")]
    Bus(String),

    /// Operation exceeded its deadline
    #[error("Timed out: {0}")]
    Timeout(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an invalid credential error
    pub fn invalid_credential(msg: impl Into<String>) -> Self {
        Self::InvalidCredential(msg.into())
    }

    /// Create an authentication error
    pub fn unauthenticated(msg: impl Into<String>) -> Self {
        Self::Unauthenticated(msg.into())
    }

    /// Create a forbidden error
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a bus error
    pub fn bus(msg: impl Into<String>) -> Self {
        Self::Bus(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// HTTP status code for this error
    ///
    /// An invalid credential on a protected route is indistinguishable from no
    /// credential at all, so it maps to 403 like `Forbidden`. Only a failed
    /// login (`Unauthenticated`) answers 401.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidCredential(_) | Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::Store(_)
            | Error::Bus(_)
            | Error::Timeout(_)
            | Error::Json(_)
            | Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Body text safe to return to the caller
    ///
    /// Never includes the inner message: lookups, ids and driver errors stay
    /// in the logs.
    pub fn public_message(&self) -> &'static str {
        match self.status_code() {
            StatusCode::NOT_FOUND => "404 - Not Found",
            StatusCode::FORBIDDEN => "403 - Forbidden",
            StatusCode::UNAUTHORIZED => "401 - Unauthorized",
            StatusCode::CONFLICT => "409 - Conflict",
            StatusCode::BAD_REQUEST => "400 - Bad Request",
            _ => "500 - Internal Server Error",
        }
    }

    /// Whether this error is the server's fault rather than the caller's
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Store(err.to_string())
    }
}
