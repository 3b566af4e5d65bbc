//! Gateway error types.
//!
//! Authentication failures are classified for logging only; the wire reply is
//! always the bare `{"status": false}` regardless of variant.

/// Why a credential was not accepted.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    /// The credential failed the local shape check and never left the
    /// process.
    #[error("credential is not plain alphanumeric")]
    MalformedCredential,

    /// The validator answered with a non-success status.
    #[error("credential rejected by validator")]
    Rejected,

    /// The validator did not answer within the configured deadline.
    #[error("validator timed out")]
    Timeout,

    /// The validator could not be reached.
    #[error("validator transport failure: {0}")]
    Transport(String),

    /// The validator answered with something other than a user object.
    #[error("validator response malformed: {0}")]
    MalformedResponse(String),
}

/// Gateway-level errors (startup and internal use).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Server socket bind error
    #[error("server bind error: {0}")]
    Bind(String),

    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}
