//! Authentication error types.

use thiserror::Error;

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors raised by the CAS front door.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The ticket did not yield an identity. Always answered with a fresh
    /// login challenge; the same ticket is never retried.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(#[from] FailureReason),

    /// The shared session secret is missing or empty.
    #[error("session secret is missing")]
    MissingSecret,

    /// The configured CAS base address cannot be used to build endpoints.
    #[error("invalid CAS address {address}: {reason}")]
    InvalidCasAddress { address: String, reason: String },

    /// Reissue window is not strictly inside the session timeout.
    #[error("reissue threshold ({reissue_secs}s) must be shorter than the session timeout ({timeout_secs}s)")]
    InvalidTimings { reissue_secs: u64, timeout_secs: u64 },

    /// Spent tickets must be remembered for some time, or a replay reaches
    /// CAS again.
    #[error("ticket retention must be greater than zero")]
    ZeroTicketRetention,
}

impl AuthError {
    /// Returns true for per-request failures (as opposed to startup errors).
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed(_))
    }
}

/// Why a ticket validation did not authenticate anyone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// CAS answered `no`.
    #[error("ticket rejected by CAS")]
    Rejected,

    /// The ticket was already presented to this validator.
    #[error("ticket already used")]
    Replayed,

    /// CAS answered with something other than the two-line protocol.
    #[error("malformed validation response: {0}")]
    Malformed(String),

    /// The validation endpoint could not be reached or read.
    #[error("CAS unreachable: {0}")]
    Unreachable(String),
}
