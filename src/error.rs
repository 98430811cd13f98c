use std::time::Duration;

use thiserror::Error;

/// Failure of a single request against the MECHA-LUNG API.
///
/// Every variant maps onto a numeric status via [`ApiError::status`] so the
/// UI can treat failures the same way regardless of where they came from.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    /// An authenticated call was attempted with no stored token. No request was sent.
    #[error("No authentication token found")]
    NoCredential,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// 401/403: the credential was rejected or has expired.
    #[error("{detail}")]
    AuthRejected { status: u16, detail: String },

    /// Any other non-2xx status. `detail` is the server's message, verbatim.
    #[error("{detail}")]
    Rejected { status: u16, detail: String },

    /// A 2xx response whose body did not match the expected contract.
    #[error("Malformed server response: {reason}")]
    Malformed { status: u16, reason: String },

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),

    #[error("Failed to encode request body: {0}")]
    Encode(String),
}

impl ApiError {
    /// Status code in the client's taxonomy. `0` means no response was received.
    pub fn status(&self) -> u16 {
        match self {
            ApiError::NoCredential => 401,
            ApiError::AuthRejected { status, .. }
            | ApiError::Rejected { status, .. }
            | ApiError::Malformed { status, .. } => *status,
            ApiError::Network(_)
            | ApiError::Timeout(_)
            | ApiError::InvalidUrl(_)
            | ApiError::Encode(_) => 0,
        }
    }

    /// True when the failure means the current session can no longer be trusted.
    pub fn invalidates_session(&self) -> bool {
        matches!(self, ApiError::NoCredential | ApiError::AuthRejected { .. })
    }

    /// True for failures where no response arrived and a later attempt may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ApiError::Network(_) | ApiError::Timeout(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MechaLungError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} is already in progress")]
    Busy(String),

    #[error("Cannot {action} while in {mode} mode")]
    InvalidTransition {
        action: &'static str,
        mode: &'static str,
    },

    #[error("Patient {0} is not in the roster")]
    UnknownPatient(i64),

    #[error("Config error: {0}")]
    Config(String),

    /// The session ended while the operation was in flight; its result was dropped.
    #[error("{0} was abandoned because the session ended")]
    SignedOut(&'static str),
}

impl MechaLungError {
    pub fn invalidates_session(&self) -> bool {
        matches!(self, MechaLungError::Api(e) if e.invalidates_session())
    }
}

impl From<MechaLungError> for String {
    fn from(err: MechaLungError) -> Self {
        err.to_string()
    }
}

impl From<ApiError> for String {
    fn from(err: ApiError) -> Self {
        err.to_string()
    }
}
