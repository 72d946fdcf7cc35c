//! Remote call error taxonomy.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Failure of one remote file API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// 401/403: credential rejected. Never retried.
    Auth { status: u16 },
    /// Any other non-2xx response.
    Status { status: u16, message: String },
    /// Connection, DNS, TLS or timeout failure before a response arrived.
    Transport(String),
    /// Response arrived but its body could not be decoded.
    Decode(String),
    /// Request could not be built (metadata or body encoding).
    Encode(String),
}

impl RemoteError {
    /// Maps an HTTP status code to the matching error variant.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            401 | 403 => Self::Auth { status },
            _ => Self::Status {
                status,
                message: message.into(),
            },
        }
    }

    /// Default retry predicate.
    ///
    /// Auth failures and local encode/decode failures are terminal; server
    /// errors, other non-2xx statuses and transport failures are retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Auth { .. } | Self::Decode(_) | Self::Encode(_) => false,
            Self::Status { .. } | Self::Transport(_) => true,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth { .. })
    }

    /// HTTP status when the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status } | Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auth { status } => write!(f, "auth error: {status}"),
            Self::Status { status, message } if message.is_empty() => {
                write!(f, "request failed: {status}")
            }
            Self::Status { status, message } => write!(f, "request failed: {status}: {message}"),
            Self::Transport(message) => write!(f, "transport error: {message}"),
            Self::Decode(message) => write!(f, "invalid response body: {message}"),
            Self::Encode(message) => write!(f, "invalid request body: {message}"),
        }
    }
}

impl Error for RemoteError {}
