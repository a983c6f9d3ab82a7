//! Error types for the proxy.
//!
//! Every failure reachable from a role action surfaces as a [`ProxyError`].
//! The binary maps each one to a message on stderr and exit status 1.

use crate::apdu::StatusWord;
use thiserror::Error;

/// Coarse classification used by callers that only care about the failure class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Usage,
    Connect,
    Protocol,
    Validation,
    Io,
}

#[derive(Error, Debug)]
pub enum ProxyError {
    // Invocation errors
    #[error("Unknown parameters: {0}")]
    Usage(String),

    // Card errors
    #[error("{0}")]
    Connect(String),

    #[error("{operation}: {status}")]
    Protocol {
        operation: String,
        status: StatusWord,
    },

    /// A tolerated business status word the role turned into a failure.
    #[error("{reason}")]
    Refused {
        operation: String,
        status: StatusWord,
        reason: &'static str,
    },

    // Share errors
    #[error("{0}")]
    Validation(String),

    #[error("Wrong '{0}' file format.")]
    RecordFormat(&'static str),

    // Storage errors
    #[error("Record '{file}' is missing. {hint}")]
    MissingRecord { file: &'static str, hint: &'static str },

    #[error("Cannot access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl ProxyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Usage(_) => ErrorKind::Usage,
            Self::Connect(_) => ErrorKind::Connect,
            Self::Protocol { .. } | Self::Refused { .. } => ErrorKind::Protocol,
            Self::Validation(_) | Self::RecordFormat(_) => ErrorKind::Validation,
            Self::MissingRecord { .. } | Self::Io { .. } => ErrorKind::Io,
        }
    }

    /// Status word carried by card-side failures.
    pub fn status(&self) -> Option<StatusWord> {
        match self {
            Self::Protocol { status, .. } | Self::Refused { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_message_carries_status() {
        let err = ProxyError::Protocol {
            operation: "Set N1".to_string(),
            status: StatusWord(0x6A80),
        };
        assert_eq!(err.to_string(), "Set N1: 6A80");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.status(), Some(StatusWord(0x6A80)));
    }

    #[test]
    fn test_refused_error_shows_reason_only() {
        let err = ProxyError::Refused {
            operation: "Keygen".to_string(),
            status: StatusWord::COMMAND_NOT_ALLOWED,
            reason: "Keys have already been set. Please, reset the card first.",
        };
        assert_eq!(
            err.to_string(),
            "Keys have already been set. Please, reset the card first."
        );
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(ProxyError::Usage("x".into()).kind(), ErrorKind::Usage);
        assert_eq!(ProxyError::Connect("x".into()).kind(), ErrorKind::Connect);
        assert_eq!(
            ProxyError::RecordFormat("message.txt").kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ProxyError::MissingRecord {
                file: "client.sig",
                hint: ""
            }
            .kind(),
            ErrorKind::Io
        );
        assert!(ProxyError::validation("too big").status().is_none());
    }
}
