//! Error types for encoding and sending requests.
//!
//! # Design
//! Encoding errors are always raised before any network activity, so a
//! malformed request never opens a socket. Transport errors carry the state
//! the exchange was in when it failed. No error is retried by this crate.

use std::net::SocketAddr;
use std::time::Duration;

use crate::transport::TransportState;

/// Errors raised while turning a `Request` into bytes.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("request path is empty")]
    EmptyPath,

    #[error("request method is empty")]
    EmptyMethod,

    #[error("protocol version is empty")]
    EmptyVersion,

    #[error("authority host is empty")]
    EmptyHost,

    /// The path does not start with `/`.
    #[error("request path {0:?} does not start with '/'")]
    InvalidPath(String),

    /// A request-line component contains a byte outside visible ASCII
    /// (`0x21..=0x7E`): SP, HTAB, CR, LF, other controls, DEL or non-ASCII.
    #[error("{component} contains a byte outside visible ASCII")]
    InvalidRequestLine { component: &'static str },

    /// A header name or value contains CR or LF, or the name is empty.
    #[error("header {name:?} contains an invalid character")]
    InvalidHeaderCharacter { name: String },

    /// The caller supplied a header the encoder derives itself.
    #[error("header {name:?} is derived by the encoder and may not be supplied")]
    DuplicateReservedHeader { name: String },

    #[error("authority {0:?} contains userinfo")]
    UserInfoInAuthority(String),

    /// The host holds a port, path, query, fragment or whitespace. IPv6
    /// literals, bare or bracketed, are accepted.
    #[error("host {0:?} is not a valid authority host")]
    InvalidHost(String),
}

/// Errors raised while exchanging bytes with the peer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("scheme {0:?} is not supported by this transport")]
    UnsupportedScheme(&'static str),

    #[error("failed to resolve {host}:{port}")]
    Resolution {
        host: String,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Every candidate address refused or timed out.
    #[error("could not connect to {host}:{port} ({} address(es) tried)", .attempts.len())]
    Connection {
        host: String,
        port: u16,
        attempts: Vec<(SocketAddr, std::io::Error)>,
    },

    #[error("failed to transmit request")]
    Transmit(#[source] std::io::Error),

    #[error("no end of response after {0:?}")]
    ReceiveTimeout(Duration),

    #[error("response exceeds {limit} bytes")]
    ResponseTooLarge { limit: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Top-level error returned by `Transport`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("exchange failed while {state}")]
    Transport {
        state: TransportState,
        #[source]
        source: TransportError,
    },
}

impl Error {
    pub fn is_encode(&self) -> bool {
        matches!(self, Self::Encode(..))
    }

    pub fn as_encode(&self) -> Option<&EncodeError> {
        if let Self::Encode(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    pub fn as_transport(&self) -> Option<&TransportError> {
        if let Self::Transport { source, .. } = self {
            Some(source)
        } else {
            None
        }
    }

    /// State the exchange was in when it failed. `None` for encoding errors.
    pub fn failed_state(&self) -> Option<TransportState> {
        if let Self::Transport { state, .. } = self {
            Some(*state)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn transport_error_message_leaves_cause_to_source() {
        let err = Error::Transport {
            state: TransportState::Receiving,
            source: TransportError::ResponseTooLarge { limit: 10 },
        };
        let message = err.to_string();
        assert_eq!(message, "exchange failed while receiving");

        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("10"), "{cause}");
        assert!(!message.contains(&cause));
    }

    #[test]
    fn encode_error_is_transparent() {
        let err = Error::from(EncodeError::EmptyPath);
        assert_eq!(err.to_string(), EncodeError::EmptyPath.to_string());
        assert!(err.is_encode());
        assert_eq!(err.failed_state(), None);
    }
}
