//! HTTP/1.1 request encoding and a blocking one-shot TCP transport.
//!
//! # Overview
//! A caller describes a request as plain data (`Request`), the encoder turns
//! it into exact wire bytes (`EncodedMessage`), and the transport writes those
//! bytes to a peer and returns everything the peer sent back before closing
//! the connection. Responses are not parsed.
//!
//! # Design
//! - `encode` is pure: no I/O, no shared state, all-or-nothing output.
//! - `Host`, `Content-Type` and `Content-Length` are always derived, never
//!   accepted from the caller.
//! - `Transport` drives an explicit `Exchange` state machine over the
//!   `Resolve` / `Connect` collaborators, so the socket layer can be replaced
//!   in tests or by a host with its own networking.
//! - One connection attempt-sequence and one message per send; retries are
//!   left to the caller.

pub mod config;
pub mod encode;
pub mod error;
pub mod http;
pub mod net;
pub mod transport;

pub use config::{TransportConfig, MIN_CONNECT_TIMEOUT};
pub use encode::{
    derive_mandatory_headers, encode, encode_header_line, encode_headers, encode_request_line,
    request_target,
};
pub use error::{EncodeError, Error, TransportError};
pub use http::{Authority, EncodedMessage, Header, HttpUri, Query, Request, Scheme};
pub use net::{Connect, Connection, Resolve, StaticResolver, SystemResolver, TcpConnector};
pub use transport::{Exchange, Transport, TransportState};
