//! Blocking transport for a single request/response exchange.
//!
//! # Design
//! An exchange is an explicit state machine:
//!
//! ```text
//! Idle -> Resolving -> Connecting -> Sending -> Receiving -> Closed
//!                     (any non-terminal state) -> Failed
//! ```
//!
//! `Exchange::step` performs the work of the current state and moves to the
//! next, so each blocking point (resolve, connect, write, read) is a separate
//! call that a cooperative or threaded host can schedule. `Exchange::run`
//! steps to completion. The connection is owned by the exchange and dropped
//! as soon as it finishes or fails, so no path leaks a socket. Responses are
//! returned unparsed.

use std::fmt;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::time::Instant;

use crate::config::TransportConfig;
use crate::encode::encode;
use crate::error::{Error, TransportError};
use crate::http::{EncodedMessage, Request, Scheme};
use crate::net::{Connect, Connection, Resolve, SystemResolver, TcpConnector};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Resolving,
    Connecting,
    Sending,
    Receiving,
    Closed,
    Failed,
}

impl TransportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Sending => "sending",
            Self::Receiving => "receiving",
            Self::Closed => "closed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sends encoded requests and collects raw responses.
///
/// Holds no per-exchange state; every `send*` call is independent.
#[derive(Debug, Clone)]
pub struct Transport<R = SystemResolver, C = TcpConnector> {
    config: TransportConfig,
    resolver: R,
    connector: C,
}

impl Transport {
    pub fn new(config: TransportConfig) -> Self {
        Self::with_collaborators(config, SystemResolver, TcpConnector)
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(TransportConfig::default())
    }
}

impl<R: Resolve, C: Connect> Transport<R, C> {
    pub fn with_collaborators(config: TransportConfig, resolver: R, connector: C) -> Self {
        Self {
            config,
            resolver,
            connector,
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Encode `request` and send it to the host and port of its URI.
    ///
    /// Only `http` is accepted; `https` fails before any network activity.
    pub fn send(&self, request: &Request) -> Result<Vec<u8>, Error> {
        let message = encode(request)?;

        if request.uri.scheme != Scheme::Http {
            return Err(Error::Transport {
                state: TransportState::Idle,
                source: TransportError::UnsupportedScheme(request.uri.scheme.as_str()),
            });
        }

        let port = request.uri.effective_port();
        self.send_encoded(&message, &request.uri.authority.host, port)
    }

    /// Encode `request` and send it to an explicit host and port.
    pub fn send_to(&self, request: &Request, host: &str, port: u16) -> Result<Vec<u8>, Error> {
        let message = encode(request)?;
        self.send_encoded(&message, host, port)
    }

    pub fn send_encoded(&self, message: &EncodedMessage, host: &str, port: u16) -> Result<Vec<u8>, Error> {
        self.exchange(message, host, port).run()
    }

    /// Start a stepwise exchange of `message` with `host:port`.
    pub fn exchange<'a>(&'a self, message: &'a EncodedMessage, host: &str, port: u16) -> Exchange<'a, R, C> {
        Exchange {
            transport: self,
            message,
            host: host.to_string(),
            port,
            state: TransportState::Idle,
            candidates: Vec::new(),
            connection: None,
            response: Vec::new(),
        }
    }
}

/// One request/response exchange in progress.
pub struct Exchange<'a, R, C: Connect> {
    transport: &'a Transport<R, C>,
    message: &'a EncodedMessage,
    host: String,
    port: u16,
    state: TransportState,
    candidates: Vec<SocketAddr>,
    connection: Option<C::Connection>,
    response: Vec<u8>,
}

impl<R: Resolve, C: Connect> Exchange<'_, R, C> {
    pub fn state(&self) -> TransportState {
        self.state
    }

    /// Perform the current state's work and advance.
    ///
    /// Returns the new state. On error the exchange is `Failed`, the
    /// connection is closed and the error names the state that failed.
    /// Stepping a terminal exchange is a no-op.
    pub fn step(&mut self) -> Result<TransportState, Error> {
        let result = match self.state {
            TransportState::Idle => Ok(TransportState::Resolving),
            TransportState::Resolving => self.resolve().map(|_| TransportState::Connecting),
            TransportState::Connecting => self.connect().map(|_| TransportState::Sending),
            TransportState::Sending => self.transmit().map(|_| TransportState::Receiving),
            TransportState::Receiving => self.receive().map(|_| TransportState::Closed),
            TransportState::Closed | TransportState::Failed => return Ok(self.state),
        };

        match result {
            Ok(next) => {
                tracing::debug!(from = %self.state, to = %next, host = %self.host, port = self.port, "exchange");
                if next == TransportState::Closed {
                    self.connection = None;
                }
                self.state = next;
                Ok(next)
            }
            Err(source) => {
                let state = self.state;
                self.connection = None;
                self.response = Vec::new();
                self.state = TransportState::Failed;
                tracing::warn!(%state, host = %self.host, port = self.port, error = %source, "exchange failed");
                Err(Error::Transport { state, source })
            }
        }
    }

    /// Step until the exchange closes and return the raw response.
    pub fn run(mut self) -> Result<Vec<u8>, Error> {
        loop {
            match self.step()? {
                TransportState::Closed => return Ok(std::mem::take(&mut self.response)),
                TransportState::Failed => {
                    return Err(Error::Transport {
                        state: TransportState::Failed,
                        source: TransportError::Io(io::Error::other("exchange already failed")),
                    })
                }
                _ => {}
            }
        }
    }

    fn resolve(&mut self) -> Result<(), TransportError> {
        let resolution_error = |source: io::Error| TransportError::Resolution {
            host: self.host.clone(),
            port: self.port,
            source,
        };

        let candidates = self
            .transport
            .resolver
            .resolve(&self.host, self.port)
            .map_err(&resolution_error)?;
        if candidates.is_empty() {
            return Err(resolution_error(io::Error::new(
                ErrorKind::NotFound,
                "resolver returned no addresses",
            )));
        }

        tracing::debug!(host = %self.host, count = candidates.len(), "resolved");
        self.candidates = candidates;
        Ok(())
    }

    fn connect(&mut self) -> Result<(), TransportError> {
        let timeout = self.transport.config.effective_connect_timeout();
        let mut attempts = Vec::new();

        for addr in &self.candidates {
            match self.transport.connector.connect(addr, timeout) {
                Ok(connection) => {
                    tracing::debug!(%addr, "connected");
                    self.connection = Some(connection);
                    return Ok(());
                }
                Err(error) => {
                    tracing::debug!(%addr, %error, "connect attempt failed");
                    attempts.push((*addr, error));
                }
            }
        }

        Err(TransportError::Connection {
            host: self.host.clone(),
            port: self.port,
            attempts,
        })
    }

    fn transmit(&mut self) -> Result<(), TransportError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(not_connected());
        };

        let mut remaining = self.message.as_bytes();
        while !remaining.is_empty() {
            match connection.write(remaining) {
                Ok(0) => return Err(TransportError::Transmit(ErrorKind::WriteZero.into())),
                Ok(written) => {
                    remaining = &remaining[written..];
                    tracing::trace!(written, remaining = remaining.len(), "write");
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) => return Err(TransportError::Transmit(error)),
            }
        }

        connection.flush().map_err(TransportError::Transmit)?;
        connection.shutdown_write().map_err(TransportError::Transmit)?;
        Ok(())
    }

    fn receive(&mut self) -> Result<(), TransportError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(not_connected());
        };
        let config = &self.transport.config;
        let deadline = config
            .receive_timeout
            .map(|timeout| (timeout, Instant::now() + timeout));
        let mut buf = vec![0u8; config.read_buffer_size.max(1)];

        loop {
            if let Some((timeout, deadline)) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(TransportError::ReceiveTimeout(timeout));
                }
                connection.set_read_timeout(Some(remaining))?;
            }

            match connection.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    if self.response.len() + read > config.max_response_size {
                        return Err(TransportError::ResponseTooLarge {
                            limit: config.max_response_size,
                        });
                    }
                    self.response.extend_from_slice(&buf[..read]);
                    tracing::trace!(read, total = self.response.len(), "read");
                }
                Err(error) if error.kind() == ErrorKind::Interrupted => {}
                Err(error) if matches!(error.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return match deadline {
                        Some((timeout, _)) => Err(TransportError::ReceiveTimeout(timeout)),
                        None => Err(TransportError::Io(error)),
                    };
                }
                Err(error) => return Err(TransportError::Io(error)),
            }
        }

        tracing::debug!(length = self.response.len(), "peer closed connection");
        Ok(())
    }
}

fn not_connected() -> TransportError {
    TransportError::Io(ErrorKind::NotConnected.into())
}
