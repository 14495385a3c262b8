//! Network collaborators used by the transport.
//!
//! The transport never touches the platform directly: name resolution and
//! stream sockets are reached through `Resolve` and `Connect`, with
//! `SystemResolver` and `TcpConnector` as the standard-library backed
//! defaults. Closing a connection is dropping it.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Maps a host/port pair to connectable addresses, in preference order.
pub trait Resolve {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Opens stream connections.
pub trait Connect {
    type Connection: Connection;

    fn connect(&self, addr: &SocketAddr, timeout: Duration) -> io::Result<Self::Connection>;
}

/// An open, bidirectional byte stream.
pub trait Connection: Read + Write {
    /// Half-close: signal end of request while keeping the read side open.
    fn shutdown_write(&mut self) -> io::Result<()>;

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;
}

/// Platform resolver via `ToSocketAddrs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        Ok((host, port).to_socket_addrs()?.collect())
    }
}

/// TCP connector over `std::net::TcpStream`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connect for TcpConnector {
    type Connection = TcpStream;

    fn connect(&self, addr: &SocketAddr, timeout: Duration) -> io::Result<TcpStream> {
        TcpStream::connect_timeout(addr, timeout)
    }
}

impl Connection for TcpStream {
    fn shutdown_write(&mut self) -> io::Result<()> {
        self.shutdown(Shutdown::Write)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

/// Resolver returning a fixed list of addresses, regardless of the host.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    addrs: Vec<SocketAddr>,
}

impl StaticResolver {
    pub fn new(addrs: Vec<SocketAddr>) -> Self {
        Self { addrs }
    }
}

impl Resolve for StaticResolver {
    fn resolve(&self, _host: &str, _port: u16) -> io::Result<Vec<SocketAddr>> {
        Ok(self.addrs.clone())
    }
}
