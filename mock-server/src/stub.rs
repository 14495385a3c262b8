//! Raw TCP stub servers.
//!
//! Both stubs accept a single connection and read the request until the
//! client half-closes, returning the captured bytes so tests can compare the
//! exact wire form.

use std::io;
use std::time::Duration;

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpListener,
};

/// Accept one connection, capture the request, write `reply` and close.
pub async fn serve_once(listener: TcpListener, reply: Vec<u8>) -> io::Result<Vec<u8>> {
    let (mut stream, peer) = listener.accept().await?;

    let mut request = Vec::new();
    stream.read_to_end(&mut request).await?;
    tracing::debug!(%peer, length = request.len(), "stub captured request");

    stream.write_all(&reply).await?;
    stream.shutdown().await?;
    Ok(request)
}

/// Accept one connection, capture the request, then keep the connection
/// open without replying for `hold`.
pub async fn stall(listener: TcpListener, hold: Duration) -> io::Result<Vec<u8>> {
    let (mut stream, peer) = listener.accept().await?;

    let mut request = Vec::new();
    stream.read_to_end(&mut request).await?;
    tracing::debug!(%peer, length = request.len(), ?hold, "stub stalling");

    tokio::time::sleep(hold).await;
    Ok(request)
}
