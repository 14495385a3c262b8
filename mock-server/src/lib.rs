//! Test server for exercising the request encoder and transport end to end.
//!
//! `app` is a small axum application: `GET /hello` answers like a plain
//! web server and `/echo` reports what the server parsed out of the request.
//! `run` serves it with HTTP/1 half-close enabled, because the client shuts
//! down its write side right after sending. `stub` holds raw TCP servers that
//! capture the exact request bytes.

pub mod stub;

use axum::{
    body::Bytes,
    http::{header::CONTENT_LENGTH, HeaderMap, Method, Uri},
    routing::{any, get},
    Json, Router,
};
use hyper::server::conn::http1;
use hyper_util::{rt::TokioIo, service::TowerToHyperService};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

pub const HELLO_BODY: &str = "Hello, from the server!\n";

/// The request as seen by the server.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct EchoedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub content_length: Option<u64>,
    pub body: String,
}

impl EchoedRequest {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub fn app() -> Router {
    Router::new()
        .route("/hello", get(hello))
        .route("/echo", any(echo))
        .route("/echo/{*rest}", any(echo))
}

/// Serve `app` on `listener` until accepting fails.
pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    let app = app();
    loop {
        let (stream, peer) = listener.accept().await?;
        let service = TowerToHyperService::new(app.clone());

        tokio::spawn(async move {
            let result = http1::Builder::new()
                .half_close(true)
                .keep_alive(false)
                .serve_connection(TokioIo::new(stream), service)
                .await;
            if let Err(error) = result {
                tracing::debug!(%peer, %error, "connection ended with error");
            }
        });
    }
}

async fn hello(headers: HeaderMap) -> &'static str {
    tracing::info!(content_length = ?content_length(&headers), "GET /hello");
    HELLO_BODY
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Json<EchoedRequest> {
    let echoed = EchoedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect(),
        content_length: content_length(&headers),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    tracing::info!(method = %echoed.method, path = %echoed.path, "echo");
    Json(echoed)
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_parses_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(content_length(&headers), None);
        headers.insert(CONTENT_LENGTH, "13".parse().unwrap());
        assert_eq!(content_length(&headers), Some(13));
    }

    #[test]
    fn echoed_request_header_lookup_ignores_case() {
        let echoed = EchoedRequest {
            method: "GET".to_string(),
            path: "/echo".to_string(),
            query: None,
            headers: vec![("host".to_string(), "localhost".to_string())],
            content_length: None,
            body: String::new(),
        };
        assert_eq!(echoed.header("Host"), Some("localhost"));
        assert_eq!(echoed.header("Accept"), None);
    }

    #[test]
    fn echoed_request_roundtrips_through_json() {
        let echoed = EchoedRequest {
            method: "POST".to_string(),
            path: "/echo/a".to_string(),
            query: Some("q=1".to_string()),
            headers: vec![("content-length".to_string(), "2".to_string())],
            content_length: Some(2),
            body: "hi".to_string(),
        };
        let json = serde_json::to_string(&echoed).unwrap();
        let back: EchoedRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, echoed);
    }
}
