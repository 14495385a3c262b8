//! HTTP request types described as plain data.
//!
//! # Design
//! These types describe an HTTP/1.1 request structurally. The encoder turns a
//! `Request` into an `EncodedMessage` without touching the network; the
//! transport is the only part of the crate that performs I/O. Values are
//! built once by the caller and consumed once by the encoder.
//!
//! All fields use owned types (`String`, `Vec`) and derive serde so requests
//! can be described in JSON test vectors or host configuration.

use serde::{Deserialize, Serialize};

/// A single header field. Names and values are opaque; several headers may
/// share a name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A query parameter of a URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub key: String,
    pub value: String,
}

impl Query {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Host and optional port. A missing port means the scheme default and is
/// never written out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

impl Authority {
    pub fn new(host: impl Into<String>, port: Option<u16>) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

/// A pre-structured URI. `path` must begin with `/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpUri {
    pub scheme: Scheme,
    pub authority: Authority,
    pub path: String,
    #[serde(default)]
    pub query: Vec<Query>,
}

impl HttpUri {
    pub fn http(host: impl Into<String>, port: Option<u16>, path: impl Into<String>) -> Self {
        Self {
            scheme: Scheme::Http,
            authority: Authority::new(host, port),
            path: path.into(),
            query: Vec::new(),
        }
    }

    /// Port to connect to: the explicit one, else the scheme default.
    pub fn effective_port(&self) -> u16 {
        self.authority
            .port
            .unwrap_or_else(|| self.scheme.default_port())
    }
}

/// An HTTP request described as plain data.
///
/// `headers` holds only the caller's additional headers. `Host`,
/// `Content-Length` and (when `content_type` is set and a body exists)
/// `Content-Type` are derived by the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: String,
    pub protocol_version: String,
    pub uri: HttpUri,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: impl Into<String>, uri: HttpUri) -> Self {
        Self {
            method: method.into(),
            protocol_version: "HTTP/1.1".to_string(),
            uri,
            headers: Vec::new(),
            content_type: None,
            body: None,
        }
    }

    pub fn get(uri: HttpUri) -> Self {
        Self::new("GET", uri)
    }

    pub fn post(uri: HttpUri, content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            body: Some(body.into()),
            ..Self::new("POST", uri)
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(Header::new(name, value));
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.uri.query.push(Query::new(key, value));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// The immutable wire form of a `Request`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedMessage(Vec<u8>);

impl EncodedMessage {
    pub(crate) fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for EncodedMessage {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}
