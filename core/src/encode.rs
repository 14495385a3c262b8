//! Serialization of `Request` values into HTTP/1.1 wire bytes.
//!
//! # Design
//! The encoder is a pure function of its input: it validates the whole
//! request first and only then appends into a growable buffer, so a rejected
//! request never yields partial output. Framing follows RFC 7230 §3:
//!
//! ```text
//! request-line CRLF *(header-field CRLF) CRLF [message-body]
//! ```
//!
//! `Host`, `Content-Type` and `Content-Length` are derived from the request
//! and always precede the caller's headers. Caller headers keep their order,
//! and repeated names are written as separate lines.

use std::net::Ipv6Addr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::EncodeError;
use crate::http::{EncodedMessage, Header, HttpUri, Request};

const CRLF: &[u8] = b"\r\n";

/// Everything but RFC 3986 unreserved characters.
const QUERY_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

const HOST: &str = "Host";
const CONTENT_TYPE: &str = "Content-Type";
const CONTENT_LENGTH: &str = "Content-Length";

/// Encode a complete request.
pub fn encode(request: &Request) -> Result<EncodedMessage, EncodeError> {
    if request.uri.path.is_empty() {
        return Err(EncodeError::EmptyPath);
    }
    let target = request_target(&request.uri);
    validate_request_line(&request.method, &target, &request.protocol_version)?;
    validate_authority(&request.uri)?;

    let mandatory = derive_mandatory_headers(request);
    check_reserved(request)?;
    for header in mandatory.iter().chain(&request.headers) {
        validate_header(&header.name, &header.value)?;
    }

    let mut buf = Vec::new();
    push_request_line(&mut buf, &request.method, &target, &request.protocol_version);
    for header in mandatory.iter().chain(&request.headers) {
        push_header_line(&mut buf, &header.name, &header.value);
    }
    buf.extend_from_slice(CRLF);
    if let Some(body) = &request.body {
        buf.extend_from_slice(body);
    }

    tracing::trace!(
        method = %request.method,
        target = %target,
        length = buf.len(),
        "encoded request"
    );
    Ok(EncodedMessage::new(buf))
}

/// `"<method> <target> <version>\r\n"`.
pub fn encode_request_line(method: &str, target: &str, version: &str) -> Result<Vec<u8>, EncodeError> {
    validate_request_line(method, target, version)?;
    let mut buf = Vec::new();
    push_request_line(&mut buf, method, target, version);
    Ok(buf)
}

/// `"<name>: <value>\r\n"`. No folding or escaping is applied.
pub fn encode_header_line(name: &str, value: &str) -> Result<Vec<u8>, EncodeError> {
    validate_header(name, value)?;
    let mut buf = Vec::new();
    push_header_line(&mut buf, name, value);
    Ok(buf)
}

/// Header lines for `headers`, in order.
pub fn encode_headers<'a, I>(headers: I) -> Result<Vec<u8>, EncodeError>
where
    I: IntoIterator<Item = &'a Header>,
{
    headers.into_iter().try_fold(Vec::new(), |mut buf, header| {
        validate_header(&header.name, &header.value)?;
        push_header_line(&mut buf, &header.name, &header.value);
        Ok(buf)
    })
}

/// Headers the encoder synthesizes, in the order `Host`, `Content-Type`,
/// `Content-Length`.
pub fn derive_mandatory_headers(request: &Request) -> Vec<Header> {
    let mut headers = vec![Header::new(HOST, host_value(&request.uri))];

    if let Some(body) = &request.body {
        if let Some(content_type) = &request.content_type {
            headers.push(Header::new(CONTENT_TYPE, content_type.as_str()));
        }
        headers.push(Header::new(CONTENT_LENGTH, body.len().to_string()));
    }

    headers
}

/// Path plus the percent-encoded query, e.g. `/search?q=a%20b&page=2`.
pub fn request_target(uri: &HttpUri) -> String {
    let mut target = uri.path.clone();
    let mut separator = if target.contains('?') { '&' } else { '?' };

    for query in &uri.query {
        target.push(separator);
        target.extend(utf8_percent_encode(&query.key, QUERY_COMPONENT));
        target.push('=');
        target.extend(utf8_percent_encode(&query.value, QUERY_COMPONENT));
        separator = '&';
    }

    target
}

fn host_value(uri: &HttpUri) -> String {
    let host = &uri.authority.host;
    let mut value = if host.parse::<Ipv6Addr>().is_ok() {
        format!("[{host}]")
    } else {
        host.clone()
    };

    match uri.authority.port {
        Some(port) if port != uri.scheme.default_port() => {
            value.push(':');
            value.push_str(&port.to_string());
        }
        _ => {}
    }

    value
}

fn validate_request_line(method: &str, target: &str, version: &str) -> Result<(), EncodeError> {
    if method.is_empty() {
        return Err(EncodeError::EmptyMethod);
    }
    if target.is_empty() {
        return Err(EncodeError::EmptyPath);
    }
    if version.is_empty() {
        return Err(EncodeError::EmptyVersion);
    }

    for (component, text) in [("method", method), ("path", target), ("version", version)] {
        if text.bytes().any(|b| !b.is_ascii_graphic()) {
            return Err(EncodeError::InvalidRequestLine { component });
        }
    }

    if !target.starts_with('/') {
        return Err(EncodeError::InvalidPath(target.to_string()));
    }

    Ok(())
}

fn validate_authority(uri: &HttpUri) -> Result<(), EncodeError> {
    let host = &uri.authority.host;
    if host.is_empty() {
        return Err(EncodeError::EmptyHost);
    }
    if host.contains('@') {
        return Err(EncodeError::UserInfoInAuthority(host.clone()));
    }
    if host.parse::<Ipv6Addr>().is_ok() || is_bracketed_ipv6(host) {
        return Ok(());
    }
    let invalid = host
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ':' | '/' | '?' | '#' | '[' | ']'));
    if invalid {
        return Err(EncodeError::InvalidHost(host.clone()));
    }
    Ok(())
}

fn is_bracketed_ipv6(host: &str) -> bool {
    host.strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .is_some_and(|h| h.parse::<Ipv6Addr>().is_ok())
}

fn validate_header(name: &str, value: &str) -> Result<(), EncodeError> {
    let bad_name = name.is_empty() || name.bytes().any(|b| matches!(b, b'\r' | b'\n' | b':'));
    let bad_value = value.bytes().any(|b| matches!(b, b'\r' | b'\n'));

    if bad_name || bad_value {
        return Err(EncodeError::InvalidHeaderCharacter {
            name: name.to_string(),
        });
    }
    Ok(())
}

/// Reject caller headers that would duplicate a derived one.
fn check_reserved(request: &Request) -> Result<(), EncodeError> {
    let derives_content_type = request.body.is_some() && request.content_type.is_some();

    for header in &request.headers {
        let name = header.name.as_str();
        let reserved = name.eq_ignore_ascii_case(HOST)
            || name.eq_ignore_ascii_case(CONTENT_LENGTH)
            || (derives_content_type && name.eq_ignore_ascii_case(CONTENT_TYPE));

        if reserved {
            return Err(EncodeError::DuplicateReservedHeader {
                name: header.name.clone(),
            });
        }
    }
    Ok(())
}

fn push_request_line(buf: &mut Vec<u8>, method: &str, target: &str, version: &str) {
    buf.extend_from_slice(method.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(target.as_bytes());
    buf.push(b' ');
    buf.extend_from_slice(version.as_bytes());
    buf.extend_from_slice(CRLF);
}

fn push_header_line(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.extend_from_slice(name.as_bytes());
    buf.extend_from_slice(b": ");
    buf.extend_from_slice(value.as_bytes());
    buf.extend_from_slice(CRLF);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{Query, Scheme};

    fn hello() -> Request {
        Request::get(HttpUri::http("127.0.0.1", Some(8080), "/hello"))
    }

    fn text(message: &EncodedMessage) -> &str {
        std::str::from_utf8(message.as_bytes()).unwrap()
    }

    fn header_value<'a>(message: &'a str, name: &str) -> Option<&'a str> {
        let head = &message[..message.find("\r\n\r\n").unwrap()];
        head.split("\r\n")
            .skip(1)
            .find_map(|line| line.strip_prefix(name)?.strip_prefix(": "))
    }

    #[test]
    fn encode_get_without_body() {
        let message = encode(&hello()).unwrap();
        assert_eq!(text(&message), "GET /hello HTTP/1.1\r\nHost: 127.0.0.1:8080\r\n\r\n");
    }

    #[test]
    fn encode_post_with_body() {
        let req = Request::post(
            HttpUri::http("127.0.0.1", Some(8080), "/hello"),
            "text/plain",
            "Hello, World!",
        );
        let message = encode(&req).unwrap();
        assert_eq!(
            text(&message),
            "POST /hello HTTP/1.1\r\n\
             Host: 127.0.0.1:8080\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: 13\r\n\
             \r\n\
             Hello, World!"
        );
    }

    #[test]
    fn content_length_matches_body_length() {
        for len in [0usize, 1, 13, 1000, 100_000] {
            let req = hello().with_body(vec![b'x'; len]);
            let message = encode(&req).unwrap();
            let text = text(&message);
            let value: usize = header_value(text, "Content-Length").unwrap().parse().unwrap();
            assert_eq!(value, len);
            assert!(message.as_bytes().ends_with(&vec![b'x'; len]));
        }
    }

    #[test]
    fn no_body_means_no_content_length() {
        let message = encode(&hello().with_content_type("text/plain")).unwrap();
        let text = text(&message);
        assert!(header_value(text, "Content-Length").is_none());
        assert!(header_value(text, "Content-Type").is_none());
        assert!(text.ends_with("\r\n\r\n"));
        assert_eq!(text.matches("\r\n\r\n").count(), 1);
    }

    #[test]
    fn body_without_content_type_is_not_defaulted() {
        let message = encode(&hello().with_body("abc")).unwrap();
        assert!(header_value(text(&message), "Content-Type").is_none());
    }

    #[test]
    fn additional_headers_follow_mandatory_in_order() {
        let req = hello()
            .with_header("User-Agent", "httpwire/0.1")
            .with_header("Accept", "*/*")
            .with_header("Accept-Language", "en");
        let message = encode(&req).unwrap();
        let text = text(&message);

        let host = text.find("Host:").unwrap();
        let ua = text.find("User-Agent:").unwrap();
        let accept = text.find("Accept:").unwrap();
        let lang = text.find("Accept-Language:").unwrap();
        assert!(host < ua && ua < accept && accept < lang);
    }

    #[test]
    fn duplicate_names_are_kept_as_separate_lines() {
        let req = hello().with_header("Accept", "text/html").with_header("Accept", "*/*");
        let message = encode(&req).unwrap();
        assert!(text(&message).contains("Accept: text/html\r\nAccept: */*\r\n"));
    }

    #[test]
    fn default_port_is_omitted_from_host() {
        let req = Request::get(HttpUri::http("example.com", Some(80), "/"));
        assert_eq!(header_value(text(&encode(&req).unwrap()), "Host"), Some("example.com"));

        let mut uri = HttpUri::http("example.com", Some(443), "/");
        uri.scheme = Scheme::Https;
        assert_eq!(
            header_value(text(&encode(&Request::get(uri)).unwrap()), "Host"),
            Some("example.com")
        );

        let req = Request::get(HttpUri::http("example.com", Some(443), "/"));
        assert_eq!(
            header_value(text(&encode(&req).unwrap()), "Host"),
            Some("example.com:443")
        );
    }

    #[test]
    fn ipv6_host_is_bracketed() {
        let req = Request::get(HttpUri::http("::1", Some(8080), "/"));
        assert_eq!(header_value(text(&encode(&req).unwrap()), "Host"), Some("[::1]:8080"));
    }

    #[test]
    fn bracketed_ipv6_host_is_kept() {
        let req = Request::get(HttpUri::http("[::1]", Some(8080), "/"));
        assert_eq!(header_value(text(&encode(&req).unwrap()), "Host"), Some("[::1]:8080"));
    }

    #[test]
    fn host_with_port_path_or_space_is_rejected() {
        for host in ["example.com:8080", "evil.com/x", "a b", "a?b", "a#b", "[example.com]", "[::1"] {
            let req = Request::get(HttpUri::http(host, Some(8080), "/"));
            assert_eq!(
                encode(&req).unwrap_err(),
                EncodeError::InvalidHost(host.to_string()),
                "{host}"
            );
        }
    }

    #[test]
    fn query_is_appended_to_target() {
        let req = hello().with_query("name", "some name").with_query("lang", "en&fr");
        let message = encode(&req).unwrap();
        assert!(text(&message).starts_with("GET /hello?name=some%20name&lang=en%26fr HTTP/1.1\r\n"));
    }

    #[test]
    fn query_extends_existing_query_string() {
        let mut uri = HttpUri::http("localhost", None, "/search?q=1");
        uri.query.push(Query::new("page", "2"));
        assert_eq!(request_target(&uri), "/search?q=1&page=2");
    }

    #[test]
    fn empty_path_is_rejected() {
        let req = Request::get(HttpUri::http("127.0.0.1", None, ""));
        assert_eq!(encode(&req).unwrap_err(), EncodeError::EmptyPath);
    }

    #[test]
    fn path_without_leading_slash_is_rejected() {
        let req = Request::get(HttpUri::http("127.0.0.1", None, "hello"));
        assert!(matches!(encode(&req).unwrap_err(), EncodeError::InvalidPath(_)));
    }

    #[test]
    fn empty_method_and_version_are_rejected() {
        let mut req = hello();
        req.method.clear();
        assert_eq!(encode(&req).unwrap_err(), EncodeError::EmptyMethod);

        let mut req = hello();
        req.protocol_version.clear();
        assert_eq!(encode(&req).unwrap_err(), EncodeError::EmptyVersion);
    }

    #[test]
    fn space_in_path_is_rejected() {
        let req = Request::get(HttpUri::http("127.0.0.1", None, "/a b"));
        assert_eq!(
            encode(&req).unwrap_err(),
            EncodeError::InvalidRequestLine { component: "path" }
        );
    }

    #[test]
    fn non_visible_bytes_in_request_line_are_rejected() {
        for path in ["/a\tb", "/a\u{7f}", "/a\u{1}", "/caf\u{e9}"] {
            let req = Request::get(HttpUri::http("127.0.0.1", None, path));
            assert_eq!(
                encode(&req).unwrap_err(),
                EncodeError::InvalidRequestLine { component: "path" },
                "{path:?}"
            );
        }
        assert_eq!(
            encode_request_line("GET\t", "/", "HTTP/1.1").unwrap_err(),
            EncodeError::InvalidRequestLine { component: "method" }
        );
        assert_eq!(
            encode_request_line("GET", "/", "HTTP/1.1\u{0}").unwrap_err(),
            EncodeError::InvalidRequestLine { component: "version" }
        );
    }

    #[test]
    fn crlf_in_header_is_rejected() {
        let req = hello().with_header("X-Evil", "a\r\nHost: other");
        assert_eq!(
            encode(&req).unwrap_err(),
            EncodeError::InvalidHeaderCharacter {
                name: "X-Evil".to_string()
            }
        );

        assert!(encode_header_line("X-Bad\n", "v").is_err());
        assert!(encode_header_line("", "v").is_err());
    }

    #[test]
    fn crlf_in_content_type_is_rejected() {
        let req = hello().with_body("x").with_content_type("text/plain\r\nX: y");
        assert!(matches!(
            encode(&req).unwrap_err(),
            EncodeError::InvalidHeaderCharacter { .. }
        ));
    }

    #[test]
    fn reserved_headers_are_rejected() {
        for name in ["Host", "host", "Content-Length", "CONTENT-LENGTH"] {
            let req = hello().with_header(name, "x");
            assert_eq!(
                encode(&req).unwrap_err(),
                EncodeError::DuplicateReservedHeader {
                    name: name.to_string()
                }
            );
        }
    }

    #[test]
    fn content_type_is_reserved_only_when_derived() {
        let req = hello().with_header("Content-Type", "application/json");
        assert!(encode(&req).is_ok());

        let req = hello()
            .with_body("{}")
            .with_content_type("application/json")
            .with_header("content-type", "application/json");
        assert!(matches!(
            encode(&req).unwrap_err(),
            EncodeError::DuplicateReservedHeader { .. }
        ));
    }

    #[test]
    fn userinfo_and_empty_host_are_rejected() {
        let req = Request::get(HttpUri::http("user:pass@example.com", None, "/"));
        assert!(matches!(
            encode(&req).unwrap_err(),
            EncodeError::UserInfoInAuthority(_)
        ));

        let req = Request::get(HttpUri::http("", None, "/"));
        assert_eq!(encode(&req).unwrap_err(), EncodeError::EmptyHost);
    }

    #[test]
    fn encode_request_line_formats_components() {
        assert_eq!(
            encode_request_line("DELETE", "/items/1", "HTTP/1.1").unwrap(),
            b"DELETE /items/1 HTTP/1.1\r\n"
        );
        assert_eq!(
            encode_request_line("GET", "", "HTTP/1.1").unwrap_err(),
            EncodeError::EmptyPath
        );
    }

    #[test]
    fn encode_headers_folds_in_order() {
        let headers = vec![Header::new("A", "1"), Header::new("B", "2"), Header::new("A", "3")];
        assert_eq!(encode_headers(&headers).unwrap(), b"A: 1\r\nB: 2\r\nA: 3\r\n");
        assert!(encode_headers(&[]).unwrap().is_empty());
    }

    #[test]
    fn derive_mandatory_headers_order() {
        let req = hello().with_body("abc").with_content_type("text/plain");
        assert_eq!(
            derive_mandatory_headers(&req),
            vec![
                Header::new("Host", "127.0.0.1:8080"),
                Header::new("Content-Type", "text/plain"),
                Header::new("Content-Length", "3"),
            ]
        );
        assert_eq!(derive_mandatory_headers(&hello()).len(), 1);
    }

    #[test]
    fn round_trips_through_httparse() {
        let req = Request::post(
            HttpUri::http("localhost", Some(3000), "/echo"),
            "application/json",
            r#"{"a":1}"#,
        )
        .with_header("X-Trace", "1")
        .with_header("X-Trace", "2");
        let message = encode(&req).unwrap();

        let mut headers = [httparse::EMPTY_HEADER; 16];
        let mut parsed = httparse::Request::new(&mut headers);
        let status = parsed.parse(message.as_bytes()).unwrap();
        let httparse::Status::Complete(head_len) = status else {
            panic!("incomplete request head");
        };

        assert_eq!(parsed.method, Some("POST"));
        assert_eq!(parsed.path, Some("/echo"));
        assert_eq!(parsed.version, Some(1));
        let names: Vec<(&str, &[u8])> = parsed.headers.iter().map(|h| (h.name, h.value)).collect();
        assert_eq!(
            names,
            vec![
                ("Host", &b"localhost:3000"[..]),
                ("Content-Type", &b"application/json"[..]),
                ("Content-Length", &b"7"[..]),
                ("X-Trace", &b"1"[..]),
                ("X-Trace", &b"2"[..]),
            ]
        );
        assert_eq!(&message.as_bytes()[head_len..], br#"{"a":1}"#);
    }
}
