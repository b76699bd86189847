//! Response emission towards the original caller.
//!
//! # Responsibilities
//! - Define the sink the engine writes the forwarded response into ([`ResponseSink`])
//! - Provide an in-memory sink that host adapters turn into their own response type
//!
//! # Design Decisions
//! - Header lines are emitted raw (`Name: value`), as received from upstream
//! - Header removal is by name, case-insensitive, affecting every previously emitted line

use std::io;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

/// Destination for the forwarded response.
pub trait ResponseSink {
    /// Set the response status code.
    fn set_status(&mut self, status: u16);

    /// Emit one raw header line (`Name: value`, no CRLF).
    fn emit_header_line(&mut self, line: &str);

    /// Drop every previously emitted header with this name.
    fn remove_header(&mut self, name: &str);

    /// Append body bytes.
    fn emit_body(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Push everything emitted so far to the caller.
    fn flush(&mut self) -> io::Result<()>;
}

/// Splits `Name: value` into trimmed parts. Lines without a colon yield `None`.
pub fn split_header_line(line: &str) -> Option<(&str, &str)> {
    let (name, value) = line.split_once(':')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, value.trim()))
}

/// Collects the response in memory.
#[derive(Debug, Clone, Default)]
pub struct BufferedResponse {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub flushed: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value of a header, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value of a header, in emission order.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Convert into an axum response. Headers that are not valid HTTP tokens are skipped.
    pub fn into_response(self) -> Response<Body> {
        let status = self
            .status
            .and_then(|s| StatusCode::from_u16(s).ok())
            .unwrap_or(StatusCode::OK);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = status;

        let headers = response.headers_mut();
        for (name, value) in self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, "Dropping unrepresentable response header"),
            }
        }
        response
    }
}

impl ResponseSink for BufferedResponse {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn emit_header_line(&mut self, line: &str) {
        if let Some((name, value)) = split_header_line(line) {
            self.headers.push((name.to_string(), value.to_string()));
        }
    }

    fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    fn emit_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.body.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flushed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_header_line_trims() {
        assert_eq!(
            split_header_line("Content-Type:  text/html "),
            Some(("Content-Type", "text/html"))
        );
        assert_eq!(split_header_line("Location: http://a:8080/"), Some(("Location", "http://a:8080/")));
        assert_eq!(split_header_line("no colon here"), None);
        assert_eq!(split_header_line(": value"), None);
    }

    #[test]
    fn remove_header_is_case_insensitive() {
        let mut sink = BufferedResponse::new();
        sink.emit_header_line("Content-Length: 10");
        sink.emit_header_line("X-Other: 1");
        sink.emit_header_line("content-length: 12");
        sink.remove_header("CONTENT-LENGTH");
        assert_eq!(sink.headers, vec![("X-Other".to_string(), "1".to_string())]);
    }

    #[test]
    fn into_response_keeps_status_headers_body() {
        let mut sink = BufferedResponse::new();
        sink.set_status(404);
        sink.emit_header_line("Set-Cookie: a=1");
        sink.emit_header_line("Set-Cookie: b=2");
        sink.emit_body(b"missing").unwrap();
        sink.flush().unwrap();
        assert!(sink.flushed);

        let response = sink.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn missing_status_defaults_to_ok() {
        let response = BufferedResponse::new().into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
