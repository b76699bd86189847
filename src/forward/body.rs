//! Pure transforms over a buffered response body.
//!
//! Applied in order by the reader: chunk decode, gzip decode, domain rewrite, custom
//! transformer, gzip re-encode.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Result of decoding a chunked body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkedBody {
    /// Concatenated payloads of every fully parsed chunk.
    pub payload: Vec<u8>,
    /// False when framing broke off before the zero-length terminator.
    pub complete: bool,
}

/// Decode chunked transfer encoding.
///
/// Each chunk is a hex size (extensions after `;` ignored) terminated by CRLF, that many
/// payload bytes, then CRLF. Decoding stops at size `0`. Malformed or truncated framing stops
/// at the last complete chunk with `complete == false`; a partial chunk is never included.
pub fn decode_chunked(raw: &[u8]) -> ChunkedBody {
    let mut payload = Vec::with_capacity(raw.len());
    let mut pos = 0;

    loop {
        let Some(line_len) = find_crlf(&raw[pos..]) else {
            return ChunkedBody { payload, complete: false };
        };
        let size = match parse_chunk_size(&raw[pos..pos + line_len]) {
            Some(size) => size,
            None => return ChunkedBody { payload, complete: false },
        };
        pos += line_len + 2;

        if size == 0 {
            return ChunkedBody { payload, complete: true };
        }

        // Size plus trailing CRLF must fit in what is left; sizes near usize::MAX are framing errors.
        let remaining = raw.len() - pos;
        if size > remaining.saturating_sub(2) {
            return ChunkedBody { payload, complete: false };
        }
        let end = pos + size;
        if &raw[end..end + 2] != b"\r\n" {
            return ChunkedBody { payload, complete: false };
        }
        payload.extend_from_slice(&raw[pos..end]);
        pos = end + 2;
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_chunk_size(line: &[u8]) -> Option<usize> {
    let line = std::str::from_utf8(line).ok()?;
    let token = line.split(';').next()?.trim();
    if token.is_empty() {
        return None;
    }
    usize::from_str_radix(token, 16).ok()
}

/// Decompress a gzip body. `None` when the bytes are not a valid gzip stream.
pub fn gunzip(raw: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = GzDecoder::new(raw);
    let mut out = Vec::with_capacity(raw.len().saturating_mul(2));
    match decoder.read_to_end(&mut out) {
        Ok(_) => Some(out),
        Err(e) => {
            tracing::debug!(error = %e, "gzip decode failed, keeping body as received");
            None
        }
    }
}

/// Compress a body with gzip at the default level.
pub fn gzip(raw: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
    encoder.write_all(raw)?;
    encoder.finish()
}

/// Strip a leading `http://` / `https://` and trailing slashes from a domain setting.
pub fn bare_host(domain: &str) -> &str {
    let domain = domain.trim();
    let without_scheme = ["https://", "http://"]
        .iter()
        .find_map(|prefix| {
            domain
                .get(..prefix.len())
                .filter(|head| head.eq_ignore_ascii_case(prefix))
                .map(|_| &domain[prefix.len()..])
        })
        .unwrap_or(domain);
    without_scheme.trim_end_matches('/')
}

/// Literal domain substitution applied to headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRewrite {
    from: String,
    to: String,
}

impl DomainRewrite {
    /// Inactive (returns `None`) when either side is empty or both are equal.
    pub fn new(from: &str, to: &str) -> Option<Self> {
        let from = bare_host(from);
        let to = bare_host(to);
        if from.is_empty() || to.is_empty() || from == to {
            return None;
        }
        Some(Self {
            from: from.to_string(),
            to: to.to_string(),
        })
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn apply_str(&self, text: &str) -> String {
        text.replace(&self.from, &self.to)
    }

    /// Replace every non-overlapping occurrence, scanning left to right.
    pub fn apply(&self, body: &[u8]) -> Vec<u8> {
        let needle = self.from.as_bytes();
        let replacement = self.to.as_bytes();
        let mut out = Vec::with_capacity(body.len());
        let mut pos = 0;

        while pos < body.len() {
            if body[pos..].starts_with(needle) {
                out.extend_from_slice(replacement);
                pos += needle.len();
            } else {
                out.push(body[pos]);
                pos += 1;
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_chunked(body: &[u8], chunk_size: usize) -> Vec<u8> {
        let mut out = Vec::new();
        for chunk in body.chunks(chunk_size) {
            out.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
            out.extend_from_slice(chunk);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(b"0\r\n\r\n");
        out
    }

    fn count(haystack: &[u8], needle: &[u8]) -> usize {
        haystack.windows(needle.len()).filter(|w| *w == needle).count()
    }

    #[test]
    fn chunked_round_trip_various_sizes() {
        let body: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for size in [1, 7, 16, 255, 999, 1000, 4096] {
            let decoded = decode_chunked(&encode_chunked(&body, size));
            assert!(decoded.complete, "chunk size {size}");
            assert_eq!(decoded.payload, body, "chunk size {size}");
        }
    }

    #[test]
    fn chunked_empty_body_is_only_terminator() {
        let decoded = decode_chunked(b"0\r\n\r\n");
        assert!(decoded.complete);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn chunk_extensions_and_uppercase_hex() {
        let decoded = decode_chunked(b"A;name=value\r\n0123456789\r\n0\r\n\r\n");
        assert!(decoded.complete);
        assert_eq!(decoded.payload, b"0123456789");
    }

    #[test]
    fn malformed_size_stops_at_last_good_chunk() {
        let decoded = decode_chunked(b"3\r\nabc\r\nzz\r\ndef\r\n0\r\n\r\n");
        assert!(!decoded.complete);
        assert_eq!(decoded.payload, b"abc");
    }

    #[test]
    fn truncated_chunk_is_dropped() {
        let decoded = decode_chunked(b"3\r\nabc\r\n10\r\nonly-part");
        assert!(!decoded.complete);
        assert_eq!(decoded.payload, b"abc");
    }

    #[test]
    fn missing_chunk_terminator_stops() {
        let decoded = decode_chunked(b"3\r\nabcX\r\n0\r\n\r\n");
        assert!(!decoded.complete);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn huge_chunk_size_stops_without_overflow() {
        let decoded = decode_chunked(b"ffffffffffffffec\r\nabc");
        assert!(!decoded.complete);
        assert!(decoded.payload.is_empty());

        let decoded = decode_chunked(b"2\r\nok\r\nfffffffffffffffe\r\nabc\r\n");
        assert!(!decoded.complete);
        assert_eq!(decoded.payload, b"ok");

        let max = format!("3\r\nabc\r\n{:x}\r\nxyz\r\n", usize::MAX);
        let decoded = decode_chunked(max.as_bytes());
        assert!(!decoded.complete);
        assert_eq!(decoded.payload, b"abc");
    }

    #[test]
    fn missing_zero_chunk_is_incomplete() {
        let decoded = decode_chunked(b"3\r\nabc\r\n");
        assert!(!decoded.complete);
        assert_eq!(decoded.payload, b"abc");
    }

    #[test]
    fn gzip_round_trip() {
        let body = b"hello hello hello gzip world".repeat(20);
        let compressed = gzip(&body).unwrap();
        assert_ne!(compressed, body);
        assert_eq!(gunzip(&compressed).unwrap(), body);
    }

    #[test]
    fn gunzip_rejects_plain_bytes() {
        assert_eq!(gunzip(b"definitely not gzip"), None);
    }

    #[test]
    fn bare_host_strips_scheme_and_slash() {
        assert_eq!(bare_host("https://example.com/"), "example.com");
        assert_eq!(bare_host("HTTP://example.com//"), "example.com");
        assert_eq!(bare_host("example.com"), "example.com");
        assert_eq!(bare_host(" proxy.local:8080 "), "proxy.local:8080");
    }

    #[test]
    fn rewrite_inactive_for_empty_or_identical() {
        assert!(DomainRewrite::new("a.test", "").is_none());
        assert!(DomainRewrite::new("", "b.test").is_none());
        assert!(DomainRewrite::new("https://a.test/", "a.test").is_none());
    }

    #[test]
    fn rewrite_replaces_every_occurrence() {
        let rewrite = DomainRewrite::new("api.example.com", "https://proxy.local/").unwrap();
        let body = b"<a href=\"https://api.example.com/x\">api.example.com</a> api.example.com";
        let out = rewrite.apply(body);

        assert_eq!(count(body, b"api.example.com"), 3);
        assert_eq!(count(&out, b"proxy.local"), 3);
        assert_eq!(count(&out, b"api.example.com"), 0);
        assert_eq!(rewrite.apply(&out), out);
    }

    #[test]
    fn rewrite_handles_binary_and_edges() {
        let rewrite = DomainRewrite::new("a.test", "b.test").unwrap();
        assert_eq!(rewrite.apply(b"a.test"), b"b.test");
        assert_eq!(rewrite.apply(b"\xffa.tes"), b"\xffa.tes");
        assert_eq!(rewrite.apply(b""), b"");
        assert_eq!(rewrite.apply_str("Location: http://a.test/x"), "Location: http://b.test/x");
    }
}
