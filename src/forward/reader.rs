//! Upstream response reading and emission.
//!
//! # Data Flow
//! ```text
//! StatusLine ──▶ Headers ──▶ Body ──▶ Decoding ──▶ Emitting ──▶ Done
//!                  │           │
//!                  │           └─ no transform pending: bytes stream straight to the sink
//!                  └─ each kept header line is domain-rewritten and emitted immediately;
//!                     `Transfer-Encoding: chunked` and `Content-Encoding: gzip` are withheld
//! ```
//!
//! Decoding order: chunk decode, gzip decode, domain rewrite, custom transformer, gzip
//! re-encode. Once any of these is triggered the body is fully buffered and the emitted
//! `Content-Length` is recomputed from the final bytes.

use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};

use crate::forward::body::{self, DomainRewrite};
use crate::forward::error::{ForwardError, HookStage};
use crate::forward::hooks::{ResponseObserver, ResponseTransformer};
use crate::http::response::ResponseSink;

const READ_BUF_SIZE: usize = 16 * 1024;

/// Phases of reading one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPhase {
    StatusLine,
    Headers,
    Body,
    Decoding,
    Emitting,
    Done,
}

impl ReadPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadPhase::StatusLine => "reading status line",
            ReadPhase::Headers => "reading headers",
            ReadPhase::Body => "reading body",
            ReadPhase::Decoding => "decoding body",
            ReadPhase::Emitting => "emitting response",
            ReadPhase::Done => "done",
        }
    }
}

/// Per-call reader settings, borrowed from the forwarder.
pub struct ReaderSettings<'a> {
    pub rewrite: Option<&'a DomainRewrite>,
    pub observer: Option<&'a ResponseObserver>,
    /// Set only when the allow-list selected this path.
    pub transformer: Option<&'a ResponseTransformer>,
    pub path: &'a str,
    pub strict_chunked: bool,
    pub read_timeout: Option<Duration>,
    /// HEAD responses carry no body; their headers are passed through untouched.
    pub head_request: bool,
}

/// Header block facts gathered before the body is touched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: u16,
    /// Header lines as forwarded (post-rewrite), in order.
    pub lines: Vec<String>,
    pub is_chunked: bool,
    pub is_gzipped: bool,
    /// Upstream declared some other content encoding, forwarded untouched.
    pub other_encoding: bool,
}

/// What was emitted to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSummary {
    pub status: u16,
    pub body_bytes: usize,
    pub streamed: bool,
}

/// Read the upstream response from `upstream` and emit it into `sink`.
pub async fn read_response<R, S>(
    upstream: R,
    sink: &mut S,
    settings: &ReaderSettings<'_>,
) -> Result<ResponseSummary, ForwardError>
where
    R: AsyncRead + Unpin,
    S: ResponseSink + ?Sized,
{
    let mut reader = BufReader::new(upstream);

    let head = read_head(&mut reader, sink, settings).await?;

    if let Some(observer) = settings.observer {
        observer(head.lines.as_slice()).map_err(|e| ForwardError::hook(HookStage::ResponseObserver, e))?;
    }

    if settings.head_request {
        sink.flush().map_err(ForwardError::Sink)?;
        return Ok(ResponseSummary {
            status: head.status,
            body_bytes: 0,
            streamed: true,
        });
    }

    let buffered = head.is_chunked
        || head.is_gzipped
        || settings.rewrite.is_some()
        || settings.transformer.is_some();

    if !buffered {
        let body_bytes = stream_body(&mut reader, sink, settings.read_timeout).await?;
        return Ok(ResponseSummary {
            status: head.status,
            body_bytes,
            streamed: true,
        });
    }

    let raw = read_body(&mut reader, settings.read_timeout).await?;
    tracing::trace!(phase = ReadPhase::Decoding.as_str(), raw_bytes = raw.len());
    let (final_body, gzip_out) = decode_body(raw, &head, settings)?;

    tracing::trace!(phase = ReadPhase::Emitting.as_str(), bytes = final_body.len());
    sink.remove_header("Content-Length");
    if gzip_out {
        sink.remove_header("Content-Encoding");
        sink.emit_header_line("Content-Encoding: gzip");
    } else if !head.other_encoding {
        sink.remove_header("Content-Encoding");
    }
    sink.emit_header_line(&format!("Content-Length: {}", final_body.len()));
    sink.emit_body(&final_body).map_err(ForwardError::Sink)?;
    sink.flush().map_err(ForwardError::Sink)?;

    tracing::trace!(phase = ReadPhase::Done.as_str());
    Ok(ResponseSummary {
        status: head.status,
        body_bytes: final_body.len(),
        streamed: false,
    })
}

async fn read_head<R, S>(
    reader: &mut BufReader<R>,
    sink: &mut S,
    settings: &ReaderSettings<'_>,
) -> Result<ResponseHead, ForwardError>
where
    R: AsyncRead + Unpin,
    S: ResponseSink + ?Sized,
{
    // Interim 1xx responses (e.g. 100 Continue) are consumed and skipped.
    let status = loop {
        let line = read_line(reader, settings.read_timeout, ReadPhase::StatusLine).await?;
        let Some(line) = line else {
            return Err(ForwardError::MalformedResponse(
                "upstream closed the connection before sending a status line".to_string(),
            ));
        };
        let status = parse_status_line(&line)?;
        if (100..200).contains(&status) && status != 101 {
            tracing::debug!(status, "Skipping interim upstream response");
            while let Some(line) = read_line(reader, settings.read_timeout, ReadPhase::Headers).await? {
                if line.is_empty() {
                    break;
                }
            }
            continue;
        }
        break status;
    };
    sink.set_status(status);

    let mut head = ResponseHead {
        status,
        ..Default::default()
    };

    while let Some(line) = read_line(reader, settings.read_timeout, ReadPhase::Headers).await? {
        if line.is_empty() {
            break;
        }

        let lower = line.to_ascii_lowercase();
        if lower.starts_with("transfer-encoding:") && lower.contains("chunked") {
            head.is_chunked = true;
            continue;
        }
        if let Some(value) = lower.strip_prefix("content-encoding:") {
            // Stacked codings (`gzip, br`) are passed through undecoded.
            if matches!(value.trim(), "gzip" | "x-gzip") {
                head.is_gzipped = true;
                continue;
            }
            head.other_encoding = true;
        }

        let line = match settings.rewrite {
            Some(rewrite) => rewrite.apply_str(&line),
            None => line,
        };
        sink.emit_header_line(&line);
        head.lines.push(line);
    }

    tracing::debug!(
        status = head.status,
        headers = head.lines.len(),
        chunked = head.is_chunked,
        gzipped = head.is_gzipped,
        "Upstream response headers read"
    );
    Ok(head)
}

fn decode_body(
    raw: Vec<u8>,
    head: &ResponseHead,
    settings: &ReaderSettings<'_>,
) -> Result<(Vec<u8>, bool), ForwardError> {
    let mut buf = raw;

    if head.is_chunked {
        let decoded = body::decode_chunked(&buf);
        if !decoded.complete {
            if settings.strict_chunked {
                return Err(ForwardError::MalformedChunk {
                    decoded_bytes: decoded.payload.len(),
                });
            }
            tracing::warn!(
                decoded_bytes = decoded.payload.len(),
                raw_bytes = buf.len(),
                "Malformed chunked framing, keeping chunks decoded so far"
            );
        }
        buf = decoded.payload;
    }

    let mut gunzipped = false;
    if head.is_gzipped {
        if let Some(plain) = body::gunzip(&buf) {
            buf = plain;
            gunzipped = true;
        }
    }

    if let Some(rewrite) = settings.rewrite {
        buf = rewrite.apply(&buf);
    }

    if let Some(transformer) = settings.transformer {
        buf = transformer(buf, settings.path)
            .map_err(|e| ForwardError::hook(HookStage::ResponseTransformer, e))?;
    }

    if gunzipped {
        buf = body::gzip(&buf)?;
    }

    Ok((buf, head.is_gzipped))
}

/// Parse `HTTP/1.x CODE [reason]` into the status code.
pub fn parse_status_line(line: &str) -> Result<u16, ForwardError> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(ForwardError::MalformedResponse(format!(
            "bad status line {line:?}"
        )));
    }
    parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..=999).contains(code))
        .ok_or_else(|| ForwardError::MalformedResponse(format!("bad status code in {line:?}")))
}

/// One CRLF/LF-terminated line without its terminator; `None` on EOF.
async fn read_line<R>(
    reader: &mut BufReader<R>,
    read_timeout: Option<Duration>,
    phase: ReadPhase,
) -> Result<Option<String>, ForwardError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let read = with_deadline(read_timeout, phase, reader.read_until(b'\n', &mut buf)).await?;
    if read == 0 {
        return Ok(None);
    }
    while matches!(buf.last(), Some(b'\n' | b'\r')) {
        buf.pop();
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}

async fn read_body<R>(
    reader: &mut BufReader<R>,
    read_timeout: Option<Duration>,
) -> Result<Vec<u8>, ForwardError>
where
    R: AsyncRead + Unpin,
{
    let mut body = Vec::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = with_deadline(read_timeout, ReadPhase::Body, reader.read(&mut buf)).await?;
        if n == 0 {
            return Ok(body);
        }
        body.extend_from_slice(&buf[..n]);
    }
}

async fn stream_body<R, S>(
    reader: &mut BufReader<R>,
    sink: &mut S,
    read_timeout: Option<Duration>,
) -> Result<usize, ForwardError>
where
    R: AsyncRead + Unpin,
    S: ResponseSink + ?Sized,
{
    let mut total = 0;
    let mut buf = vec![0u8; READ_BUF_SIZE];
    loop {
        let n = with_deadline(read_timeout, ReadPhase::Body, reader.read(&mut buf)).await?;
        if n == 0 {
            break;
        }
        sink.emit_body(&buf[..n]).map_err(ForwardError::Sink)?;
        total += n;
    }
    sink.flush().map_err(ForwardError::Sink)?;
    Ok(total)
}

async fn with_deadline<F, T>(
    deadline: Option<Duration>,
    phase: ReadPhase,
    fut: F,
) -> Result<T, ForwardError>
where
    F: Future<Output = io::Result<T>>,
{
    match deadline {
        None => Ok(fut.await?),
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ForwardError::Timeout {
                phase: phase.as_str(),
                secs: limit.as_secs(),
            }),
        },
    }
}
