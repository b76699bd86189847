//! forward-cli: forward one request from the command line and print the response.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;

use http_forward::config::validation::validate_forward;
use http_forward::http::response::split_header_line;
use http_forward::observability::logging;
use http_forward::{ForwardConfig, ForwardOutcome, ForwardRequest, Forwarder, ResponseSink};

#[derive(Parser)]
#[command(name = "forward-cli")]
#[command(about = "Forward a single HTTP request and print the upstream response", long_about = None)]
struct Cli {
    /// Target URL (http:// or https://)
    url: String,

    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Request header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,

    /// Replace the target host with this domain in the response
    #[arg(long)]
    rewrite_to: Option<String>,

    /// Domain to replace (defaults to the target host)
    #[arg(long)]
    rewrite_from: Option<String>,

    /// Connect timeout in seconds
    #[arg(short, long, default_value_t = 30)]
    timeout: u64,

    /// Per-read timeout in seconds while receiving the response
    #[arg(long)]
    read_timeout: Option<u64>,

    /// Accept any upstream TLS certificate
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Fail on truncated chunked bodies instead of keeping the complete chunks
    #[arg(long)]
    strict_chunked: bool,

    /// Print the status line and headers to stdout before the body
    #[arg(short, long)]
    include: bool,

    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Writes the response to stdout as it arrives.
///
/// Status and headers are held until the first body bytes (or the flush), since the engine
/// may still remove headers before emitting a buffered body.
struct StdoutSink {
    include: bool,
    status: Option<u16>,
    headers: Vec<String>,
    head_written: bool,
}

impl StdoutSink {
    fn new(include: bool) -> Self {
        Self {
            include,
            status: None,
            headers: Vec::new(),
            head_written: false,
        }
    }

    fn write_head(&mut self) -> io::Result<()> {
        if self.head_written {
            return Ok(());
        }
        self.head_written = true;

        let status = self.status.unwrap_or(200);
        if self.include {
            let mut out = io::stdout().lock();
            writeln!(out, "HTTP/1.1 {status}")?;
            for line in &self.headers {
                writeln!(out, "{line}")?;
            }
            writeln!(out)?;
        } else {
            let mut err = io::stderr().lock();
            writeln!(err, "< HTTP/1.1 {status}")?;
            for line in &self.headers {
                writeln!(err, "< {line}")?;
            }
        }
        Ok(())
    }
}

impl ResponseSink for StdoutSink {
    fn set_status(&mut self, status: u16) {
        self.status = Some(status);
    }

    fn emit_header_line(&mut self, line: &str) {
        self.headers.push(line.to_string());
    }

    fn remove_header(&mut self, name: &str) {
        self.headers.retain(|line| {
            split_header_line(line).map_or(true, |(n, _)| !n.eq_ignore_ascii_case(name))
        });
    }

    fn emit_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_head()?;
        io::stdout().lock().write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.write_head()?;
        io::stdout().lock().flush()
    }
}

fn parse_header(raw: &str) -> Option<(String, String)> {
    split_header_line(raw).map(|(name, value)| (name.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_tracing(&cli.log_level, false);

    let config = ForwardConfig {
        timeout_secs: cli.timeout,
        read_timeout_secs: cli.read_timeout,
        rewrite_from_domain: cli.rewrite_from,
        rewrite_to_domain: cli.rewrite_to,
        insecure_skip_verify: cli.insecure,
        strict_chunked: cli.strict_chunked,
        ..ForwardConfig::default()
    };
    if let Err(errors) = validate_forward(&config) {
        for e in errors {
            eprintln!("Error: {e}");
        }
        return ExitCode::FAILURE;
    }

    let mut request = ForwardRequest::new(cli.method.to_uppercase());
    for raw in &cli.headers {
        match parse_header(raw) {
            Some((name, value)) => request = request.with_header(name, value),
            None => {
                eprintln!("Error: header must look like `Name: value`, got {raw:?}");
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(data) = cli.data {
        request = request.with_body(data.into_bytes());
    }

    let mut sink = StdoutSink::new(cli.include);
    match Forwarder::with_config(cli.url, config)
        .send(&request, &mut sink)
        .await
    {
        Ok(ForwardOutcome::Rejected) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error ({}): {e}", e.kind());
            ExitCode::FAILURE
        }
    }
}
