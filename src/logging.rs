use crate::types::StreamEvent;
use lazy_static::lazy_static;
use regex::Regex;
use std::io::Write;
use std::panic;
use std::path::Path;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

pub const LOG_FILE_NAME: &str = "codeloom.log";
pub const TRACE_FILE_NAME: &str = "trace_buffer.json";
const DEFAULT_FILTER: &str = "codeloom=debug,sqlx=warn";

lazy_static! {
    static ref SECRET_REGEX: Regex =
        Regex::new(r"(?i)(sk-[A-Za-z0-9_\-]{16,}|Bearer\s+[^\s]+|api[_-]?key\s*[=:]\s*[^\s,]+)")
            .expect("Invalid secret regex");
}

/// Masks API keys and bearer tokens before they reach a log file.
pub struct RedactingWriter<W: Write> {
    inner: W,
}

impl<W: Write> RedactingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let input = String::from_utf8_lossy(buf);
        let redacted = SECRET_REGEX.replace_all(&input, "[REDACTED]");
        self.inner.write_all(redacted.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Keeps the non-blocking writers flushing; hold until shutdown.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Installs the global subscriber: a redacted text log rotated daily under
/// `log_dir`, plus an NDJSON trace file when `json` is set.
pub fn init_tracing(log_dir: &Path, json: bool) -> std::io::Result<LogGuards> {
    use tracing_subscriber::prelude::*;

    std::fs::create_dir_all(log_dir)?;

    let filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => DEFAULT_FILTER.into(),
    };

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let mut guards = vec![guard];

    let json_layer = if json {
        let trace_appender = tracing_appender::rolling::daily(log_dir, TRACE_FILE_NAME);
        let (trace_non_blocking, trace_guard) = tracing_appender::non_blocking(trace_appender);
        guards.push(trace_guard);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(move || RedactingWriter::new(trace_non_blocking.clone())),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(move || RedactingWriter::new(non_blocking.clone()))
                .with_ansi(false),
        )
        .with(json_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    Ok(LogGuards { _guards: guards })
}

/// Sets up a global panic hook that logs panics using tracing.
pub fn setup_panic_hook() {
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let backtrace = std::backtrace::Backtrace::capture();

        let payload = panic_info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            *s
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.as_str()
        } else {
            "Unknown panic payload"
        };

        let location = match panic_info.location() {
            Some(l) => format!("{}:{}:{}", l.file(), l.line(), l.column()),
            None => "unknown location".to_string(),
        };

        error!(
            target: "panic",
            message = %message,
            location = %location,
            backtrace = %backtrace,
            "FATAL: Application panicked"
        );

        original_hook(panic_info);
    }));
}

/// Per-stream counters, summarized once when the stream terminates.
#[derive(Debug, Default)]
pub struct StreamMetric {
    pub events: usize,
    pub deltas: usize,
    pub text_chars: usize,
    pub tool_requests: usize,
    pub tool_results: usize,
    pub tool_names: Vec<String>,
}

impl StreamMetric {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, event: &StreamEvent) {
        self.events += 1;
        match event {
            StreamEvent::PartialText(text) => {
                self.deltas += 1;
                self.text_chars += text.chars().count();
            }
            StreamEvent::ToolCallRequested { name, .. } => {
                self.tool_requests += 1;
                if !self.tool_names.contains(name) {
                    self.tool_names.push(name.clone());
                }
            }
            StreamEvent::ToolCallCompleted { .. } => self.tool_results += 1,
            StreamEvent::Completed | StreamEvent::Failed(_) => {}
        }
    }

    pub fn log_summary(&self, outcome: &str) {
        let tools_str = if self.tool_names.is_empty() {
            format!("{}", self.tool_requests)
        } else {
            format!("{} ({})", self.tool_requests, self.tool_names.join(", "))
        };

        info!(
            target: "flight_recorder",
            "[STREAM END] {} | Events: {} | Deltas: {} | Tools: {} | Results: {} | Text: {} chars",
            outcome, self.events, self.deltas, tools_str, self.tool_results, self.text_chars
        );
    }
}
