//! Logging setup driven by the front end's flags.
//!
//! Stdout carries the transcript, so records go to stderr or to a JSONL file.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INSTALLED: OnceCell<LogSink> = OnceCell::new();

pub const DEFAULT_FILTER: &str = "warn";
const FALLBACK_LOG_FILE: &str = "fast-agent.logs.jsonl";

/// Where log records are written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LogSink {
    Off,
    #[default]
    Stderr,
    /// One JSON object per line, appended to this file.
    JsonFile(PathBuf),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub sink: LogSink,
    /// Filter directive such as `debug` or `fast_agent_ui=trace`.
    pub filter: Option<String>,
}

impl LogSettings {
    pub fn new(sink: LogSink, filter: Option<String>) -> Self {
        Self { sink, filter }
    }

    /// The explicit filter wins, then `rust_log`, then [`DEFAULT_FILTER`].
    /// Directives that do not parse fall through to the next candidate.
    pub fn resolve_filter(&self, rust_log: Option<&str>) -> String {
        [self.filter.as_deref(), rust_log]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|directive| !directive.is_empty() && EnvFilter::try_new(directive).is_ok())
            .unwrap_or(DEFAULT_FILTER)
            .to_string()
    }
}

/// Splits a log file path into the directory and file name the appender wants.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(FALLBACK_LOG_FILE)
        .to_string();
    (dir, file_name)
}

/// Installs the global subscriber described by `settings`.
///
/// Only the first call in a process has an effect; every call returns the
/// sink that is actually in use.
pub fn init_observability(settings: &LogSettings) -> &'static LogSink {
    INSTALLED.get_or_init(|| {
        let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
        let filter = EnvFilter::new(settings.resolve_filter(rust_log.as_deref()));

        match &settings.sink {
            LogSink::Off => {}
            LogSink::Stderr => {
                let console = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(console)
                    .try_init();
            }
            LogSink::JsonFile(path) => {
                let (dir, file_name) = split_log_path(path);
                let _ = std::fs::create_dir_all(&dir);
                let json = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file_name));
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(json)
                    .try_init();
            }
        }
        settings.sink.clone()
    })
}
