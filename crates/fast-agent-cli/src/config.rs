use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use fast_agent_ui::upload::DEFAULT_ALLOWED_FILE_TYPES;
use fast_agent_ui::{LogSettings, LogSink};

/// Command line for the terminal chat front end.
#[derive(Parser, Debug, Default)]
#[command(name = "fast-agent", about = "Chat with a stepwise agent in the terminal")]
pub struct Cli {
    /// Agent script (JSON). The built-in demo agent is used when absent.
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Folder that receives uploaded files. Uploads are disabled when absent.
    #[arg(long)]
    pub upload_folder: Option<PathBuf>,

    /// Comma-separated list of accepted upload extensions
    #[arg(long, value_delimiter = ',')]
    pub allowed_file_types: Option<Vec<String>>,

    /// Ask the agent to forget earlier turns before every run
    #[arg(long)]
    pub reset_memory: bool,

    /// Interface name shown in the banner
    #[arg(long)]
    pub name: Option<String>,

    /// Interface description shown in the banner
    #[arg(long)]
    pub description: Option<String>,

    /// Print every transcript snapshot as one JSON line
    #[arg(long)]
    pub json: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Disable logging
    #[arg(short, long)]
    pub quiet: bool,

    /// Log filter directive, e.g. `fast_agent_ui=debug`. Overrides -v.
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Write JSONL logs to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

/// Resolved settings after applying environment fallbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub script: Option<PathBuf>,
    pub upload_folder: Option<PathBuf>,
    pub allowed_file_types: Vec<String>,
    pub reset_memory: bool,
    pub name: Option<String>,
    pub description: Option<String>,
    pub json: bool,
    pub log: LogSettings,
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Self {
        Self::resolve(cli, |key| std::env::var(key).ok())
    }

    /// Flags win over environment variables.
    pub fn resolve(cli: Cli, env: impl Fn(&str) -> Option<String>) -> Self {
        let env_value = |key: &str| env(key).filter(|v| !v.trim().is_empty());
        let allowed_file_types = cli
            .allowed_file_types
            .map(|types| {
                types
                    .into_iter()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_ALLOWED_FILE_TYPES.map(String::from).to_vec());

        let sink = if cli.quiet {
            LogSink::Off
        } else if let Some(path) = cli
            .log_file
            .or_else(|| env_value("FAST_AGENT_LOG_FILE").map(PathBuf::from))
        {
            LogSink::JsonFile(path)
        } else {
            LogSink::Stderr
        };
        let filter = cli
            .log_level
            .or_else(|| verbosity_filter(cli.verbose).map(String::from))
            .or_else(|| env_value("FAST_AGENT_LOG_LEVEL"));

        Self {
            script: cli
                .script
                .or_else(|| env_value("FAST_AGENT_SCRIPT").map(PathBuf::from)),
            upload_folder: cli
                .upload_folder
                .or_else(|| env_value("FAST_AGENT_UPLOAD_FOLDER").map(PathBuf::from)),
            allowed_file_types,
            reset_memory: cli.reset_memory
                || env_value("FAST_AGENT_RESET_MEMORY")
                    .and_then(|v| parse_bool(&v))
                    .unwrap_or(false),
            name: cli.name,
            description: cli.description,
            json: cli.json,
            log: LogSettings::new(sink, filter),
        }
    }
}

fn verbosity_filter(count: u8) -> Option<&'static str> {
    match count {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Loads `.env` from the crate directory, then from the working directory.
pub fn init_env() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}
