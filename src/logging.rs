use crate::models::PanelConfig;
use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use std::fs;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// How and where to log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingOptions {
    /// Directory for log files (e.g., "logs")
    pub log_dir: String,
    /// Prefix for log files (e.g., "painel")
    pub log_prefix: String,
    /// Debug level instead of info (ignored when `RUST_LOG` is set)
    pub debug_mode: bool,
    /// One JSON object per line in the log file
    pub json: bool,
    /// Also log to the console
    pub console: bool,
}

impl LoggingOptions {
    pub fn from_config(config: &PanelConfig, console: bool) -> Self {
        Self {
            log_dir: config.log_dir.clone(),
            log_prefix: crate::APP_NAME.to_string(),
            debug_mode: config.debug_mode,
            json: config.json_logs,
            console,
        }
    }

    /// Filter from `RUST_LOG` when set, otherwise debug or info
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            if self.debug_mode {
                EnvFilter::new("debug")
            } else {
                EnvFilter::new("info")
            }
        })
    }
}

/// Setup logging with a daily rotating file appender.
///
/// The file layer is plain text (no ANSI codes) or JSON; an optional console
/// layer with colours is added for interactive runs.
///
/// # Arguments
/// * `options` - Directory, prefix, level and output selection
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
///
/// # Errors
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed
pub fn setup_logging(options: &LoggingOptions) -> Result<WorkerGuard> {
    // Create log directory if it doesn't exist
    let log_path = Utf8PathBuf::from(&options.log_dir);
    if !log_path.exists() {
        fs::create_dir_all(&log_path)
            .with_context(|| format!("Failed to create log directory: {}", options.log_dir))?;
    }

    // Create daily rotating file appender
    let file_appender = rolling::daily(&options.log_dir, &options.log_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = options.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(non_blocking.clone())
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let text_layer = (!options.json).then(|| {
        fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false) // No ANSI codes in log files
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = options
        .console
        .then(|| fmt::layer().with_ansi(true).with_target(false));

    tracing_subscriber::registry()
        .with(options.env_filter())
        .with(json_layer)
        .with(text_layer)
        .with(console_layer)
        .try_init()
        .context("Failed to install the global tracing subscriber")?;

    tracing::info!(
        "Logging initialized: dir={}, prefix={}, debug={}, json={}, console={}",
        options.log_dir,
        options.log_prefix,
        options.debug_mode,
        options.json,
        options.console
    );

    Ok(guard)
}
