//! Tracing subscriber setup.

use anyhow::Result;
use std::path::Path;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

/// Prefix of the rolling log files.
pub const LOG_FILE_PREFIX: &str = "apm-tracker";

/// Number of daily log files kept.
const MAX_LOG_FILES: usize = 5;

/// Build the filter directive.
///
/// An explicit level wins, then `RUST_LOG`, then the level from settings.
pub fn resolve_filter(cli_level: Option<&str>, env: Option<String>, settings_level: &str) -> String {
    let crate_name = env!("CARGO_PKG_NAME").replace('-', "_");
    match (cli_level, env) {
        (Some(level), _) => format!("{crate_name}={level}"),
        (None, Some(env)) if !env.trim().is_empty() => env,
        _ => format!("{crate_name}={settings_level}"),
    }
}

/// Install the global subscriber.
///
/// Logs go to stderr when `show_std` is set and, if `log_dir` is given, to
/// a daily rolling file inside it.
pub fn enable_logging(
    log_dir: Option<&Path>,
    cli_level: Option<&str>,
    settings_level: &str,
    show_std: bool,
) -> Result<()> {
    let directive = resolve_filter(cli_level, std::env::var("RUST_LOG").ok(), settings_level);
    let filter = EnvFilter::try_new(&directive)
        .or_else(|_| EnvFilter::try_new(resolve_filter(None, None, "info")))?;

    let stderr = std::io::stderr.with_filter(move |_| show_std);
    let writer = match log_dir {
        Some(dir) => {
            let appender = Builder::new()
                .rotation(Rotation::DAILY)
                .max_log_files(MAX_LOG_FILES)
                .filename_prefix(LOG_FILE_PREFIX)
                .filename_suffix("log")
                .build(dir)?;
            BoxMakeWriter::new(stderr.and(appender))
        }
        None => BoxMakeWriter::new(stderr),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;
    Ok(())
}
