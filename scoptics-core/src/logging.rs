//! Tracing setup for the scoptics binaries
//!
//! Every binary logs to a daily-rotated file at `Config::log_path()`
//! (`~/.local/state/scoptics/scoptics.log`). `RUST_LOG` overrides the
//! configured level. Spans are logged when they close, so each pipeline
//! request ends with a line carrying its request id and elapsed time.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates under the LLM HTTP client that log every connection.
const HTTP_TARGETS: [&str; 3] = ["hyper", "reqwest", "rustls"];

/// Install the global file subscriber.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes buffered lines.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let log_path = Config::log_path();
    let (Some(log_dir), Some(file_name)) = (log_path.parent(), log_path.file_name()) else {
        return Err(Error::Config(format!(
            "invalid log path {}",
            log_path.display()
        )));
    };
    std::fs::create_dir_all(log_dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(file_name.to_string_lossy().into_owned())
        .max_log_files(config.max_files.max(1))
        .build(log_dir)
        .map_err(|e| Error::Config(format!("failed to create log appender: {e}")))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => build_filter(&config.level)?,
    };

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .init();

    tracing::info!(
        log_file = %log_path.display(),
        level = %config.level,
        "Logging initialized"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Filter for a configured level such as `info` or `debug`.
///
/// Above `warn`, the HTTP client crates stay capped at `warn`.
pub fn build_filter(level: &str) -> Result<EnvFilter> {
    let max_level: LevelFilter = level
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid logging.level '{level}'")))?;

    let mut filter = EnvFilter::default().add_directive(max_level.into());
    if max_level > LevelFilter::WARN {
        for target in HTTP_TARGETS {
            let directive: Directive = format!("{target}=warn")
                .parse()
                .map_err(|e| Error::Config(format!("bad log directive for {target}: {e}")))?;
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

/// Initialize logging for tests (logs to stdout)
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .with_span_events(FmtSpan::CLOSE)
        .try_init();
}

/// Flushes pending log lines when dropped.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}
