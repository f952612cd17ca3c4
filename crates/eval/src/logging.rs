use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::{LogRotation, LoggingConfig};

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Minutely => Rotation::MINUTELY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Install console (stderr) and rolling-file logging once for the process.
///
/// The returned guard flushes the file writer on drop; keep it alive in `main`.
pub fn init(config: &LoggingConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log dir: {}", config.log_dir.display()))?;

    let (prefix, suffix) = split_file_name(&config.file_name);

    let mut builder = RollingFileAppender::builder()
        .rotation(config.rotation.into())
        .filename_prefix(prefix)
        .filename_suffix(suffix);
    if config.max_files > 0 {
        builder = builder.max_log_files(config.max_files);
    }
    let file_appender = builder
        .build(&config.log_dir)
        .context("Failed to create log file appender")?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if config.verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Logging was already initialized")?;

    eprintln!(
        "ragbench log files: {}",
        config.log_dir.join(file_pattern(config)).display()
    );
    Ok(guard)
}

fn split_file_name(file_name: &str) -> (&str, &str) {
    file_name.rsplit_once('.').unwrap_or((file_name, "log"))
}

/// Name of the files the appender writes; time-rotated files carry the period
/// between prefix and suffix.
fn file_pattern(config: &LoggingConfig) -> String {
    let (prefix, suffix) = split_file_name(&config.file_name);
    match config.rotation {
        LogRotation::Never => format!("{prefix}.{suffix}"),
        _ => format!("{prefix}.<date>.{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(file_name: &str, rotation: LogRotation) -> LoggingConfig {
        LoggingConfig {
            file_name: file_name.to_string(),
            rotation,
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_file_pattern_includes_rotation_period() {
        assert_eq!(
            file_pattern(&config("ragbench.log", LogRotation::Daily)),
            "ragbench.<date>.log"
        );
        assert_eq!(
            file_pattern(&config("ragbench.log", LogRotation::Never)),
            "ragbench.log"
        );
        assert_eq!(file_pattern(&config("bench", LogRotation::Never)), "bench.log");
    }
}
