//! Tracing setup.
//!
//! Log output stays off stdout so command results remain pipeable: on Linux
//! events go to systemd-journald when it is reachable, otherwise (and on
//! other platforms) to a daily-rolled file under the local data directory.
//! Verbosity is driven by the `ATELIER_LOG` environment variable, defaulting
//! to `info`.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Call once, before any library work;
/// `log_dir` overrides the default file location when journald is not used.
pub fn init(log_dir: Option<PathBuf>) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_env("ATELIER_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(journald_layer)
                .init();
            tracing::info!("logging to journald");
            return Ok(());
        }
    }

    let log_dir = log_dir.unwrap_or_else(|| {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("atelier")
            .join("logs")
    });
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "atelier.log");
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    // The worker guard must outlive the process or buffered events are lost.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .init();
    tracing::info!(dir = %log_dir.display(), "logging to rolling file");
    Ok(())
}
