use anyhow::Result;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use codementor_core::Config;

pub const LOG_FILE: &str = "codementor.log";

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "codementor=debug,codementor_core=debug"
    } else {
        "codementor=info,codementor_core=info"
    }
}

pub fn default_log_path() -> Result<PathBuf> {
    Ok(Config::config_dir()?.join(LOG_FILE))
}

/// Route tracing output to a log file so the terminal UI stays clean.
///
/// `RUST_LOG` overrides the default filter. Keep the returned guard alive
/// until exit or buffered lines are lost.
pub fn init(path: &Path, debug: bool) -> Result<WorkerGuard> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);

    // Only the current user may read the log
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }

    let log_file = log_file_opts.open(path)?;
    let (writer, guard) = tracing_appender::non_blocking(log_file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join(LOG_FILE);

        let guard = init(&path, false).unwrap();
        tracing::info!("log smoke test");
        drop(guard);

        assert!(path.exists());
    }

    #[test]
    fn test_debug_raises_default_level() {
        assert!(default_filter(true).contains("debug"));
        assert!(default_filter(false).contains("info"));
    }
}
