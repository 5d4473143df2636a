//! File logging.
//!
//! The terminal belongs to the UI, so log records go to a rotating file
//! under the platform data directory. Initialization happens once per
//! process; later calls with the same directory are no-ops.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::info;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const LOG_FILE_BASENAME: &str = "jotter";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 3;

static LOGGING_STATE: OnceLock<LoggingState> = OnceLock::new();

struct LoggingState {
    log_dir: PathBuf,
    _logger: LoggerHandle,
}

#[derive(thiserror::Error, Debug)]
pub enum LoggingError {
    #[error("failed to create log directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("failed to start logger: {0}")]
    Start(#[from] flexi_logger::FlexiLoggerError),
    #[error("logging already initialized at {0:?}")]
    AlreadyInitialized(PathBuf),
}

pub fn init_logging(level: &str, log_dir: &Path) -> Result<(), LoggingError> {
    if let Some(state) = LOGGING_STATE.get() {
        if state.log_dir == log_dir {
            return Ok(());
        }
        return Err(LoggingError::AlreadyInitialized(state.log_dir.clone()));
    }

    std::fs::create_dir_all(log_dir)
        .map_err(|err| LoggingError::CreateDir(log_dir.to_path_buf(), err))?;

    let logger = Logger::try_with_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    let state = LoggingState {
        log_dir: log_dir.to_path_buf(),
        _logger: logger,
    };
    if LOGGING_STATE.set(state).is_err() {
        return Err(LoggingError::AlreadyInitialized(log_dir.to_path_buf()));
    }

    info!(
        "event=app_start version={} platform={} level={} log_dir={}",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        level,
        log_dir.display()
    );
    Ok(())
}

/// Directory used when none is given: `<data dir>/logs`.
pub fn default_log_dir() -> Option<PathBuf> {
    crate::config::project_dirs().map(|dirs| dirs.data_dir().join("logs"))
}

pub fn active_log_dir() -> Option<PathBuf> {
    LOGGING_STATE.get().map(|state| state.log_dir.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent_and_rejects_second_directory() {
        let first = tempfile::tempdir().expect("temp dir");
        let second = tempfile::tempdir().expect("temp dir");

        init_logging("info", first.path()).expect("first init");
        init_logging("info", first.path()).expect("same dir is a no-op");
        assert!(matches!(
            init_logging("info", second.path()),
            Err(LoggingError::AlreadyInitialized(_))
        ));
        assert_eq!(active_log_dir().as_deref(), Some(first.path()));
    }
}
