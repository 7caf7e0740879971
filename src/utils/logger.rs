//! Log output for the `patchfex` binary
//!
//! Two setups are supported: `env_logger` on the console (the default, driven
//! by `RUST_LOG`) and a file logger for long extraction runs, selected with
//! `--log-file`. The file logger echoes every record to stderr.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Local;
use log::{Level, LevelFilter, Log, Metadata, Record};

/// File-backed `log` implementation
pub struct Logger {
    file: Mutex<Option<File>>,
    /// Most verbose level recorded
    level: Level,
}

impl Logger {
    /// Create a logger writing to a fresh file
    ///
    /// # Arguments
    ///
    /// * `log_file` - Path of the log file, truncated if it exists
    /// * `level` - Most verbose level to record
    pub fn new(log_file: &Path, level: Level) -> io::Result<Self> {
        let file = File::create(log_file)?;
        Ok(Logger {
            file: Mutex::new(Some(file)),
            level,
        })
    }

    /// Append one timestamped line to the log file
    pub fn write_line(&self, message: &str) -> io::Result<()> {
        let mut guard = self.file.lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "log file lock poisoned"))?;
        if let Some(file) = guard.as_mut() {
            writeln!(file, "{} {}", Local::now().format("%Y-%m-%d %H:%M:%S%.3f"), message)?;
            file.flush()?;
        }
        Ok(())
    }

    /// Install a file logger as the global `log` backend
    pub fn init_global_logger(log_file: &Path, level: Level) -> io::Result<()> {
        let logger = Logger::new(log_file, level)?;

        // Only the first installed logger is kept
        if log::set_boxed_logger(Box::new(logger)).is_err() {
            eprintln!("Warning: a logger is already installed, keeping it");
        }

        log::set_max_level(level.to_level_filter());
        Ok(())
    }

    /// Install `env_logger`; `RUST_LOG` overrides `default_level`
    pub fn init_console_logger(default_level: LevelFilter) {
        let _ = env_logger::Builder::new()
            .filter_level(default_level)
            .parse_default_env()
            .try_init();
    }
}

impl Log for Logger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}: {}", record.level(), record.target(), record.args());
        if let Err(e) = self.write_line(&message) {
            eprintln!("Cannot write log file: {}", e);
        }
        eprintln!("{}", message);
    }

    fn flush(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_timestamped_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.log");
        let logger = Logger::new(&path, Level::Info).unwrap();
        logger.write_line("[INFO] started").unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_end().ends_with("[INFO] started"));
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));
    }
}
