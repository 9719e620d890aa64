// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Root logger construction.

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;
use slog::o;
use slog::Drain;
use slog::Level;
use slog::Logger;
use std::fs::OpenOptions;

/// Where reconciliation logs go (the `[log]` table of the configuration).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum LogConfig {
    StderrTerminal {
        level: LogLevel,
    },
    File {
        level: LogLevel,
        path: Utf8PathBuf,
        #[serde(default)]
        if_exists: LogIfExists,
    },
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig::StderrTerminal { level: LogLevel::Info }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogIfExists {
    Fail,
    Truncate,
    #[default]
    Append,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Level {
        match level {
            LogLevel::Trace => Level::Trace,
            LogLevel::Debug => Level::Debug,
            LogLevel::Info => Level::Info,
            LogLevel::Warn => Level::Warning,
            LogLevel::Error => Level::Error,
            LogLevel::Critical => Level::Critical,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("failed to open log file {path}")]
pub struct LogFileError {
    pub path: Utf8PathBuf,
    #[source]
    pub err: std::io::Error,
}

impl LogConfig {
    /// Build the root logger described by this configuration.
    pub fn to_logger(
        &self,
        name: &'static str,
    ) -> Result<Logger, LogFileError> {
        match self {
            LogConfig::StderrTerminal { level } => {
                let decorator = slog_term::TermDecorator::new().build();
                let drain =
                    slog_term::FullFormat::new(decorator).build().fuse();
                Ok(async_root_logger(name, *level, drain))
            }
            LogConfig::File { level, path, if_exists } => {
                let mut open_options = OpenOptions::new();
                open_options.write(true).create(true);
                match if_exists {
                    LogIfExists::Fail => {
                        open_options.create_new(true);
                    }
                    LogIfExists::Truncate => {
                        open_options.truncate(true);
                    }
                    LogIfExists::Append => {
                        open_options.append(true);
                    }
                }
                let file = open_log_file(&open_options, path)?;
                let decorator = slog_term::PlainDecorator::new(file);
                let drain =
                    slog_term::FullFormat::new(decorator).build().fuse();
                Ok(async_root_logger(name, *level, drain))
            }
        }
    }
}

fn open_log_file(
    open_options: &OpenOptions,
    path: &Utf8Path,
) -> Result<std::fs::File, LogFileError> {
    let to_err = |err| LogFileError { path: path.to_owned(), err };
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(to_err)?;
        }
    }
    open_options.open(path).map_err(to_err)
}

// The async drain takes care of synchronization between reconciliations
// logging from different tasks.
fn async_root_logger<T>(name: &'static str, level: LogLevel, drain: T) -> Logger
where
    T: Drain + Send + 'static,
    <T as Drain>::Err: std::fmt::Debug,
{
    let level_drain = slog::LevelFilter(drain, Level::from(level)).fuse();
    let async_drain = slog_async::Async::new(level_drain).build().fuse();
    Logger::root(async_drain, o!("component" => name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use slog::info;

    #[test]
    fn default_logs_to_stderr_at_info() {
        assert_eq!(
            LogConfig::default(),
            LogConfig::StderrTerminal { level: LogLevel::Info }
        );
    }

    #[test]
    fn parse_file_mode() {
        let config: LogConfig = toml::from_str(
            r#"
            mode = "file"
            level = "debug"
            path = "/var/log/reconciler.log"
            "#,
        )
        .unwrap();
        assert_eq!(
            config,
            LogConfig::File {
                level: LogLevel::Debug,
                path: "/var/log/reconciler.log".into(),
                if_exists: LogIfExists::Append,
            }
        );
    }

    #[test]
    fn bad_mode_is_rejected() {
        let err = toml::from_str::<LogConfig>(
            "mode = \"syslog\"\nlevel = \"info\"\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown variant"), "{err}");
    }

    #[test]
    fn file_logger_creates_parent_directories() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("nested/reconciler.log");
        let config = LogConfig::File {
            level: LogLevel::Info,
            path: path.clone(),
            if_exists: LogIfExists::Truncate,
        };
        let log = config.to_logger("test").unwrap();
        info!(log, "hello");
        drop(log);
        assert!(path.exists());
    }

    #[test]
    fn file_logger_fail_if_exists() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("reconciler.log");
        std::fs::write(&path, "").unwrap();
        let config = LogConfig::File {
            level: LogLevel::Info,
            path: path.clone(),
            if_exists: LogIfExists::Fail,
        };
        let err = config.to_logger("test").unwrap_err();
        assert_eq!(err.path, path);
        assert_eq!(err.err.kind(), std::io::ErrorKind::AlreadyExists);
    }
}
