// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reconciler configuration.

use crate::logging::LogConfig;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use serde::Serialize;
use serde_with::serde_as;
use serde_with::DurationSeconds;
use std::time::Duration;

/// Upper bound on concurrently running reconciliations, unless configured.
pub const DEFAULT_MAX_PARALLELISM: usize = 16;

const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_secs(300);

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReconcilerConfig {
    /// Bound on each fetch (including the verification re-fetch).
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: Duration,

    /// Bound on each apply.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_apply_timeout")]
    pub apply_timeout: Duration,

    /// Re-fetch after a successful apply and confirm convergence.
    #[serde(default = "default_verify_after_apply")]
    pub verify_after_apply: bool,

    #[serde(default = "default_max_parallelism")]
    pub max_parallelism: usize,

    #[serde(default)]
    pub log: LogConfig,
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

fn default_apply_timeout() -> Duration {
    DEFAULT_APPLY_TIMEOUT
}

fn default_verify_after_apply() -> bool {
    true
}

fn default_max_parallelism() -> usize {
    DEFAULT_MAX_PARALLELISM
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
            verify_after_apply: true,
            max_parallelism: DEFAULT_MAX_PARALLELISM,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config from {path}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("Failed to parse config from {path}")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
}

impl ReconcilerConfig {
    pub fn from_file<P: AsRef<Utf8Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Io { path: path.into(), err })?;
        let config = toml::from_str(&contents)
            .map_err(|err| ConfigError::Parse { path: path.into(), err })?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use assert_matches::assert_matches;
    use camino_tempfile::Utf8TempDir;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ReconcilerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ReconcilerConfig::default());
        assert!(config.verify_after_apply);
        assert_eq!(config.max_parallelism, 16);
    }

    #[test]
    fn from_file() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("reconciler.toml");
        std::fs::write(
            &path,
            r#"
            fetch_timeout = 10
            apply_timeout = 120
            verify_after_apply = false
            max_parallelism = 4

            [log]
            mode = "stderr-terminal"
            level = "debug"
            "#,
        )
        .unwrap();

        let config = ReconcilerConfig::from_file(&path).unwrap();
        assert_eq!(config.fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.apply_timeout, Duration::from_secs(120));
        assert!(!config.verify_after_apply);
        assert_eq!(config.max_parallelism, 4);
        assert_eq!(
            config.log,
            LogConfig::StderrTerminal { level: LogLevel::Debug }
        );
    }

    #[test]
    fn missing_file() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("nope.toml");
        let err = ReconcilerConfig::from_file(&path).unwrap_err();
        assert_matches!(err, ConfigError::Io { path: p, .. } if p == path);
    }

    #[test]
    fn malformed_file() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "fetch_timeout = \"soon\"\n").unwrap();
        let err = ReconcilerConfig::from_file(&path).unwrap_err();
        assert_matches!(err, ConfigError::Parse { .. });

        std::fs::write(&path, "fetch_timout = 3\n").unwrap();
        let err = ReconcilerConfig::from_file(&path).unwrap_err();
        assert_matches!(err, ConfigError::Parse { .. });
    }
}
