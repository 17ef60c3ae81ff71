//! Runtime configuration.
//!
//! Tunable parameters grouped by component, with defaults taken from
//! [`crate::constants`] and optional environment variable overrides.

use std::path::PathBuf;
use std::time::Duration;

use crate::constants::{
    MAX_DATA_LENGTH, PEER_READ_TIMEOUT, PEER_WRITE_TIMEOUT, PROGRESS_POLL_INTERVAL, SESSION_DIR,
};

/// Configuration for every component of the crate.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub peer: PeerConfig,
    pub storage: StorageConfig,
    pub progress: ProgressConfig,
}

/// Peer wire protocol settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Largest Piece payload accepted from a peer
    pub max_data_length: u32,
    /// Time allowed for one inbound frame to arrive
    pub read_timeout: Duration,
    /// Time allowed for one outbound frame to be written
    pub write_timeout: Duration,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            max_data_length: MAX_DATA_LENGTH,
            read_timeout: PEER_READ_TIMEOUT,
            write_timeout: PEER_WRITE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    /// Directory holding one persisted session file per torrent
    pub session_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            session_dir: PathBuf::from(SESSION_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressConfig {
    /// Period of the coalescing change poller
    pub poll_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            poll_interval: PROGRESS_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Creates configuration with environment variable overrides.
    ///
    /// Recognized variables are `BITPIECE_MAX_DATA_LENGTH`,
    /// `BITPIECE_SESSION_DIR` and `BITPIECE_POLL_INTERVAL_MS`. Values that do
    /// not parse leave the default in place.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(length) = lookup("BITPIECE_MAX_DATA_LENGTH") {
            match length.parse::<u32>() {
                Ok(length) => config.peer.max_data_length = length,
                Err(_) => tracing::warn!(value = %length, "ignoring invalid BITPIECE_MAX_DATA_LENGTH"),
            }
        }

        if let Some(dir) = lookup("BITPIECE_SESSION_DIR") {
            if !dir.is_empty() {
                config.storage.session_dir = PathBuf::from(dir);
            }
        }

        if let Some(interval) = lookup("BITPIECE_POLL_INTERVAL_MS") {
            match interval.parse::<u64>() {
                Ok(ms) if ms > 0 => config.progress.poll_interval = Duration::from_millis(ms),
                _ => tracing::warn!(value = %interval, "ignoring invalid BITPIECE_POLL_INTERVAL_MS"),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.peer.max_data_length, 131072);
        assert_eq!(config.peer.read_timeout, Duration::from_secs(120));
        assert_eq!(config.storage.session_dir, PathBuf::from("data"));
        assert_eq!(config.progress.poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("BITPIECE_MAX_DATA_LENGTH", "16384"),
            ("BITPIECE_SESSION_DIR", "/var/lib/bitpiece"),
            ("BITPIECE_POLL_INTERVAL_MS", "250"),
        ]));
        assert_eq!(config.peer.max_data_length, 16384);
        assert_eq!(config.storage.session_dir, PathBuf::from("/var/lib/bitpiece"));
        assert_eq!(config.progress.poll_interval, Duration::from_millis(250));
    }

    #[test]
    fn test_each_invalid_override_is_ignored_alone() {
        let config = Config::from_lookup(lookup(&[
            ("BITPIECE_MAX_DATA_LENGTH", "-1"),
            ("BITPIECE_POLL_INTERVAL_MS", "500"),
        ]));
        assert_eq!(config.peer.max_data_length, MAX_DATA_LENGTH);
        assert_eq!(config.progress.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_overrides_keep_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("BITPIECE_MAX_DATA_LENGTH", "lots"),
            ("BITPIECE_POLL_INTERVAL_MS", "0"),
        ]));
        assert_eq!(config.peer, PeerConfig::default());
        assert_eq!(config.progress, ProgressConfig::default());
    }
}
