//! Dynamic feature flags.
//!
//! Flags are published as immutable [`Flags`] snapshots over a watch channel.
//! Request handlers read the latest snapshot through a [`FlagHandle`]; a single
//! [`FlagPoller`] task refreshes it from a [`FlagSource`].

mod poller;
mod source;

pub use poller::{initial_refresh, refresh, FlagPoller, PollerHandle};
pub use source::{build_source, read_env_key, FileFlagSource, FlagSource, HttpFlagSource};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

use crate::services::storage::StorageLocation;

/// Errors raised while loading flags or the flag service key.
#[derive(Error, Debug)]
pub enum FlagError {
    #[error("read {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("file {0:?} empty")]
    EmptyKey(PathBuf),

    #[error("parse JSON in {path:?}: {source}")]
    InvalidKeyFile {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("no envKey in JSON {0:?}")]
    MissingKey(PathBuf),

    #[error("invalid flag document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("flag request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("flag source misconfigured: {0}")]
    Misconfigured(&'static str),
}

/// Log verbosity selected by the `logLevel` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Unknown names fall back to `info`.
impl From<&str> for LogLevel {
    fn from(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }
}

impl From<String> for LogLevel {
    fn from(value: String) -> Self {
        LogLevel::from(value.as_str())
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable snapshot of every flag the service reads.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Flags {
    /// Kill switch: reject everything except probes.
    pub offline: bool,
    pub enable_tutorial: bool,
    pub log_level: LogLevel,
    pub image_storage_location: StorageLocation,
}

/// Shared access to the latest flag snapshot.
#[derive(Clone)]
pub struct FlagHandle {
    tx: Arc<watch::Sender<Arc<Flags>>>,
}

impl FlagHandle {
    pub fn new(initial: Flags) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(initial));
        Self { tx: Arc::new(tx) }
    }

    /// Returns the current snapshot.
    pub fn current(&self) -> Arc<Flags> {
        self.tx.borrow().clone()
    }

    /// Publishes `flags` if they differ from the current snapshot.
    ///
    /// Returns whether a new snapshot was published.
    pub fn publish(&self, flags: Flags) -> bool {
        self.tx.send_if_modified(|current| {
            if **current == flags {
                return false;
            }
            *current = Arc::new(flags);
            true
        })
    }

    /// Subscribes to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Flags>> {
        self.tx.subscribe()
    }
}

impl Default for FlagHandle {
    fn default() -> Self {
        Self::new(Flags::default())
    }
}

/// Parses a flag document, preferring the object under `namespace` when present.
///
/// Accepts `{"offline": true}` as well as `{"default": {"offline": true}}`.
pub fn parse_flags(document: &str, namespace: &str) -> Result<Flags, FlagError> {
    let mut value: serde_json::Value = serde_json::from_str(document)?;
    if let Some(scoped) = value.get_mut(namespace).filter(|v| v.is_object()) {
        value = scoped.take();
    }
    Ok(serde_json::from_value(value)?)
}
