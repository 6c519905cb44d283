//! Tracing setup with a log level that can change at runtime.

use std::sync::{Arc, RwLock};

use tokio::task::JoinHandle;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::services::flags::{FlagHandle, LogLevel};

/// Filter directives for `level`: our crate at `level`, dependencies capped at `warn`.
pub fn directive(level: LogLevel) -> String {
    let deps = match level {
        LogLevel::Debug | LogLevel::Info => LogLevel::Warn,
        other => other,
    };
    format!("{}={},{}", env!("CARGO_CRATE_NAME"), level, deps)
}

/// Handle for swapping the active filter.
#[derive(Clone)]
pub struct LogLevelHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    level: Arc<RwLock<LogLevel>>,
}

impl LogLevelHandle {
    pub fn new(filter: reload::Handle<EnvFilter, Registry>, level: LogLevel) -> Self {
        Self {
            filter,
            level: Arc::new(RwLock::new(level)),
        }
    }

    /// Returns the level most recently applied.
    pub fn level(&self) -> LogLevel {
        *self.level.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Replaces the active filter with the one for `level`.
    pub fn set(&self, level: LogLevel) -> Result<(), reload::Error> {
        self.filter.reload(EnvFilter::new(directive(level)))?;
        *self.level.write().unwrap_or_else(|e| e.into_inner()) = level;
        Ok(())
    }
}

/// Installs the global subscriber.
///
/// `RUST_LOG` wins for startup output when set; otherwise `initial` applies.
pub fn init_tracing(initial: LogLevel) -> LogLevelHandle {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(directive(initial)));
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(tracing_subscriber::fmt::layer())
        .init();

    LogLevelHandle::new(handle, initial)
}

/// Applies `logLevel` flag changes to the subscriber until the flag channel closes.
pub fn spawn_level_watcher(flags: &FlagHandle, levels: LogLevelHandle) -> JoinHandle<()> {
    let mut rx = flags.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let level = rx.borrow_and_update().log_level;
            if level == levels.level() {
                continue;
            }
            match levels.set(level) {
                Ok(()) => tracing::info!("log level changed to {}", level),
                Err(e) => tracing::warn!("Failed to change log level to {}: {}", level, e),
            }
        }
    })
}
