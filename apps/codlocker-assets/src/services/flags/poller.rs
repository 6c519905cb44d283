//! Background refresh of flag snapshots.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{FlagError, FlagHandle, FlagSource};

/// Fetches once from `source` and publishes the result.
///
/// Returns whether the snapshot changed.
pub async fn refresh(source: &dyn FlagSource, handle: &FlagHandle) -> Result<bool, FlagError> {
    let flags = source.fetch().await?;
    Ok(handle.publish(flags))
}

/// Startup fetch, bounded by `timeout`. Failure leaves the defaults in place.
pub async fn initial_refresh(source: &dyn FlagSource, handle: &FlagHandle, timeout: Duration) {
    match tokio::time::timeout(timeout, refresh(source, handle)).await {
        Ok(Ok(_)) => {
            let flags = handle.current();
            tracing::info!(
                source = %source.describe(),
                offline = flags.offline,
                log_level = %flags.log_level,
                "Feature flags ready"
            );
        }
        Ok(Err(e)) => {
            tracing::warn!("Feature flags init warning: {} (flags will use defaults)", e);
        }
        Err(_) => {
            tracing::warn!(
                "Feature flags init timed out after {:?} (flags will use defaults)",
                timeout
            );
        }
    }
}

/// Periodic flag refresher.
pub struct FlagPoller;

impl FlagPoller {
    /// Spawns the refresh loop.
    ///
    /// The first fetch happens one `interval` after spawning; run
    /// [`initial_refresh`] beforehand for a startup value. A failed fetch keeps
    /// the previous snapshot. Dropping the returned handle also stops the loop.
    pub fn spawn(
        source: Arc<dyn FlagSource>,
        interval: Duration,
        handle: FlagHandle,
    ) -> PollerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        tracing::debug!("Flag poller stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match refresh(source.as_ref(), &handle).await {
                            Ok(true) => {
                                let flags = handle.current();
                                tracing::info!(
                                    offline = flags.offline,
                                    log_level = %flags.log_level,
                                    image_storage_location = %flags.image_storage_location,
                                    "Feature flags updated"
                                );
                            }
                            Ok(false) => tracing::trace!("Feature flags unchanged"),
                            Err(e) => tracing::warn!(
                                source = %source.describe(),
                                "Flag refresh failed, keeping previous values: {}",
                                e
                            ),
                        }
                    }
                }
            }
        });

        PollerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Stop signal and join handle for a running [`FlagPoller`].
pub struct PollerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signals the poller to stop and waits for it to exit.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            tracing::warn!("Flag poller exited abnormally: {}", e);
        }
    }
}
