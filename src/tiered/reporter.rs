use crate::tiered::core::Shared;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

/// Background task that periodically purges Fast and Medium and publishes stats.
///
/// Dropping it closes the stop channel; the task ends on its next poll.
pub(crate) struct Reporter {
    stop: Mutex<Option<oneshot::Sender<()>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Reporter {
    /// Spawns on the current tokio runtime, or returns `None` when there is none.
    pub(crate) fn spawn<T>(shared: Arc<Shared<T>>, every: Duration) -> Option<Self>
    where
        T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            // Lazy expiry keeps reads correct; never-read Medium records stay until purged.
            log::warn!("tiered cache: no tokio runtime, periodic purge and stats reports are off");
            return None;
        };
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let task = handle.spawn(async move {
            let mut ticks = interval_at(Instant::now() + every, every);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticks.tick() => {
                        let purged = shared.purge_expired_now();
                        if purged > 0 {
                            log::debug!("tiered cache: periodic purge removed {purged}");
                        }
                        shared.publish_stats();
                    }
                }
            }
            log::debug!("tiered cache: reporter stopped");
        });
        Some(Self { stop: Mutex::new(Some(stop_tx)), task: Mutex::new(Some(task)) })
    }

    /// Signal the task and wait for it to finish.
    pub(crate) async fn shutdown(&self) {
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(());
        }
        let task = self.task.lock().take();
        if let Some(task) = task
            && let Err(e) = task.await
        {
            log::error!("tiered cache: reporter task ended abnormally: {e}");
        }
    }
}
