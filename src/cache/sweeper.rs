use crate::cache::core::Shared;
use crate::cache::policy::sweep_expired;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;

/// Background thread that periodically purges expired entries and publishes stats.
///
/// Dropping the handle closes the stop channel and joins the thread.
pub(crate) struct Sweeper {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    pub(crate) fn spawn<T: Send + 'static>(shared: Arc<Shared<T>>) -> Option<Self> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let name = format!("tiercache-sweep-{}", shared.config.name);
        let spawned = std::thread::Builder::new().name(name).spawn(move || {
            let interval = shared.config.sweep_interval;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let evicted = sweep_expired(&shared);
                        if evicted > 0 {
                            log::debug!("cache {}: sweep evicted {evicted}", shared.config.name);
                        }
                        shared.publish_stats();
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        match spawned {
            Ok(handle) => Some(Self { stop: Some(stop_tx), handle: Some(handle) }),
            Err(e) => {
                // Lazy expiry keeps reads correct; only memory for never-read keys is unbounded.
                log::error!("failed to start cache sweeper: {e}");
                None
            }
        }
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        if let Some(tx) = self.stop.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("cache sweeper thread panicked");
        }
    }
}
