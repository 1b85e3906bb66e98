use crate::errors::CacheError;
use crate::store::DurableStore;
use crate::tiered::entry::StoredEntry;
use crate::tiered::stats::{TieredMetrics, bump};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

enum SlowOp {
    Put { key: String, scope: String, entry: StoredEntry },
    Remove { key: String, scope: String },
    Flush(oneshot::Sender<()>),
}

/// Durable tier. Reads go straight to the store; writes and removals are queued to a
/// single writer task so they apply in submission order without blocking callers.
pub(crate) struct SlowTier {
    store: Arc<dyn DurableStore>,
    tx: Mutex<Option<mpsc::UnboundedSender<SlowOp>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
    metrics: Arc<TieredMetrics>,
}

impl SlowTier {
    /// Spawns the writer on the current tokio runtime.
    pub(crate) fn spawn(store: Arc<dyn DurableStore>, metrics: Arc<TieredMetrics>) -> Result<Self, CacheError> {
        let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = handle.spawn(run_writer(Arc::clone(&store), rx, Arc::clone(&metrics)));
        Ok(Self { store, tx: Mutex::new(Some(tx)), worker: Mutex::new(Some(worker)), metrics })
    }

    /// Errors are logged and read as a miss.
    pub(crate) async fn get(&self, key: &str, scope: &str) -> Option<StoredEntry> {
        match self.store.get(key, scope).await {
            Ok(found) => found,
            Err(e) => {
                bump(&self.metrics.slow_errors);
                log::warn!("slow tier: read of {key} failed: {e}");
                None
            }
        }
    }

    pub(crate) fn enqueue_put(&self, key: &str, scope: &str, entry: StoredEntry) {
        self.send(SlowOp::Put { key: key.to_string(), scope: scope.to_string(), entry });
    }

    pub(crate) fn enqueue_remove(&self, key: &str, scope: &str) {
        self.send(SlowOp::Remove { key: key.to_string(), scope: scope.to_string() });
    }

    fn send(&self, op: SlowOp) {
        let sent = match self.tx.lock().as_ref() {
            Some(tx) => tx.send(op).is_ok(),
            None => false,
        };
        if !sent {
            log::warn!("slow tier: writer is shut down; dropping queued operation");
        }
    }

    /// Wait until everything queued before this call has been applied.
    pub(crate) async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        let sent = match self.tx.lock().as_ref() {
            Some(tx) => tx.send(SlowOp::Flush(done_tx)).is_ok(),
            None => false,
        };
        if sent {
            let _ = done_rx.await;
        }
    }

    /// Close the queue, let the writer drain it, and join the task.
    pub(crate) async fn shutdown(&self) {
        drop(self.tx.lock().take());
        let worker = self.worker.lock().take();
        if let Some(worker) = worker
            && let Err(e) = worker.await
        {
            log::error!("slow tier: writer task ended abnormally: {e}");
        }
    }
}

async fn run_writer(store: Arc<dyn DurableStore>, mut rx: mpsc::UnboundedReceiver<SlowOp>, metrics: Arc<TieredMetrics>) {
    while let Some(op) = rx.recv().await {
        match op {
            SlowOp::Put { key, scope, entry } => {
                if let Err(e) = store.set(&key, &scope, entry).await {
                    bump(&metrics.slow_errors);
                    log::warn!("slow tier: write of {key} failed: {e}");
                }
            }
            SlowOp::Remove { key, scope } => {
                if let Err(e) = store.remove(&key, &scope).await {
                    bump(&metrics.slow_errors);
                    log::warn!("slow tier: remove of {key} failed: {e}");
                }
            }
            SlowOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
    log::debug!("slow tier: writer stopped");
}
