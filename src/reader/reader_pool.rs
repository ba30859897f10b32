use tokio::sync::watch;
use tracing::debug;

use crate::core::engine::Engine;
use crate::core::error::Result;
use crate::reader::snapshot_reader::Snapshot;

/// Hands out snapshots of an engine and keeps them fresh
///
/// Commits are published by a background task on `signal_refresh`. A
/// caller that acquires before that task ran refreshes inline, so a read
/// issued after a write returns always observes the write.
pub struct ReaderPool {
    engine: Engine,
    refresh_tx: watch::Sender<u64>,
}

impl ReaderPool {
    /// Must be called inside a tokio runtime; spawns the refresh task.
    pub fn new(engine: Engine) -> Self {
        let (refresh_tx, mut refresh_rx) = watch::channel(0u64);
        let weak = engine.downgrade();

        tokio::spawn(async move {
            // Ends when the pool (and its sender) is dropped.
            while refresh_rx.changed().await.is_ok() {
                let requested = *refresh_rx.borrow_and_update();
                let Some(engine) = weak.upgrade() else {
                    break;
                };
                let published = engine.refresh();
                debug!(requested, published, "Background refresh");
            }
        });

        ReaderPool { engine, refresh_tx }
    }

    /// Asks the background task to publish commit `version`.
    pub fn signal_refresh(&self, version: u64) {
        self.refresh_tx.send_replace(version);
    }

    pub fn acquire(&self) -> Result<Snapshot> {
        if self.is_stale() {
            self.engine.refresh();
        }
        self.engine.acquire_snapshot()
    }

    /// Whether a commit exists that snapshots do not see yet.
    pub fn is_stale(&self) -> bool {
        self.engine.committed_version() > self.engine.published_version()
    }
}
