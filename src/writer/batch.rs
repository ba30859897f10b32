use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::core::config::BatchConfig;
use crate::core::coordinator::IndexCoordinator;
use crate::core::error::{Error, Result};
use crate::record::Record;

struct Queue<R> {
    records: Vec<R>,
    last_enqueue: Instant,
}

struct Inner<R: Record + Clone> {
    coordinator: Arc<IndexCoordinator<R>>,
    config: BatchConfig,
    queue: Mutex<Queue<R>>,
    // Single-flight flag, released by `FlushGuard`
    flushing: AtomicBool,
    // Skip the idle wait once
    drain: AtomicBool,
    finished: Notify,
    flush_count: AtomicU64,
    failure_count: AtomicU64,
    last_failure: Mutex<Option<String>>,
}

/// Coalesces single updates into few large commits
///
/// Enqueued records are upserted by a background flush once no record
/// arrived for the idle threshold, or as soon as the queue reaches the
/// high-water mark. At most one flush runs at a time.
pub struct BatchUpdater<R: Record + Clone> {
    inner: Arc<Inner<R>>,
}

impl<R: Record + Clone> Clone for BatchUpdater<R> {
    fn clone(&self) -> Self {
        BatchUpdater {
            inner: self.inner.clone(),
        }
    }
}

// Releases the flag even when the flush task panics
struct FlushGuard<R: Record + Clone>(Arc<Inner<R>>);

impl<R: Record + Clone> Drop for FlushGuard<R> {
    fn drop(&mut self) {
        self.0.flushing.store(false, Ordering::Release);
        self.0.finished.notify_waiters();

        // Records that arrived while flushing
        if !self.0.queue.lock().records.is_empty() {
            Inner::try_start_flush(&self.0);
        }
    }
}

impl<R: Record + Clone> BatchUpdater<R> {
    pub fn new(coordinator: Arc<IndexCoordinator<R>>, config: BatchConfig) -> Self {
        BatchUpdater {
            inner: Arc::new(Inner {
                coordinator,
                config,
                queue: Mutex::new(Queue {
                    records: Vec::new(),
                    last_enqueue: Instant::now(),
                }),
                flushing: AtomicBool::new(false),
                drain: AtomicBool::new(false),
                finished: Notify::new(),
                flush_count: AtomicU64::new(0),
                failure_count: AtomicU64::new(0),
                last_failure: Mutex::new(None),
            }),
        }
    }

    /// Queues `record` for upsert and returns its id, assigning a fresh one
    /// when missing. Constraint and encoding errors are returned here and
    /// the record is not queued. Must be called inside a tokio runtime.
    pub fn enqueue(&self, mut record: R) -> Result<String> {
        let id = self.inner.coordinator.validate(&mut record)?;
        {
            let mut queue = self.inner.queue.lock();
            queue.last_enqueue = Instant::now();
            queue.records.push(record);
        }
        Inner::try_start_flush(&self.inner);
        Ok(id)
    }

    pub fn enqueue_all(&self, records: impl IntoIterator<Item = R>) -> Result<Vec<String>> {
        records.into_iter().map(|record| self.enqueue(record)).collect()
    }

    /// Flushes everything queued now and waits until the queue is empty.
    /// Fails when a flush failed for good in the meantime.
    pub async fn flush(&self) -> Result<()> {
        let failures = self.failure_count();

        loop {
            let finished = self.inner.finished.notified();
            tokio::pin!(finished);
            finished.as_mut().enable();

            let empty = self.inner.queue.lock().records.is_empty();
            if empty && !self.inner.flushing.load(Ordering::Acquire) {
                break;
            }
            if !empty {
                self.inner.drain.store(true, Ordering::Release);
                Inner::try_start_flush(&self.inner);
            }
            finished.await;
        }
        self.inner.drain.store(false, Ordering::Release);

        if self.failure_count() > failures {
            let reason = self
                .inner
                .last_failure
                .lock()
                .clone()
                .unwrap_or_else(|| "unknown failure".to_string());
            return Err(Error::FlushFailed(reason));
        }
        Ok(())
    }

    /// Records waiting for a flush.
    pub fn pending(&self) -> usize {
        self.inner.queue.lock().records.len()
    }

    /// Successful flushes so far.
    pub fn flush_count(&self) -> u64 {
        self.inner.flush_count.load(Ordering::Acquire)
    }

    /// Flushes that dropped at least one chunk after the fallback failed too.
    pub fn failure_count(&self) -> u64 {
        self.inner.failure_count.load(Ordering::Acquire)
    }

    pub fn is_flushing(&self) -> bool {
        self.inner.flushing.load(Ordering::Acquire)
    }
}

impl<R: Record + Clone> Inner<R> {
    /// Spawns the flush task unless one is running. Only the caller that
    /// flips the flag spawns.
    fn try_start_flush(inner: &Arc<Self>) -> bool {
        if inner
            .flushing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            inner.flushing.store(false, Ordering::Release);
            warn!("No tokio runtime, batch flush not started");
            return false;
        };

        let inner = inner.clone();
        runtime.spawn(async move {
            let guard = FlushGuard(inner);
            guard.0.run_flush().await;
        });
        true
    }

    async fn run_flush(&self) {
        let Some(batch) = self.wait_for_batch().await else {
            return;
        };
        let count = batch.len();
        let started = Instant::now();

        match self.commit_batch(batch).await {
            Ok(chunks) => {
                self.flush_count.fetch_add(1, Ordering::AcqRel);
                info!(
                    records = count,
                    chunks,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Flushed batch"
                );
            }
            Err(e) => {
                self.failure_count.fetch_add(1, Ordering::AcqRel);
                *self.last_failure.lock() = Some(e.to_string());
                error!(records = count, error = %e, "Batch flush incomplete");
            }
        }
    }

    // Polls until the queue went idle or filled up, then takes it whole
    async fn wait_for_batch(&self) -> Option<Vec<R>> {
        let idle_threshold = self.config.idle_threshold();
        let poll_interval = self.config.poll_interval();

        loop {
            {
                let mut queue = self.queue.lock();
                if queue.records.is_empty() {
                    return None;
                }
                let idle = queue.last_enqueue.elapsed() >= idle_threshold;
                let full = queue.records.len() >= self.config.high_water_mark;
                if idle || full || self.drain.swap(false, Ordering::AcqRel) {
                    return Some(std::mem::take(&mut queue.records));
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    // A failed chunk does not stop the ones after it
    async fn commit_batch(&self, mut remaining: Vec<R>) -> Result<usize> {
        let chunk_size = self.config.chunk_size();
        let mut chunks = 0;
        let mut failure = None;

        while !remaining.is_empty() {
            let tail = remaining.split_off(chunk_size.min(remaining.len()));
            let chunk = std::mem::replace(&mut remaining, tail);
            let size = chunk.len();
            match self.commit_chunk(chunk).await {
                Ok(()) => chunks += 1,
                Err(e) => {
                    error!(records = size, error = %e, "Chunk failed, records dropped");
                    failure = Some(e);
                }
            }
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(chunks),
        }
    }

    async fn commit_chunk(&self, chunk: Vec<R>) -> Result<()> {
        let size = chunk.len();
        match self.coordinator.update(chunk.clone()).await {
            Ok(_) => {
                debug!(records = size, "Committed chunk");
                Ok(())
            }
            Err(Error::SchemaMismatchOnWrite(reason)) => {
                warn!(
                    location = %self.coordinator.location().display(),
                    reason = %reason,
                    "Stored field types conflict, rebuilding index"
                );
                let mut contents = self.coordinator.all().await?;
                contents.extend(chunk.iter().cloned());
                self.coordinator.rebuild(contents).await?;

                // A second conflict means the records disagree among themselves
                self.coordinator.update(chunk).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::LazyLock;
    use std::time::Duration;

    use tempfile::TempDir;

    use crate::core::config::Config;
    use crate::core::types::Value;
    use crate::schema::Schema;
    use crate::schema::field::{FieldDescriptor, FieldKind};

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Event {
        id: Option<String>,
        kind: Option<String>,
    }

    static SCHEMA: LazyLock<Arc<Schema>> = LazyLock::new(|| {
        Arc::new(
            Schema::builder("events", "batch-unit")
                .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
                .field(FieldDescriptor::new("kind").kind(FieldKind::Keyword))
                .build()
                .unwrap(),
        )
    });

    impl Record for Event {
        fn schema() -> Arc<Schema> {
            SCHEMA.clone()
        }

        fn get_value(&self, field: &str) -> Option<Value> {
            match field {
                "id" => self.id.clone().map(Value::Str),
                "kind" => self.kind.clone().map(Value::Str),
                _ => None,
            }
        }

        fn set_value(&mut self, field: &str, value: Value) -> Result<()> {
            match (field, value) {
                ("id", Value::Str(s)) => self.id = Some(s),
                ("kind", Value::Str(s)) => self.kind = Some(s),
                (field, value) => {
                    return Err(Error::encoding(field, format!("unexpected {}", value.type_name())));
                }
            }
            Ok(())
        }
    }

    fn event(kind: &str) -> Event {
        Event {
            id: None,
            kind: Some(kind.to_string()),
        }
    }

    async fn open(dir: &TempDir, batch: BatchConfig) -> BatchUpdater<Event> {
        let config = Config::with_storage_path(dir.path());
        let coordinator = IndexCoordinator::<Event>::open(&config).await.unwrap();
        BatchUpdater::new(Arc::new(coordinator), batch)
    }

    #[tokio::test]
    async fn test_enqueue_assigns_ids_and_flush_drains() {
        let dir = TempDir::new().unwrap();
        let updater = open(
            &dir,
            BatchConfig {
                idle_threshold_ms: 60_000,
                ..BatchConfig::default()
            },
        )
        .await;

        let ids = updater.enqueue_all((0..5).map(|_| event("click"))).unwrap();
        assert_eq!(ids.len(), 5);
        assert!(ids.iter().all(|id| id.len() == 32));

        updater.flush().await.unwrap();
        assert_eq!(updater.pending(), 0);
        assert_eq!(updater.flush_count(), 1);
        assert!(!updater.is_flushing());

        let stored = updater.inner.coordinator.all().await.unwrap();
        assert_eq!(stored.len(), 5);
    }

    #[tokio::test]
    async fn test_high_water_mark_flushes_without_idle() {
        let dir = TempDir::new().unwrap();
        let updater = open(
            &dir,
            BatchConfig {
                idle_threshold_ms: 60_000,
                high_water_mark: 4,
                chunk_size: 3,
                poll_interval_ms: 5,
            },
        )
        .await;

        updater.enqueue_all((0..4).map(|_| event("view"))).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while updater.flush_count() == 0 && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(updater.flush_count(), 1);
        assert_eq!(updater.inner.coordinator.all().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_flush_on_empty_queue_returns() {
        let dir = TempDir::new().unwrap();
        let updater = open(&dir, BatchConfig::default()).await;
        updater.flush().await.unwrap();
        assert_eq!(updater.flush_count(), 0);
    }
}
