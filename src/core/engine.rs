use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use parking_lot::Mutex;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use tracing::{debug, info, warn};

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::error::{Error, Result};
use crate::mvcc::controller::{Generation, LiveSegment, MVCCController};
use crate::reader::snapshot_reader::Snapshot;
use crate::storage::checkpoint::{Checkpoint, SegmentEntry};
use crate::storage::file_lock::FileLock;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::Segment;
use crate::storage::segment_reader::SegmentReader;
use crate::writer::index_writer::WriteSession;

struct EngineInner {
    layout: StorageLayout,
    analyzers: Arc<AnalyzerRegistry>,
    mvcc: MVCCController,
    // Serializes checkpoint writes
    commit_lock: Mutex<()>,
    writer_active: AtomicBool,
    _file_lock: FileLock,
}

/// Handle to one open index location
///
/// Cheap to clone. The location stays locked until the last clone drops.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

/// Non-owning engine handle for background tasks
#[derive(Clone)]
pub struct WeakEngine {
    inner: Weak<EngineInner>,
}

impl WeakEngine {
    pub fn upgrade(&self) -> Option<Engine> {
        self.inner.upgrade().map(|inner| Engine { inner })
    }
}

impl Engine {
    /// Opens `location`, creating its directories when missing. A location
    /// that was never committed to opens uninitialized: snapshots fail with
    /// `NotInitialized` until the first commit is refreshed.
    pub fn open_or_create(location: &Path, analyzers: Arc<AnalyzerRegistry>) -> Result<Self> {
        let layout = StorageLayout::new(location.to_path_buf())?;
        let file_lock = FileLock::acquire(&layout)?;

        let head = match Checkpoint::load(&layout)? {
            Some(checkpoint) => {
                let generation = load_generation(&layout, &analyzers, checkpoint)?;
                Some(Arc::new(generation))
            }
            None => None,
        };

        remove_orphan_segments(&layout, head.as_deref())?;

        info!(
            location = %location.display(),
            generation = head.as_ref().map(|g| g.version),
            docs = head.as_ref().map(|g| g.doc_count()),
            "Opened index"
        );

        Ok(Engine {
            inner: Arc::new(EngineInner {
                layout,
                analyzers,
                mvcc: MVCCController::new(head),
                commit_lock: Mutex::new(()),
                writer_active: AtomicBool::new(false),
                _file_lock: file_lock,
            }),
        })
    }

    pub fn location(&self) -> &Path {
        &self.inner.layout.base_dir
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.inner.layout
    }

    pub fn analyzers(&self) -> &Arc<AnalyzerRegistry> {
        &self.inner.analyzers
    }

    /// Starts the single write session. Fails with `Locked` while another
    /// session of this engine is alive.
    pub fn begin_write(&self) -> Result<WriteSession> {
        if self
            .inner
            .writer_active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Locked(self.location().to_path_buf()));
        }

        let base = self
            .inner
            .mvcc
            .committed()
            .unwrap_or_else(|| Arc::new(Generation::empty()));
        Ok(WriteSession::new(self.clone(), base))
    }

    pub(crate) fn end_write(&self) {
        self.inner.writer_active.store(false, Ordering::Release);
    }

    /// Makes `generation` durable and the new committed head.
    pub(crate) fn install(&self, generation: Generation, dropped: &[Arc<Segment>]) -> Result<()> {
        let _guard = self.inner.commit_lock.lock();

        let checkpoint = Checkpoint {
            generation: generation.version,
            segments: generation
                .segments
                .iter()
                .map(|live| SegmentEntry {
                    metadata: live.segment.metadata.clone(),
                    deleted: live.deleted.iter().collect(),
                })
                .collect(),
            manifest: (*generation.manifest).clone(),
            timestamp: Utc::now(),
        };
        checkpoint.save(&self.inner.layout)?;

        for segment in dropped {
            let path = self.inner.layout.segment_path(&segment.id());
            if let Err(e) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "Failed to remove dropped segment");
            }
        }

        self.inner.mvcc.install(Arc::new(generation));
        Ok(())
    }

    pub fn committed(&self) -> Option<Arc<Generation>> {
        self.inner.mvcc.committed()
    }

    /// Point-in-time view of the last published generation.
    pub fn acquire_snapshot(&self) -> Result<Snapshot> {
        self.inner
            .mvcc
            .published()
            .map(Snapshot::new)
            .ok_or_else(|| Error::NotInitialized(self.location().to_path_buf()))
    }

    /// Publishes the last commit to future snapshots.
    pub fn refresh(&self) -> Option<u64> {
        let version = self.inner.mvcc.publish();
        debug!(location = %self.location().display(), generation = version, "Refreshed");
        version
    }

    pub fn committed_version(&self) -> Option<u64> {
        self.inner.mvcc.committed_version()
    }

    pub fn published_version(&self) -> Option<u64> {
        self.inner.mvcc.published_version()
    }

    pub fn downgrade(&self) -> WeakEngine {
        WeakEngine {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

fn load_generation(
    layout: &StorageLayout,
    analyzers: &AnalyzerRegistry,
    checkpoint: Checkpoint,
) -> Result<Generation> {
    let reader = SegmentReader::new(layout, analyzers);

    let segments = checkpoint
        .segments
        .par_iter()
        .map(|entry| {
            let segment = reader.read(&entry.metadata)?;
            Ok(LiveSegment {
                segment: Arc::new(segment),
                deleted: Arc::new(entry.deleted.iter().copied().collect::<RoaringBitmap>()),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Generation {
        version: checkpoint.generation,
        segments,
        manifest: Arc::new(checkpoint.manifest),
        timestamp: checkpoint.timestamp,
    })
}

// Segments written by a commit that never reached its checkpoint
fn remove_orphan_segments(layout: &StorageLayout, head: Option<&Generation>) -> Result<()> {
    let referenced: HashSet<_> = head
        .map(|g| g.segments.iter().map(|s| s.segment.id()).collect())
        .unwrap_or_default();

    for id in layout.segment_files()? {
        if referenced.contains(&id) {
            continue;
        }
        let path = layout.segment_path(&id);
        warn!(path = %path.display(), "Removing orphan segment");
        fs::remove_file(&path)?;
    }
    Ok(())
}
