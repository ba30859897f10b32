use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use roaring::RoaringBitmap;

use crate::index::manifest::FieldManifest;
use crate::storage::segment::Segment;

/// A committed segment together with the deletions applied to it
#[derive(Debug, Clone)]
pub struct LiveSegment {
    pub segment: Arc<Segment>,
    pub deleted: Arc<RoaringBitmap>,
}

impl LiveSegment {
    pub fn new(segment: Arc<Segment>) -> Self {
        LiveSegment {
            segment,
            deleted: Arc::new(RoaringBitmap::new()),
        }
    }

    pub fn is_live(&self, doc: u32) -> bool {
        doc < self.segment.doc_count() && !self.deleted.contains(doc)
    }

    pub fn live_count(&self) -> u64 {
        self.segment.doc_count() as u64 - self.deleted_count()
    }

    pub fn deleted_count(&self) -> u64 {
        self.deleted.len()
    }

    pub fn live_docs(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.segment.doc_count()).filter(move |doc| !self.deleted.contains(*doc))
    }
}

/// Immutable state of the index at one commit
#[derive(Debug, Clone)]
pub struct Generation {
    pub version: u64,
    pub segments: Vec<LiveSegment>,
    pub manifest: Arc<FieldManifest>,
    pub timestamp: DateTime<Utc>,
}

impl Generation {
    /// State of a location nothing was ever committed to.
    pub fn empty() -> Self {
        Generation {
            version: 0,
            segments: Vec::new(),
            manifest: Arc::new(FieldManifest::new()),
            timestamp: Utc::now(),
        }
    }

    pub fn doc_count(&self) -> u64 {
        self.segments.iter().map(LiveSegment::live_count).sum()
    }

    pub fn deleted_count(&self) -> u64 {
        self.segments.iter().map(LiveSegment::deleted_count).sum()
    }
}

/// Multi-Version Concurrency Control
///
/// Tracks two generations: the last one committed by the writer, and the
/// one published to new snapshots. They differ between a commit and the
/// following refresh. Old generations live on for as long as a snapshot
/// holds them.
pub struct MVCCController {
    committed: RwLock<Option<Arc<Generation>>>,
    published: RwLock<Option<Arc<Generation>>>,
}

impl MVCCController {
    /// Starts with `head` both committed and published.
    pub fn new(head: Option<Arc<Generation>>) -> Self {
        MVCCController {
            committed: RwLock::new(head.clone()),
            published: RwLock::new(head),
        }
    }

    pub fn committed(&self) -> Option<Arc<Generation>> {
        self.committed.read().clone()
    }

    pub fn published(&self) -> Option<Arc<Generation>> {
        self.published.read().clone()
    }

    pub fn install(&self, generation: Arc<Generation>) {
        *self.committed.write() = Some(generation);
    }

    /// Publishes the committed generation. Returns its version.
    pub fn publish(&self) -> Option<u64> {
        let committed = self.committed();
        let version = committed.as_ref().map(|g| g.version);
        *self.published.write() = committed;
        version
    }

    pub fn committed_version(&self) -> Option<u64> {
        self.committed.read().as_ref().map(|g| g.version)
    }

    pub fn published_version(&self) -> Option<u64> {
        self.published.read().as_ref().map(|g| g.version)
    }
}
