use std::sync::Arc;

use roaring::RoaringBitmap;
use tracing::debug;

use crate::core::engine::Engine;
use crate::core::error::{Error, Result};
use crate::index::document::{Document, Indexing};
use crate::index::inverted::InvertedIndex;
use crate::index::manifest::FieldManifest;
use crate::mvcc::controller::{Generation, LiveSegment};
use crate::storage::segment::Segment;
use crate::storage::segment_writer::SegmentWriter;

/// Outcome of a successful commit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitInfo {
    pub version: u64,
    pub added: usize,
    pub deleted: u64,
    pub segments: usize,
}

// Working copy of one committed segment
struct SegmentState {
    segment: Arc<Segment>,
    deleted: RoaringBitmap,
    dirty: bool,
}

/// The engine's single write transaction
///
/// Changes stay private to the session until `commit`. Dropping the session
/// without committing discards them.
pub struct WriteSession {
    engine: Engine,
    base_version: u64,
    segments: Vec<SegmentState>,
    pending: Vec<Document>,
    manifest: FieldManifest,
    deleted: u64,
}

impl WriteSession {
    pub(crate) fn new(engine: Engine, base: Arc<Generation>) -> Self {
        let segments = base
            .segments
            .iter()
            .map(|live| SegmentState {
                segment: live.segment.clone(),
                deleted: (*live.deleted).clone(),
                dirty: false,
            })
            .collect();

        WriteSession {
            engine,
            base_version: base.version,
            segments,
            pending: Vec::new(),
            manifest: (*base.manifest).clone(),
            deleted: 0,
        }
    }

    /// Buffers `document`. Fails with `SchemaMismatchOnWrite` when one of its
    /// fields conflicts with how the field was indexed before; the session
    /// stays usable.
    pub fn add_document(&mut self, document: Document) -> Result<()> {
        for entry in &document.entries {
            if let Indexing::Analyzed(analyzer) = &entry.indexing {
                if !self.engine.analyzers().contains(analyzer) {
                    return Err(Error::encoding(
                        &entry.name,
                        format!("unknown analyzer '{}'", analyzer),
                    ));
                }
            }
        }

        self.manifest.merge(&document)?;
        self.pending.push(document);
        Ok(())
    }

    /// Deletes every document whose exact field `field` holds `value`,
    /// including documents added earlier in this session.
    pub fn delete_by_term(&mut self, field: &str, value: &str) -> u64 {
        let mut deleted = 0;

        for state in &mut self.segments {
            if let Some(docs) = state.segment.index.exact_docs(field, value) {
                let newly = docs - &state.deleted;
                if !newly.is_empty() {
                    deleted += newly.len();
                    state.deleted |= newly;
                    state.dirty = true;
                }
            }
        }

        let before = self.pending.len();
        self.pending.retain(|doc| !doc.has_exact(field, value));
        deleted += (before - self.pending.len()) as u64;

        self.deleted += deleted;
        deleted
    }

    pub fn delete_all(&mut self) {
        let live: u64 = self
            .segments
            .iter()
            .map(|s| s.segment.doc_count() as u64 - s.deleted.len())
            .sum();
        self.deleted += live + self.pending.len() as u64;

        for state in &mut self.segments {
            state.deleted.insert_range(0..state.segment.doc_count());
            state.dirty = true;
        }
        self.pending.clear();
    }

    /// Forgets every recorded field type. Documents added afterwards
    /// define the types anew.
    pub fn reset_manifest(&mut self) {
        self.manifest = FieldManifest::new();
        for doc in &self.pending {
            // Pending documents were accepted once and stay consistent.
            let _ = self.manifest.merge(doc);
        }
    }

    /// Whether a live document (committed or pending) has exact `field` = `value`.
    pub fn contains_term(&self, field: &str, value: &str) -> bool {
        let committed = self.segments.iter().any(|state| {
            state
                .segment
                .index
                .exact_docs(field, value)
                .is_some_and(|docs| !docs.is_subset(&state.deleted))
        });
        committed || self.pending.iter().any(|doc| doc.has_exact(field, value))
    }

    /// Writes pending documents as a new segment and makes the new generation
    /// the committed head. It becomes visible to snapshots on the next refresh.
    pub fn commit(mut self) -> Result<CommitInfo> {
        let layout = self.engine.layout().clone();
        let added = self.pending.len();

        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        let mut dropped = Vec::new();
        for state in std::mem::take(&mut self.segments) {
            if state.deleted.len() >= state.segment.doc_count() as u64 {
                dropped.push(state.segment);
                continue;
            }
            segments.push(LiveSegment {
                segment: state.segment,
                deleted: Arc::new(state.deleted),
            });
        }

        if !self.pending.is_empty() {
            let documents = std::mem::take(&mut self.pending);
            let metadata = SegmentWriter::new(&layout).write(&documents)?;
            let index = InvertedIndex::build(&documents, self.engine.analyzers())?;
            segments.push(LiveSegment::new(Arc::new(Segment {
                metadata,
                documents,
                index,
            })));
        }

        let generation = Generation {
            version: self.base_version + 1,
            segments,
            manifest: Arc::new(std::mem::take(&mut self.manifest)),
            timestamp: chrono::Utc::now(),
        };
        let info = CommitInfo {
            version: generation.version,
            added,
            deleted: self.deleted,
            segments: generation.segments.len(),
        };

        self.engine.install(generation, &dropped)?;

        debug!(
            location = %self.engine.location().display(),
            generation = info.version,
            added = info.added,
            deleted = info.deleted,
            segments = info.segments,
            "Committed"
        );
        Ok(info)
    }
}

impl Drop for WriteSession {
    fn drop(&mut self) {
        self.engine.end_write();
    }
}
