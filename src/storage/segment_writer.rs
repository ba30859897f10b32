use std::fs::{self, File};
use std::io::Write;

use chrono::Utc;
use crc32fast::Hasher;
use tracing::debug;

use crate::core::error::Result;
use crate::index::document::Document;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{SegmentHeader, SegmentId, SegmentMetadata};

/// Writes an immutable segment file
///
/// Layout:
/// [ HEADER (magic, version, doc_count, checksum, payload_len) ] <- byte 0
/// [ LZ4( bincode(Vec<Document>) ) ]
///
/// The file is written under a temporary name and renamed into place, so a
/// crash never leaves a half-written `.seg` file behind.
pub struct SegmentWriter<'a> {
    layout: &'a StorageLayout,
    id: SegmentId,
}

impl<'a> SegmentWriter<'a> {
    pub fn new(layout: &'a StorageLayout) -> Self {
        SegmentWriter {
            layout,
            id: SegmentId::new(),
        }
    }

    pub fn write(self, documents: &[Document]) -> Result<SegmentMetadata> {
        let serialized = bincode::serialize(documents)?;
        let payload = lz4_flex::compress_prepend_size(&serialized);

        let mut hasher = Hasher::new();
        hasher.update(&payload);

        let header = SegmentHeader {
            version: SegmentHeader::VERSION,
            doc_count: documents.len() as u32,
            checksum: hasher.finalize(),
            payload_len: payload.len() as u64,
        };

        let path = self.layout.segment_path(&self.id);
        let tmp_path = path.with_extension("seg.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&header.to_bytes())?;
            file.write_all(&payload)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        let size_bytes = (SegmentHeader::SIZE + payload.len()) as u64;
        debug!(
            segment = %self.id.0,
            docs = documents.len(),
            bytes = size_bytes,
            "Wrote segment"
        );

        Ok(SegmentMetadata {
            id: self.id,
            doc_count: header.doc_count,
            created_at: Utc::now(),
            size_bytes,
        })
    }
}
