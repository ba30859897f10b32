use std::fs;

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::error::{Error, Result};
use crate::index::document::Document;
use crate::index::inverted::InvertedIndex;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::{Segment, SegmentHeader, SegmentMetadata};

/// Loads a segment file fully into memory and indexes it
pub struct SegmentReader<'a> {
    layout: &'a StorageLayout,
    analyzers: &'a AnalyzerRegistry,
}

impl<'a> SegmentReader<'a> {
    pub fn new(layout: &'a StorageLayout, analyzers: &'a AnalyzerRegistry) -> Self {
        SegmentReader { layout, analyzers }
    }

    pub fn read(&self, metadata: &SegmentMetadata) -> Result<Segment> {
        let path = self.layout.segment_path(&metadata.id);
        let bytes = fs::read(&path)?;
        let corrupt = |what: &str| Error::Corrupt(format!("{}: {}", path.display(), what));

        let header_bytes: &[u8; SegmentHeader::SIZE] = bytes
            .get(..SegmentHeader::SIZE)
            .and_then(|slice| slice.try_into().ok())
            .ok_or_else(|| corrupt("truncated header"))?;
        let header =
            SegmentHeader::from_bytes(header_bytes).ok_or_else(|| corrupt("bad magic"))?;

        if header.version != SegmentHeader::VERSION {
            return Err(corrupt("incompatible segment version"));
        }

        let payload = &bytes[SegmentHeader::SIZE..];
        if payload.len() as u64 != header.payload_len {
            return Err(corrupt("payload length mismatch"));
        }
        if crc32fast::hash(payload) != header.checksum {
            return Err(corrupt("checksum mismatch"));
        }

        let serialized = lz4_flex::decompress_size_prepended(payload)
            .map_err(|e| corrupt(&format!("decompression failed: {}", e)))?;
        let documents: Vec<Document> = bincode::deserialize(&serialized)?;

        if documents.len() as u32 != header.doc_count {
            return Err(corrupt("document count mismatch"));
        }

        let index = InvertedIndex::build(&documents, self.analyzers)?;

        Ok(Segment {
            metadata: metadata.clone(),
            documents,
            index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::{FieldEntry, FieldValue, Indexing};
    use crate::storage::segment_writer::SegmentWriter;
    use tempfile::TempDir;

    fn docs() -> Vec<Document> {
        (0..3)
            .map(|i| {
                let mut doc = Document::new();
                doc.push(
                    FieldEntry::new("id", FieldValue::Str(format!("d{}", i)), Indexing::Exact)
                        .stored(true),
                );
                doc
            })
            .collect()
    }

    #[test]
    fn test_written_segment_loads_and_indexes() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let analyzers = AnalyzerRegistry::new();

        let metadata = SegmentWriter::new(&layout).write(&docs()).unwrap();
        let segment = SegmentReader::new(&layout, &analyzers).read(&metadata).unwrap();

        assert_eq!(segment.doc_count(), 3);
        assert_eq!(segment.documents, docs());
        assert!(segment.index.exact_docs("id", "d2").unwrap().contains(2));
    }

    #[test]
    fn test_flipped_byte_is_detected() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let analyzers = AnalyzerRegistry::new();

        let metadata = SegmentWriter::new(&layout).write(&docs()).unwrap();
        let path = layout.segment_path(&metadata.id);
        let mut bytes = fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        fs::write(&path, bytes).unwrap();

        let err = SegmentReader::new(&layout, &analyzers).read(&metadata).unwrap_err();
        assert!(matches!(err, Error::Corrupt(_)));
    }
}
