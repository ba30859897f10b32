use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::index::document::Document;
use crate::index::inverted::InvertedIndex;

/// Unique segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SegmentId(pub Uuid);

impl SegmentId {
    pub fn new() -> Self {
        SegmentId(Uuid::new_v4())
    }

    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(SegmentId)
    }
}

impl Default for SegmentId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentMetadata {
    pub id: SegmentId,
    pub doc_count: u32,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Segment file header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    pub version: u32,   // Format version
    pub doc_count: u32, // Number of documents
    pub checksum: u32,  // CRC32 of the payload
    pub payload_len: u64,
}

impl SegmentHeader {
    pub const MAGIC: [u8; 4] = *b"SDXS";
    pub const VERSION: u32 = 1;
    pub const SIZE: usize = 24; // magic + version + doc_count + checksum + payload_len

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..4].copy_from_slice(&Self::MAGIC);
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.doc_count.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.checksum.to_le_bytes());
        bytes[16..24].copy_from_slice(&self.payload_len.to_le_bytes());
        bytes
    }

    /// `None` when the magic does not match.
    pub fn from_bytes(bytes: &[u8; Self::SIZE]) -> Option<Self> {
        if bytes[0..4] != Self::MAGIC {
            return None;
        }
        let u32_at = |at: usize| {
            u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let mut len = [0u8; 8];
        len.copy_from_slice(&bytes[16..24]);

        Some(SegmentHeader {
            version: u32_at(4),
            doc_count: u32_at(8),
            checksum: u32_at(12),
            payload_len: u64::from_le_bytes(len),
        })
    }
}

/// Immutable, fully loaded segment: stored documents plus the in-memory
/// index built over them
#[derive(Debug)]
pub struct Segment {
    pub metadata: SegmentMetadata,
    pub documents: Vec<Document>,
    pub index: InvertedIndex,
}

impl Segment {
    pub fn id(&self) -> SegmentId {
        self.metadata.id
    }

    pub fn doc_count(&self) -> u32 {
        self.metadata.doc_count
    }

    pub fn document(&self, ordinal: u32) -> Option<&Document> {
        self.documents.get(ordinal as usize)
    }
}
