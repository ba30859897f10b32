use std::fs::{self, File};
use std::io::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::Result;
use crate::index::manifest::FieldManifest;
use crate::storage::layout::StorageLayout;
use crate::storage::segment::SegmentMetadata;

/// One committed segment and the ordinals deleted from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentEntry {
    pub metadata: SegmentMetadata,
    pub deleted: Vec<u32>,
}

/// Durable description of the last committed generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub generation: u64,
    pub segments: Vec<SegmentEntry>,
    pub manifest: FieldManifest,
    pub timestamp: DateTime<Utc>,
}

impl Checkpoint {
    /// Load checkpoint from disk; `None` for a location never committed to.
    pub fn load(storage: &StorageLayout) -> Result<Option<Self>> {
        let path = storage.checkpoint_path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(path)?;
        let checkpoint = bincode::deserialize(&data)?;
        Ok(Some(checkpoint))
    }

    /// Save checkpoint to disk. The rename is the commit point.
    pub fn save(&self, storage: &StorageLayout) -> Result<()> {
        let data = bincode::serialize(self)?;
        let path = storage.checkpoint_path();
        let tmp_path = path.with_extension("bin.tmp");

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::segment::SegmentId;
    use tempfile::TempDir;

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        assert!(Checkpoint::load(&layout).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let checkpoint = Checkpoint {
            generation: 4,
            segments: vec![SegmentEntry {
                metadata: SegmentMetadata {
                    id: SegmentId::new(),
                    doc_count: 2,
                    created_at: Utc::now(),
                    size_bytes: 64,
                },
                deleted: vec![1],
            }],
            manifest: FieldManifest::new(),
            timestamp: Utc::now(),
        };
        checkpoint.save(&layout).unwrap();

        let loaded = Checkpoint::load(&layout).unwrap().unwrap();
        assert_eq!(loaded.generation, 4);
        assert_eq!(loaded.segments[0].deleted, vec![1]);
        assert!(!layout.meta_dir.join("checkpoint.bin.tmp").exists());
    }
}
