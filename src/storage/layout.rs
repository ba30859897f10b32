use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::error::Result;
use crate::storage::segment::SegmentId;

/// Directory structure for data files of one index location
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub base_dir: PathBuf,     // Location root
    pub segments_dir: PathBuf, // Document segments (.seg files)
    pub meta_dir: PathBuf,     // Checkpoint location
}

impl StorageLayout {
    pub fn new(base_dir: PathBuf) -> Result<Self> {
        let segments_dir = base_dir.join("segments");
        let meta_dir = base_dir.join("meta");

        fs::create_dir_all(&segments_dir)?;
        fs::create_dir_all(&meta_dir)?;

        Ok(StorageLayout {
            base_dir,
            segments_dir,
            meta_dir,
        })
    }

    pub fn segment_path(&self, id: &SegmentId) -> PathBuf {
        self.segments_dir.join(format!("{}.seg", id.0))
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.meta_dir.join("checkpoint.bin")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.base_dir.join(".lock")
    }

    /// Segment ids of every `.seg` file present on disk.
    pub fn segment_files(&self) -> Result<Vec<SegmentId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.segments_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("seg") {
                continue;
            }
            if let Some(id) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(SegmentId::parse)
            {
                ids.push(id);
            }
        }
        Ok(ids)
    }
}

/// `{base}/{lowercase(index_name)}/{group_name}`
pub fn index_location(base: &Path, index_name: &str, group_name: &str) -> PathBuf {
    base.join(index_name.to_lowercase()).join(group_name)
}

/// Location used before index names were lowercased.
pub fn legacy_location(base: &Path, index_name: &str, group_name: &str) -> PathBuf {
    base.join(index_name).join(group_name)
}

/// Migrates a legacy location, creates `location` and returns its
/// canonical path.
pub fn resolve_location(legacy: &Path, location: &Path) -> Result<PathBuf> {
    migrate_legacy(legacy, location)?;
    fs::create_dir_all(location)?;
    Ok(fs::canonicalize(location)?)
}

/// Moves a legacy location into place when only the legacy one exists.
/// Returns whether a rename happened.
pub fn migrate_legacy(legacy: &Path, location: &Path) -> Result<bool> {
    if legacy == location || location.exists() || !legacy.is_dir() {
        return Ok(false);
    }

    if let Some(parent) = location.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::rename(legacy, location)?;

    info!(
        from = %legacy.display(),
        to = %location.display(),
        "Migrated legacy index location"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_location_is_canonical() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        let plain = dir.path().join("books").join("main");
        let roundabout = dir.path().join("nested").join("..").join("books").join("main");

        let first = resolve_location(&dir.path().join("Books/main"), &plain).unwrap();
        let second = resolve_location(&dir.path().join("Books/main"), &roundabout).unwrap();
        assert_eq!(first, second);
        assert!(first.is_absolute() && first.is_dir());
    }

    #[test]
    fn test_location_lowercases_index_name_only() {
        let base = Path::new("/data");
        assert_eq!(
            index_location(base, "Books", "Shelf"),
            PathBuf::from("/data/books/Shelf")
        );
        assert_eq!(
            legacy_location(base, "Books", "Shelf"),
            PathBuf::from("/data/Books/Shelf")
        );
    }

    #[test]
    fn test_migrate_legacy_renames_once() {
        let dir = TempDir::new().unwrap();
        let legacy = legacy_location(dir.path(), "Books", "g");
        let location = index_location(dir.path(), "Books", "g");
        fs::create_dir_all(legacy.join("meta")).unwrap();
        fs::write(legacy.join("meta").join("checkpoint.bin"), b"x").unwrap();

        assert!(migrate_legacy(&legacy, &location).unwrap());
        assert!(location.join("meta").join("checkpoint.bin").exists());
        assert!(!migrate_legacy(&legacy, &location).unwrap());
    }

    #[test]
    fn test_migrate_skips_when_new_location_exists() {
        let dir = TempDir::new().unwrap();
        let legacy = legacy_location(dir.path(), "Books", "g");
        let location = index_location(dir.path(), "Books", "g");
        fs::create_dir_all(&legacy).unwrap();
        fs::create_dir_all(&location).unwrap();

        assert!(!migrate_legacy(&legacy, &location).unwrap());
        assert!(legacy.exists());
    }

    #[test]
    fn test_segment_files_lists_only_segments() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path().to_path_buf()).unwrap();
        let id = SegmentId::new();
        fs::write(layout.segment_path(&id), b"").unwrap();
        fs::write(layout.segments_dir.join("junk.tmp"), b"").unwrap();

        assert_eq!(layout.segment_files().unwrap(), vec![id]);
    }
}
