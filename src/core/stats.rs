use serde::{Deserialize, Serialize};

/// Index statistics for monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub live_docs: u64,
    pub segments: usize,
    // Tombstoned, not yet dropped with their segment
    pub deleted_docs: u64,
    pub generation: u64,
    /// Successful commits through the coordinator since it was opened
    pub write_count: u64,
}

impl IndexStats {
    /// Share of stored documents that are deleted.
    pub fn deleted_ratio(&self) -> f64 {
        let total = self.live_docs + self.deleted_docs;
        if total == 0 {
            0.0
        } else {
            self.deleted_docs as f64 / total as f64
        }
    }
}
