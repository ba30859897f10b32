pub mod batch;
pub mod index_writer;

pub use batch::BatchUpdater;
pub use index_writer::{CommitInfo, WriteSession};
