pub mod reader_pool;
pub mod snapshot_reader;

pub use reader_pool::ReaderPool;
pub use snapshot_reader::Snapshot;
