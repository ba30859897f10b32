pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod read_only;
pub mod registry;
pub mod stats;
pub mod types;

pub use config::{BatchConfig, Config};
pub use coordinator::IndexCoordinator;
pub use engine::Engine;
pub use error::{Error, Result};
pub use read_only::{ReadOnlyIndex, RecordIndex};
pub use stats::IndexStats;
pub use types::Value;
