pub mod core;
pub mod storage;
pub mod analysis;
pub mod schema;
pub mod record;
pub mod index;
pub mod scoring;
pub mod search;
pub mod query;
pub mod mvcc;
pub mod writer;
pub mod reader;

pub use crate::core::{
    BatchConfig, Config, Error, IndexCoordinator, IndexStats, ReadOnlyIndex, RecordIndex, Result,
    Value,
};
pub use crate::query::{Query, QueryBuilder};
pub use crate::record::{Hits, Record};
pub use crate::schema::{
    Constraint, FieldDescriptor, FieldKind, MaxLength, NotEmpty, NumericRange, Schema,
    SchemaBuilder,
};
pub use crate::search::sort::Sort;
pub use crate::writer::BatchUpdater;

/*
Layering, top to bottom:

  record / schema      typed records, field kinds, codec to engine documents
  core::coordinator    writer lock, snapshot reads, add/update/remove/rebuild
  writer::batch        delayed batch updater on top of a coordinator
  core::engine         one location: write session, commit, refresh
  mvcc / reader        committed vs published generations, snapshots
  query / search       query AST, per-segment matching, ranking and sorting
  index / analysis     inverted index, manifest, analyzers
  storage              segment files, checkpoint, layout, file lock
*/
