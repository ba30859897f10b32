pub mod constraint;
pub mod field;
pub mod schema;

pub use constraint::{Constraint, MaxLength, NotEmpty, NumericRange};
pub use field::{FieldDescriptor, FieldKind, KindFamily};
pub use schema::{SORT_FIELD, Schema, SchemaBuilder};
