pub mod codec;
pub mod structured;

use std::sync::Arc;

use uuid::Uuid;

use crate::core::error::Result;
use crate::core::types::Value;
use crate::schema::Schema;

pub use codec::{decode, encode};
pub use structured::{from_structured, to_structured};

/// A typed record stored in an index
///
/// Implementors expose their fields by name. `Default` is the factory used
/// when decoding, so a fresh record must be valid with every field unset.
pub trait Record: Default + Send + Sync + 'static {
    /// Process-wide schema of this record type.
    fn schema() -> Arc<Schema>;

    fn get_value(&self, field: &str) -> Option<Value>;

    /// Stores a decoded value. Implementors should accept the decoded form
    /// of every kind they declare and return `Encoding` errors otherwise.
    fn set_value(&mut self, field: &str, value: Value) -> Result<()>;

    /// Id field as a string; `None` before the record was first stored.
    fn unique_id(&self) -> Option<String> {
        let schema = Self::schema();
        self.get_value(schema.id_field())
            .and_then(|value| value.to_token())
            .filter(|id| !id.is_empty())
    }
}

/// Returns the record's id, first storing a fresh one (UUID v4, simple
/// form) when it has none.
pub fn ensure_id<R: Record>(record: &mut R) -> Result<String> {
    if let Some(id) = record.unique_id() {
        return Ok(id);
    }
    let id = Uuid::new_v4().simple().to_string();
    record.set_value(R::schema().id_field(), Value::Str(id.clone()))?;
    Ok(id)
}

/// One page of query results
#[derive(Debug, Clone)]
pub struct Hits<R> {
    /// Every match, regardless of pagination
    pub total_matched: usize,
    pub docs: Vec<R>,
}

impl<R> Hits<R> {
    pub fn empty(total_matched: usize) -> Self {
        Hits {
            total_matched,
            docs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

impl<R> Default for Hits<R> {
    fn default() -> Self {
        Hits::empty(0)
    }
}

impl<R> IntoIterator for Hits<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.docs.into_iter()
    }
}
