use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Encoded value of one document entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Str(String),
    I64(i64),
    F64(f64),
    Bool(bool),
    Date(DateTime<Utc>),
    Bytes(Vec<u8>),
    Vector(Vec<f32>),
    Json(String),
}

impl FieldValue {
    pub fn value_type(&self) -> ValueType {
        match self {
            FieldValue::Str(_) => ValueType::Str,
            FieldValue::I64(_) => ValueType::I64,
            FieldValue::F64(_) => ValueType::F64,
            FieldValue::Bool(_) => ValueType::Bool,
            FieldValue::Date(_) => ValueType::Date,
            FieldValue::Bytes(_) => ValueType::Bytes,
            FieldValue::Vector(v) => ValueType::Vector(v.len() as u32),
            FieldValue::Json(_) => ValueType::Json,
        }
    }

    /// Term form used by exact-match postings.
    pub fn token(&self) -> Option<String> {
        match self {
            FieldValue::Str(s) | FieldValue::Json(s) => Some(s.clone()),
            FieldValue::I64(n) => Some(n.to_string()),
            FieldValue::F64(n) => Some(n.to_string()),
            FieldValue::Bool(b) => Some(b.to_string()),
            FieldValue::Date(d) => Some(d.to_rfc3339()),
            FieldValue::Bytes(b) => Some(String::from_utf8_lossy(b).into_owned()),
            FieldValue::Vector(_) => None,
        }
    }

    /// Ordering between comparable values. Integers and floats compare
    /// numerically with each other; anything else only within its own type.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (FieldValue::Str(a), FieldValue::Str(b)) => Some(a.cmp(b)),
            (FieldValue::I64(a), FieldValue::I64(b)) => Some(a.cmp(b)),
            (FieldValue::F64(a), FieldValue::F64(b)) => a.partial_cmp(b),
            (FieldValue::I64(a), FieldValue::F64(b)) => (*a as f64).partial_cmp(b),
            (FieldValue::F64(a), FieldValue::I64(b)) => a.partial_cmp(&(*b as f64)),
            (FieldValue::Bool(a), FieldValue::Bool(b)) => Some(a.cmp(b)),
            (FieldValue::Date(a), FieldValue::Date(b)) => Some(a.cmp(b)),
            (FieldValue::Bytes(a), FieldValue::Bytes(b)) => Some(a.cmp(b)),
            (FieldValue::Str(a), FieldValue::Bytes(b)) => Some(a.as_bytes().cmp(b.as_slice())),
            (FieldValue::Bytes(a), FieldValue::Str(b)) => Some(a.as_slice().cmp(b.as_bytes())),
            _ => None,
        }
    }

    pub fn is_nan(&self) -> bool {
        matches!(self, FieldValue::F64(n) if n.is_nan())
    }

    /// Total order for sorting. Values `compare` cannot relate fall back
    /// to a fixed order between value families. NaN sorts after every
    /// number.
    pub fn total_order(&self, other: &FieldValue) -> Ordering {
        match (self, other) {
            (FieldValue::F64(a), FieldValue::F64(b)) if a.is_nan() || b.is_nan() => {
                a.is_nan().cmp(&b.is_nan())
            }
            (FieldValue::F64(a), FieldValue::I64(_)) if a.is_nan() => Ordering::Greater,
            (FieldValue::I64(_), FieldValue::F64(b)) if b.is_nan() => Ordering::Less,
            _ => self
                .compare(other)
                .unwrap_or_else(|| self.family().cmp(&other.family())),
        }
    }

    fn family(&self) -> u8 {
        match self {
            FieldValue::I64(_) | FieldValue::F64(_) => 0,
            FieldValue::Str(_) | FieldValue::Bytes(_) => 1,
            FieldValue::Bool(_) => 2,
            FieldValue::Date(_) => 3,
            FieldValue::Vector(_) => 4,
            FieldValue::Json(_) => 5,
        }
    }
}

/// Type recorded in the field manifest for a (field, indexing) slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Str,
    I64,
    F64,
    Bool,
    Date,
    Bytes,
    Vector(u32),
    Json,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValueType::Vector(dim) => write!(f, "vector[{}]", dim),
            other => write!(f, "{:?}", other),
        }
    }
}

/// How the engine indexes an entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Indexing {
    /// Tokenized with the named analyzer
    Analyzed(String),
    /// Single exact term
    Exact,
    /// Typed scalar usable by range queries
    Numeric,
    /// Sort projection
    Sortable,
    /// Similarity-searchable vector
    Vector,
    /// Not indexed, only kept in the stored document
    StoredOnly,
}

impl Indexing {
    pub fn slot_kind(&self) -> SlotKind {
        match self {
            Indexing::Analyzed(_) => SlotKind::Analyzed,
            Indexing::Exact => SlotKind::Exact,
            Indexing::Numeric => SlotKind::Numeric,
            Indexing::Sortable => SlotKind::Sortable,
            Indexing::Vector => SlotKind::Vector,
            Indexing::StoredOnly => SlotKind::StoredOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SlotKind {
    Analyzed,
    Exact,
    Numeric,
    Sortable,
    Vector,
    StoredOnly,
}

/// One `(name, value, indexing)` triple of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    pub name: String,
    pub value: FieldValue,
    pub indexing: Indexing,
    pub stored: bool,
    // Part of a multi-valued field
    pub multi: bool,
}

impl FieldEntry {
    pub fn new(name: &str, value: FieldValue, indexing: Indexing) -> Self {
        FieldEntry {
            name: name.to_string(),
            value,
            indexing,
            stored: false,
            multi: false,
        }
    }

    pub fn stored(mut self, stored: bool) -> Self {
        self.stored = stored;
        self
    }

    pub fn multi(mut self, multi: bool) -> Self {
        self.multi = multi;
        self
    }
}

/// Engine-native document: ordered entries, repeated names allowed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub entries: Vec<FieldEntry>,
}

impl Document {
    pub fn new() -> Self {
        Document {
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: FieldEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries_named<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a FieldEntry> {
        self.entries.iter().filter(move |e| e.name == name)
    }

    pub fn stored_entries<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a FieldEntry> {
        self.entries_named(name).filter(|e| e.stored)
    }

    /// True when an exact entry `name` carries the term `value`.
    pub fn has_exact(&self, name: &str, value: &str) -> bool {
        self.entries_named(name).any(|e| {
            e.indexing == Indexing::Exact && e.value.token().as_deref() == Some(value)
        })
    }

    pub fn sort_value(&self, name: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|e| e.name == name && e.indexing == Indexing::Sortable)
            .map(|e| &e.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_cross_type_compare() {
        assert_eq!(
            FieldValue::I64(2).compare(&FieldValue::F64(2.5)),
            Some(Ordering::Less)
        );
        assert_eq!(FieldValue::Str("a".into()).compare(&FieldValue::I64(1)), None);
    }

    #[test]
    fn test_total_order_puts_nan_after_numbers() {
        let mut values = vec![
            FieldValue::F64(f64::NAN),
            FieldValue::F64(2.5),
            FieldValue::Str("b".into()),
            FieldValue::I64(3),
            FieldValue::F64(f64::NAN),
            FieldValue::I64(-1),
        ];
        values.sort_by(|a, b| a.total_order(b));
        assert_eq!(values[0], FieldValue::I64(-1));
        assert_eq!(values[1], FieldValue::F64(2.5));
        assert_eq!(values[2], FieldValue::I64(3));
        assert!(values[3].is_nan() && values[4].is_nan());
        assert_eq!(values[5], FieldValue::Str("b".into()));
        assert_eq!(FieldValue::F64(f64::NAN).compare(&FieldValue::F64(1.0)), None);
    }

    #[test]
    fn test_sort_value_outlives_name() {
        let mut doc = Document::new();
        doc.push(FieldEntry::new("_sort", FieldValue::I64(4), Indexing::Sortable));
        let value = {
            let name = String::from("_sort");
            doc.sort_value(&name)
        };
        assert_eq!(value, Some(&FieldValue::I64(4)));
    }

    #[test]
    fn test_has_exact_ignores_analyzed_entries() {
        let mut doc = Document::new();
        doc.push(FieldEntry::new("id", FieldValue::Str("a1".into()), Indexing::Exact));
        doc.push(FieldEntry::new(
            "title",
            FieldValue::Str("a1".into()),
            Indexing::Analyzed("standard".into()),
        ));
        assert!(doc.has_exact("id", "a1"));
        assert!(!doc.has_exact("title", "a1"));
    }

    #[test]
    fn test_exact_typed_value_token() {
        let mut doc = Document::new();
        doc.push(FieldEntry::new("year", FieldValue::I64(1999), Indexing::Exact));
        assert!(doc.has_exact("year", "1999"));
    }
}
