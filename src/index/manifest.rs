use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::index::document::{Document, FieldEntry, Indexing, SlotKind, ValueType};

/// Type fixed for a (field, indexing) slot by the first document that used it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotType {
    Analyzer(String),
    Value(ValueType),
}

impl fmt::Display for SlotType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SlotType::Analyzer(name) => write!(f, "text analyzed by '{}'", name),
            SlotType::Value(value_type) => write!(f, "{}", value_type),
        }
    }
}

/// Persisted record of how every field of a location has been indexed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldManifest {
    slots: BTreeMap<String, BTreeMap<SlotKind, SlotType>>,
}

impl FieldManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, field: &str, kind: SlotKind) -> Option<&SlotType> {
        self.slots.get(field).and_then(|kinds| kinds.get(&kind))
    }

    /// Fails with `SchemaMismatchOnWrite` if any entry of `document`
    /// conflicts with an established slot. Nothing is recorded on failure.
    pub fn check(&self, document: &Document) -> Result<()> {
        let mut pending = BTreeMap::new();
        for entry in &document.entries {
            let slot_type = slot_type(entry);
            let key = (entry.name.as_str(), entry.indexing.slot_kind());

            let established = self
                .slot(key.0, key.1)
                .or_else(|| pending.get(&key));
            match established {
                Some(existing) if *existing != slot_type => {
                    return Err(Error::SchemaMismatchOnWrite(format!(
                        "field '{}' ({:?}) is stored as {}, document has {}",
                        entry.name, key.1, existing, slot_type
                    )));
                }
                Some(_) => {}
                None => {
                    pending.insert(key, slot_type);
                }
            }
        }
        Ok(())
    }

    /// Checks `document` and records its slots.
    pub fn merge(&mut self, document: &Document) -> Result<()> {
        self.check(document)?;
        for entry in &document.entries {
            self.slots
                .entry(entry.name.clone())
                .or_default()
                .entry(entry.indexing.slot_kind())
                .or_insert_with(|| slot_type(entry));
        }
        Ok(())
    }
}

fn slot_type(entry: &FieldEntry) -> SlotType {
    match &entry.indexing {
        Indexing::Analyzed(analyzer) => SlotType::Analyzer(analyzer.clone()),
        _ => SlotType::Value(entry.value.value_type()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::FieldValue;

    fn doc(entries: Vec<FieldEntry>) -> Document {
        Document { entries }
    }

    #[test]
    fn test_same_types_merge_cleanly() {
        let mut manifest = FieldManifest::new();
        let d = doc(vec![FieldEntry::new("code", FieldValue::Str("a".into()), Indexing::Exact)]);
        manifest.merge(&d).unwrap();
        manifest.merge(&d).unwrap();
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn test_type_flip_is_mismatch() {
        let mut manifest = FieldManifest::new();
        manifest
            .merge(&doc(vec![FieldEntry::new(
                "code",
                FieldValue::Str("a".into()),
                Indexing::Exact,
            )]))
            .unwrap();

        let err = manifest
            .merge(&doc(vec![FieldEntry::new("code", FieldValue::I64(1), Indexing::Exact)]))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaMismatchOnWrite(_)));
        assert_eq!(
            manifest.slot("code", SlotKind::Exact),
            Some(&SlotType::Value(ValueType::Str))
        );
    }

    #[test]
    fn test_conflict_inside_one_document() {
        let manifest = FieldManifest::new();
        let d = doc(vec![
            FieldEntry::new("n", FieldValue::I64(1), Indexing::Numeric),
            FieldEntry::new("n", FieldValue::F64(1.5), Indexing::Numeric),
        ]);
        assert!(manifest.check(&d).is_err());
    }

    #[test]
    fn test_different_indexing_modes_are_separate_slots() {
        let mut manifest = FieldManifest::new();
        let d = doc(vec![
            FieldEntry::new("id", FieldValue::Str("a".into()), Indexing::Exact),
            FieldEntry::new("id", FieldValue::Bytes(b"a".to_vec()), Indexing::Sortable),
        ]);
        manifest.merge(&d).unwrap();
        assert_eq!(manifest.len(), 2);
    }
}
