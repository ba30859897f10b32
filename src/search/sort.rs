use std::cmp::Ordering;

use crate::index::document::{Document, FieldValue, Indexing};
use crate::search::results::Hit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub descending: bool,
}

/// Result ordering; relevance when no field is given
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sort {
    pub fields: Vec<SortField>,
}

impl Sort {
    pub fn relevance() -> Self {
        Sort { fields: Vec::new() }
    }

    pub fn ascending(field: &str) -> Self {
        Sort::relevance().then(field, false)
    }

    pub fn descending(field: &str) -> Self {
        Sort::relevance().then(field, true)
    }

    pub fn then(mut self, field: &str, descending: bool) -> Self {
        self.fields.push(SortField {
            field: field.to_string(),
            descending,
        });
        self
    }

    pub fn is_relevance(&self) -> bool {
        self.fields.is_empty()
    }

    /// Orders two hits: sort fields first (missing values last in either
    /// direction), then score, then address.
    pub fn compare(&self, a: (&Hit, &Document), b: (&Hit, &Document)) -> Ordering {
        for sort_field in &self.fields {
            // NaN sorts like a missing value
            let left = sort_value(a.1, &sort_field.field).filter(|v| !v.is_nan());
            let right = sort_value(b.1, &sort_field.field).filter(|v| !v.is_nan());
            let ordering = match (left, right) {
                (Some(l), Some(r)) => {
                    let ordering = l.total_order(r);
                    if sort_field.descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.0.cmp(b.0)
    }
}

/// The value a document sorts by on `field`: its sortable projection, else
/// its first typed or exact value.
pub fn sort_value<'a>(document: &'a Document, field: &str) -> Option<&'a FieldValue> {
    document.sort_value(field).or_else(|| {
        document
            .entries
            .iter()
            .find(|e| e.name == field && matches!(e.indexing, Indexing::Numeric | Indexing::Exact))
            .map(|e| &e.value)
    })
}
