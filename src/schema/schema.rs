use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::analysis::analyzer::{AnalyzerRegistry, KEYWORD_ANALYZER, STANDARD_ANALYZER};
use crate::core::error::{Error, Result};
use crate::query::ast::Query;
use crate::query::builder::QueryBuilder;
use crate::record::Record;
use crate::record::codec;
use crate::schema::field::{FieldDescriptor, FieldKind};
use crate::search::sort::Sort;
use crate::storage::layout;

/// Reserved name of the sort projection
pub const SORT_FIELD: &str = "_sort";

/// Immutable description of a record type and where it is stored
///
/// Built once per record type, usually behind a `LazyLock`.
#[derive(Debug)]
pub struct Schema {
    index_name: String,
    group_name: String,
    fields: Vec<FieldDescriptor>,
    id_field: usize,
    default_search_field: usize,
    default_sort: Sort,
    analyzer: String,
    analyzers: Arc<AnalyzerRegistry>,
}

pub struct SchemaBuilder {
    index_name: String,
    group_name: String,
    fields: Vec<FieldDescriptor>,
    analyzer: String,
    analyzers: Option<Arc<AnalyzerRegistry>>,
}

impl SchemaBuilder {
    pub fn new(index_name: &str, group_name: &str) -> Self {
        SchemaBuilder {
            index_name: index_name.to_string(),
            group_name: group_name.to_string(),
            fields: Vec::new(),
            analyzer: STANDARD_ANALYZER.to_string(),
            analyzers: None,
        }
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Default analyzer for non-keyword text fields.
    pub fn analyzer(mut self, name: &str) -> Self {
        self.analyzer = name.to_string();
        self
    }

    /// Registry to resolve analyzers from; the shared built-in one otherwise.
    pub fn analyzers(mut self, analyzers: Arc<AnalyzerRegistry>) -> Self {
        self.analyzers = Some(analyzers);
        self
    }

    pub fn build(self) -> Result<Schema> {
        let invalid = |msg: String| Err(Error::InvalidSchema(msg));

        for (what, name) in [("index", &self.index_name), ("group", &self.group_name)] {
            if name.is_empty()
                || name == "."
                || name == ".."
                || name.contains(['/', '\\'])
            {
                return invalid(format!("{} name '{}' is not a valid directory name", what, name));
            }
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.is_empty() {
                return invalid("field with empty name".to_string());
            }
            if field.name == SORT_FIELD {
                return invalid(format!("field name '{}' is reserved", SORT_FIELD));
            }
            if !seen.insert(field.name.as_str()) {
                return invalid(format!("duplicate field '{}'", field.name));
            }
            if field.kinds.is_empty() {
                return invalid(format!("field '{}' has no kind", field.name));
            }
            for kind in &field.kinds {
                if !codec::has_codec(*kind) {
                    return invalid(format!("no encoding for kind {} of '{}'", kind, field.name));
                }
            }
        }

        let ids: Vec<usize> = positions(&self.fields, FieldKind::UniqueId);
        let [id_field] = ids.as_slice() else {
            return invalid(format!(
                "expected exactly one {} field, found {}",
                FieldKind::UniqueId,
                ids.len()
            ));
        };
        let id_field = *id_field;

        let sort_keys = positions(&self.fields, FieldKind::SortKey);
        if sort_keys.len() > 1 {
            return invalid(format!("at most one {} field allowed", FieldKind::SortKey));
        }

        let analyzers = self.analyzers.unwrap_or_else(AnalyzerRegistry::shared);
        if !analyzers.contains(&self.analyzer) {
            return invalid(format!("unknown analyzer '{}'", self.analyzer));
        }

        let default_search_field = positions(&self.fields, FieldKind::DefaultSearch)
            .first()
            .or(positions(&self.fields, FieldKind::Text).first())
            .copied()
            .unwrap_or(id_field);

        let default_sort = if sort_keys.is_empty() {
            Sort::relevance()
        } else {
            Sort::ascending(SORT_FIELD)
        };

        Ok(Schema {
            index_name: self.index_name,
            group_name: self.group_name,
            fields: self.fields,
            id_field,
            default_search_field,
            default_sort,
            analyzer: self.analyzer,
            analyzers,
        })
    }
}

fn positions(fields: &[FieldDescriptor], kind: FieldKind) -> Vec<usize> {
    fields
        .iter()
        .enumerate()
        .filter(|(_, f)| f.has_kind(kind))
        .map(|(idx, _)| idx)
        .collect()
}

impl Schema {
    pub fn builder(index_name: &str, group_name: &str) -> SchemaBuilder {
        SchemaBuilder::new(index_name, group_name)
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub fn group_name(&self) -> &str {
        &self.group_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn id_field(&self) -> &str {
        &self.fields[self.id_field].name
    }

    pub fn default_search_field(&self) -> &str {
        &self.fields[self.default_search_field].name
    }

    pub fn default_sort(&self) -> &Sort {
        &self.default_sort
    }

    pub fn default_analyzer(&self) -> &str {
        &self.analyzer
    }

    pub fn analyzers(&self) -> &Arc<AnalyzerRegistry> {
        &self.analyzers
    }

    /// Keyword-like fields are analyzed as one exact token.
    pub fn analyzer_for(&self, field: &str) -> &str {
        match self.field(field) {
            Some(descriptor) if descriptor.is_keyword_like() => KEYWORD_ANALYZER,
            _ => &self.analyzer,
        }
    }

    pub fn id_query(&self, id: &str) -> Query {
        Query::term(self.id_field(), id)
    }

    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self)
    }

    pub fn location(&self, base: &Path) -> PathBuf {
        layout::index_location(base, &self.index_name, &self.group_name)
    }

    pub fn legacy_location(&self, base: &Path) -> PathBuf {
        layout::legacy_location(base, &self.index_name, &self.group_name)
    }

    /// Runs every field constraint against `record`; the first violation wins.
    pub fn check_constraints<R: Record>(&self, record: &R) -> Result<()> {
        for field in &self.fields {
            if field.constraints.is_empty() {
                continue;
            }
            let value = record.get_value(&field.name);
            for constraint in &field.constraints {
                if let Err(message) = constraint.check(value.as_ref()) {
                    return Err(Error::ConstraintViolation {
                        field: field.name.clone(),
                        constraint: constraint.name().to_string(),
                        message,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::constraint::NotEmpty;

    fn builder() -> SchemaBuilder {
        Schema::builder("Books", "main")
            .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
            .field(FieldDescriptor::new("title").kind(FieldKind::Text))
    }

    #[test]
    fn test_requires_exactly_one_unique_id() {
        let none = Schema::builder("b", "g").field(FieldDescriptor::new("t").kind(FieldKind::Text));
        assert!(matches!(none.build(), Err(Error::InvalidSchema(_))));

        let two = builder().field(FieldDescriptor::new("other").kind(FieldKind::UniqueId));
        assert!(matches!(two.build(), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_rejects_reserved_and_duplicate_names() {
        let reserved = builder().field(FieldDescriptor::new("_sort").kind(FieldKind::Keyword));
        assert!(reserved.build().is_err());

        let duplicate = builder().field(FieldDescriptor::new("title").kind(FieldKind::Keyword));
        assert!(duplicate.build().is_err());
    }

    #[test]
    fn test_rejects_unknown_analyzer_and_bad_names() {
        assert!(builder().analyzer("klingon").build().is_err());
        assert!(Schema::builder("a/b", "g")
            .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
            .build()
            .is_err());
    }

    #[test]
    fn test_derived_fields() {
        let schema = builder().build().unwrap();
        assert_eq!(schema.id_field(), "id");
        assert_eq!(schema.default_search_field(), "title");
        assert!(schema.default_sort().is_relevance());
        assert_eq!(schema.analyzer_for("id"), KEYWORD_ANALYZER);
        assert_eq!(schema.analyzer_for("title"), STANDARD_ANALYZER);

        let with_search = builder()
            .field(FieldDescriptor::new("body").kind(FieldKind::DefaultSearch))
            .field(FieldDescriptor::new("rank").kind(FieldKind::SortKey))
            .build()
            .unwrap();
        assert_eq!(with_search.default_search_field(), "body");
        assert_eq!(with_search.default_sort(), &Sort::ascending(SORT_FIELD));
    }

    #[test]
    fn test_default_search_falls_back_to_id() {
        let schema = Schema::builder("b", "g")
            .field(FieldDescriptor::new("key").kind(FieldKind::UniqueId))
            .build()
            .unwrap();
        assert_eq!(schema.default_search_field(), "key");
    }

    #[test]
    fn test_location_is_pure() {
        let schema = builder().build().unwrap();
        let base = Path::new("/srv/index");
        assert_eq!(schema.location(base), PathBuf::from("/srv/index/books/main"));
        assert_eq!(schema.location(base), schema.location(base));
        assert_eq!(
            schema.legacy_location(base),
            PathBuf::from("/srv/index/Books/main")
        );
    }

    #[test]
    fn test_constraint_field_is_reported() {
        let schema = Schema::builder("b", "g")
            .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
            .field(
                FieldDescriptor::new("title")
                    .kind(FieldKind::Text)
                    .constraint(NotEmpty),
            )
            .build()
            .unwrap();
        assert_eq!(schema.fields()[1].constraints.len(), 1);
        assert_eq!(schema.fields()[1].constraints[0].name(), "not_empty");
    }
}
