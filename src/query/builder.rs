use crate::core::types::Value;
use crate::index::document::FieldValue;
use crate::query::ast::{
    BoolQuery, NearestQuery, PhraseQuery, PhraseTerm, PrefixQuery, Query, RangeQuery,
    WildcardQuery,
};
use crate::schema::Schema;
use crate::scoring::distance::DistanceMetric;

/// Builds queries against a schema's fields
///
/// Text given for analyzed fields goes through the same analyzer the
/// codec used at write time, so query terms line up with indexed terms.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    schema: &'a Schema,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        QueryBuilder { schema }
    }

    fn keyword_like(&self, field: &str) -> bool {
        self.schema
            .field(field)
            .is_some_and(|descriptor| descriptor.is_keyword_like())
    }

    fn analyze(&self, field: &str, text: &str) -> Vec<PhraseTerm> {
        self.schema
            .analyzers()
            .analyze(self.schema.analyzer_for(field), text)
            .unwrap_or_default()
            .into_iter()
            .map(|token| PhraseTerm {
                text: token.text,
                position: token.position,
            })
            .collect()
    }

    /// Matches `value` in `field`.
    ///
    /// Keyword-like fields match the whole token. Strings on text fields
    /// match every analyzed token. Other scalars match by typed equality.
    pub fn term(&self, field: &str, value: impl Into<Value>) -> Query {
        let value = value.into();

        if self.keyword_like(field) {
            return match value.to_token() {
                Some(token) => Query::term(field, token),
                None => Query::MatchNone,
            };
        }

        if let Value::Str(text) = &value {
            let mut terms = self.analyze(field, text);
            return match terms.len() {
                0 => Query::MatchNone,
                1 => Query::term(field, terms.remove(0).text),
                _ => Query::Bool(terms.into_iter().fold(BoolQuery::new(), |query, term| {
                    query.with_must(Query::term(field, term.text))
                })),
            };
        }

        match typed(&value) {
            Some(typed) => Query::Range(RangeQuery::equal_to(field, typed)),
            None => Query::MatchNone,
        }
    }

    /// Matches `text` against the default search field.
    pub fn text(&self, text: &str) -> Query {
        self.term(self.schema.default_search_field(), text)
    }

    /// Ordered tokens of `text`, allowing `slop` extra positions between them.
    pub fn phrase(&self, field: &str, text: &str, slop: u32) -> Query {
        let terms = self.analyze(field, text);
        if terms.is_empty() {
            return Query::MatchNone;
        }
        Query::Phrase(PhraseQuery {
            field: field.to_string(),
            terms,
            slop,
            boost: None,
        })
    }

    pub fn all_of(&self, queries: impl IntoIterator<Item = Query>) -> Query {
        Query::Bool(BoolQuery {
            must: queries.into_iter().collect(),
            ..BoolQuery::new()
        })
    }

    pub fn any_of(&self, queries: impl IntoIterator<Item = Query>) -> Query {
        Query::Bool(BoolQuery {
            should: queries.into_iter().collect(),
            ..BoolQuery::new()
        })
    }

    /// Every live record except those matching `query`.
    pub fn not(&self, query: Query) -> Query {
        Query::Bool(
            BoolQuery::new()
                .with_must(Query::MatchAll)
                .with_must_not(query),
        )
    }

    /// Starts a range on `field`; see [`RangeBuilder`].
    pub fn range(&self, field: &str) -> RangeBuilder {
        RangeBuilder {
            query: RangeQuery::new(field),
        }
    }

    pub fn prefix(&self, field: &str, prefix: &str) -> Query {
        Query::Prefix(PrefixQuery {
            field: field.to_string(),
            prefix: self.normalize(field, prefix),
            boost: None,
        })
    }

    /// `*` matches any run of characters, `?` exactly one.
    pub fn wildcard(&self, field: &str, pattern: &str) -> Query {
        Query::Wildcard(WildcardQuery {
            field: field.to_string(),
            pattern: self.normalize(field, pattern),
            boost: None,
        })
    }

    pub fn nearest(&self, field: &str, vector: Vec<f32>, k: usize) -> Query {
        self.nearest_with(field, vector, k, DistanceMetric::default())
    }

    pub fn nearest_with(
        &self,
        field: &str,
        vector: Vec<f32>,
        k: usize,
        metric: DistanceMetric,
    ) -> Query {
        Query::Nearest(NearestQuery {
            field: field.to_string(),
            vector,
            k,
            metric,
            boost: None,
        })
    }

    pub fn match_all(&self) -> Query {
        Query::MatchAll
    }

    pub fn match_none(&self) -> Query {
        Query::MatchNone
    }

    // Analyzed terms are lowercased at index time
    fn normalize(&self, field: &str, text: &str) -> String {
        if self.keyword_like(field) {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }
}

/// Bounds of a range query; unset bounds are open.
#[derive(Debug, Clone)]
pub struct RangeBuilder {
    query: RangeQuery,
}

impl RangeBuilder {
    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.query.gt = typed(&value.into());
        self
    }

    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.query.gte = typed(&value.into());
        self
    }

    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.query.lt = typed(&value.into());
        self
    }

    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.query.lte = typed(&value.into());
        self
    }

    pub fn build(self) -> Query {
        Query::Range(self.query)
    }
}

impl From<RangeBuilder> for Query {
    fn from(builder: RangeBuilder) -> Self {
        builder.build()
    }
}

fn typed(value: &Value) -> Option<FieldValue> {
    match value {
        Value::Str(s) => Some(FieldValue::Str(s.clone())),
        Value::Int(n) => Some(FieldValue::I64(*n)),
        Value::Float(n) => Some(FieldValue::F64(*n)),
        Value::Bool(b) => Some(FieldValue::Bool(*b)),
        Value::Timestamp(ts) => Some(FieldValue::Date(*ts)),
        Value::Vector(_) | Value::List(_) | Value::Json(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::field::{FieldDescriptor, FieldKind};

    fn schema() -> Schema {
        Schema::builder("books", "main")
            .field(FieldDescriptor::new("id").kind(FieldKind::UniqueId))
            .field(FieldDescriptor::new("title").kinds(&[FieldKind::Text, FieldKind::DefaultSearch]))
            .field(FieldDescriptor::new("tags").kind(FieldKind::Keyword))
            .field(FieldDescriptor::new("year").kind(FieldKind::Auto))
            .build()
            .unwrap()
    }

    #[test]
    fn test_keyword_term_is_not_analyzed() {
        let schema = schema();
        assert_eq!(schema.query().term("tags", "Sci-Fi"), Query::term("tags", "Sci-Fi"));
    }

    #[test]
    fn test_text_term_is_analyzed() {
        let schema = schema();
        assert_eq!(schema.query().term("title", "Dragons"), Query::term("title", "dragon"));

        let Query::Bool(query) = schema.query().text("red dragons") else {
            panic!("expected a bool query");
        };
        assert_eq!(query.must.len(), 2);
    }

    #[test]
    fn test_stop_words_only_match_nothing() {
        let schema = schema();
        assert_eq!(schema.query().term("title", "the"), Query::MatchNone);
    }

    #[test]
    fn test_numeric_term_is_equality_range() {
        let schema = schema();
        assert_eq!(
            schema.query().term("year", 1999i64),
            Query::Range(RangeQuery::equal_to("year", FieldValue::I64(1999)))
        );
    }

    #[test]
    fn test_range_builder() {
        let schema = schema();
        let Query::Range(range) = schema.query().range("year").gte(2000i64).lt(2010i64).build()
        else {
            panic!("expected a range query");
        };
        assert_eq!(range.gte, Some(FieldValue::I64(2000)));
        assert_eq!(range.lt, Some(FieldValue::I64(2010)));
        assert!(range.gt.is_none() && range.lte.is_none());
    }

    #[test]
    fn test_phrase_keeps_positions() {
        let schema = schema();
        let Query::Phrase(phrase) = schema.query().phrase("title", "lord of the rings", 0) else {
            panic!("expected a phrase query");
        };
        let terms: Vec<&str> = phrase.terms.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(terms, vec!["lord", "ring"]);
        assert!(phrase.terms[1].position > phrase.terms[0].position + 1);
    }
}
