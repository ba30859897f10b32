use crate::index::document::FieldValue;
use crate::scoring::distance::DistanceMetric;

/// Main query enum representing all query types
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Term(TermQuery),         // Single term, analyzed or exact
    Phrase(PhraseQuery),     // Ordered terms with slop
    Bool(BoolQuery),         // Boolean combinations
    Range(RangeQuery),       // Numeric/date/string range
    Prefix(PrefixQuery),     // Term prefix
    Wildcard(WildcardQuery), // `*` and `?` patterns
    Nearest(NearestQuery),   // k-nearest vectors
    MatchAll,
    MatchNone,
}

/// Single term query
#[derive(Debug, Clone, PartialEq)]
pub struct TermQuery {
    pub field: String,
    pub value: String,
    pub boost: Option<f32>,
}

/// A phrase term and its position relative to the phrase start
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseTerm {
    pub text: String,
    pub position: u32,
}

/// Phrase query for exact phrase matching
#[derive(Debug, Clone, PartialEq)]
pub struct PhraseQuery {
    pub field: String,
    pub terms: Vec<PhraseTerm>,
    pub slop: u32, // Max extra distance between consecutive terms
    pub boost: Option<f32>,
}

/// Boolean query with must/should/must_not clauses
#[derive(Debug, Clone, PartialEq)]
pub struct BoolQuery {
    pub must: Vec<Query>,     // All must match (AND)
    pub should: Vec<Query>,   // At least one must match when nothing else is required
    pub must_not: Vec<Query>, // None must match (NOT)
    pub filter: Vec<Query>,   // Must match but don't affect score
    pub minimum_should_match: Option<u32>,
    pub boost: Option<f32>,
}

/// Range query for numeric, date and string fields
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub field: String,
    pub gt: Option<FieldValue>,
    pub gte: Option<FieldValue>,
    pub lt: Option<FieldValue>,
    pub lte: Option<FieldValue>,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrefixQuery {
    pub field: String,
    pub prefix: String,
    pub boost: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WildcardQuery {
    pub field: String,
    pub pattern: String,
    pub boost: Option<f32>,
}

/// k-nearest neighbours over a vector field, scored by similarity
#[derive(Debug, Clone, PartialEq)]
pub struct NearestQuery {
    pub field: String,
    pub vector: Vec<f32>,
    pub k: usize,
    pub metric: DistanceMetric,
    pub boost: Option<f32>,
}

impl Query {
    pub fn term(field: &str, value: impl Into<String>) -> Self {
        Query::Term(TermQuery {
            field: field.to_string(),
            value: value.into(),
            boost: None,
        })
    }

    pub fn bool(bool_query: BoolQuery) -> Self {
        Query::Bool(bool_query)
    }

    /// Boost multiplier of the outermost clause.
    pub fn boost(&self) -> f32 {
        let boost = match self {
            Query::Term(q) => q.boost,
            Query::Phrase(q) => q.boost,
            Query::Bool(q) => q.boost,
            Query::Range(q) => q.boost,
            Query::Prefix(q) => q.boost,
            Query::Wildcard(q) => q.boost,
            Query::Nearest(q) => q.boost,
            Query::MatchAll | Query::MatchNone => None,
        };
        boost.unwrap_or(1.0)
    }

    /// Visits every nearest-neighbour clause in depth-first order.
    pub fn collect_nearest<'a>(&'a self, out: &mut Vec<&'a NearestQuery>) {
        match self {
            Query::Nearest(q) => out.push(q),
            Query::Bool(b) => {
                for clause in b
                    .must
                    .iter()
                    .chain(&b.should)
                    .chain(&b.must_not)
                    .chain(&b.filter)
                {
                    clause.collect_nearest(out);
                }
            }
            _ => {}
        }
    }
}

impl RangeQuery {
    pub fn new(field: &str) -> Self {
        RangeQuery {
            field: field.to_string(),
            gt: None,
            gte: None,
            lt: None,
            lte: None,
            boost: None,
        }
    }

    /// Range matching exactly `value`.
    pub fn equal_to(field: &str, value: FieldValue) -> Self {
        RangeQuery {
            gte: Some(value.clone()),
            lte: Some(value),
            ..RangeQuery::new(field)
        }
    }
}

impl BoolQuery {
    pub fn new() -> Self {
        BoolQuery {
            must: Vec::new(),
            should: Vec::new(),
            must_not: Vec::new(),
            filter: Vec::new(),
            minimum_should_match: None,
            boost: None,
        }
    }

    pub fn with_must(mut self, query: Query) -> Self {
        self.must.push(query);
        self
    }

    pub fn with_should(mut self, query: Query) -> Self {
        self.should.push(query);
        self
    }

    pub fn with_must_not(mut self, query: Query) -> Self {
        self.must_not.push(query);
        self
    }

    pub fn with_filter(mut self, query: Query) -> Self {
        self.filter.push(query);
        self
    }

    /// Number of `should` clauses a document has to match.
    pub fn required_should(&self) -> usize {
        match self.minimum_should_match {
            Some(n) => n as usize,
            None if self.must.is_empty() && self.filter.is_empty() && !self.should.is_empty() => 1,
            None => 0,
        }
    }
}

impl Default for BoolQuery {
    fn default() -> Self {
        Self::new()
    }
}
