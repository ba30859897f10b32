pub mod ast;
pub mod builder;
pub mod matcher;

pub use ast::{
    BoolQuery, NearestQuery, PhraseQuery, PhraseTerm, PrefixQuery, Query, RangeQuery, TermQuery,
    WildcardQuery,
};
pub use builder::{QueryBuilder, RangeBuilder};
