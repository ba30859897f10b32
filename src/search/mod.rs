pub mod results;
pub mod sort;

pub use results::{DocAddress, ScoredDocument, TopDocs};
pub use sort::{Sort, SortField};
