pub mod distance;
pub mod scorer;

pub use distance::DistanceMetric;
pub use scorer::{BM25Scorer, DocStats, Scorer, TermStats};
