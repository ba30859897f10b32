pub mod analyzer;
pub mod filters;
pub mod token;
pub mod tokenizer;

pub use analyzer::{Analyzer, AnalyzerRegistry, KEYWORD_ANALYZER, SIMPLE_ANALYZER, STANDARD_ANALYZER};
pub use token::Token;
