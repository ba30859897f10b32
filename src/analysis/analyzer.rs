use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use rust_stemmers::Algorithm;

use crate::analysis::filters::{LowercaseFilter, StemmerFilter, StopWordFilter, TokenFilter};
use crate::analysis::token::Token;
use crate::analysis::tokenizer::{KeywordTokenizer, StandardTokenizer, Tokenizer};

pub const STANDARD_ANALYZER: &str = "standard";
pub const KEYWORD_ANALYZER: &str = "keyword";
pub const SIMPLE_ANALYZER: &str = "simple";

/// Text analysis pipeline
pub struct Analyzer {
    pub tokenizer: Box<dyn Tokenizer>,
    pub filters: Vec<Box<dyn TokenFilter>>,
    pub name: String,
}

impl Analyzer {
    pub fn new(name: String, tokenizer: Box<dyn Tokenizer>) -> Self {
        Analyzer {
            tokenizer,
            filters: Vec::new(),
            name,
        }
    }

    pub fn add_filter(mut self, filter: Box<dyn TokenFilter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn analyze(&self, text: &str) -> Vec<Token> {
        let mut tokens = self.tokenizer.tokenize(text);

        for filter in &self.filters {
            tokens = filter.filter(tokens);
        }

        tokens
    }

    /// English words: lowercased, stop words removed, stemmed.
    pub fn standard_english() -> Self {
        Analyzer::new(
            STANDARD_ANALYZER.to_string(),
            Box::new(StandardTokenizer::default()),
        )
        .add_filter(Box::new(LowercaseFilter))
        .add_filter(Box::new(StopWordFilter::english()))
        .add_filter(Box::new(StemmerFilter::new(Algorithm::English)))
    }

    /// Exact-token analyzer for identifiers and keywords. No stemming, no case folding.
    pub fn keyword() -> Self {
        Analyzer::new(KEYWORD_ANALYZER.to_string(), Box::new(KeywordTokenizer))
    }

    /// Lowercased words without stemming or stop words.
    pub fn simple() -> Self {
        Analyzer::new(
            SIMPLE_ANALYZER.to_string(),
            Box::new(StandardTokenizer::default()),
        )
        .add_filter(Box::new(LowercaseFilter))
    }
}

static SHARED: LazyLock<Arc<AnalyzerRegistry>> =
    LazyLock::new(|| Arc::new(AnalyzerRegistry::new()));

/// Registry for managing analyzers
///
/// Built once and then shared read-only between the schema (query side) and the
/// engine (index side), so both analyze a field the same way.
pub struct AnalyzerRegistry {
    analyzers: HashMap<String, Arc<Analyzer>>,
}

impl AnalyzerRegistry {
    pub fn new() -> Self {
        let mut registry = AnalyzerRegistry {
            analyzers: HashMap::new(),
        };

        registry.register(Analyzer::standard_english());
        registry.register(Analyzer::keyword());
        registry.register(Analyzer::simple());
        registry
    }

    /// Process-wide registry holding the built-in analyzers.
    pub fn shared() -> Arc<AnalyzerRegistry> {
        SHARED.clone()
    }

    pub fn register(&mut self, analyzer: Analyzer) {
        self.analyzers
            .insert(analyzer.name.clone(), Arc::new(analyzer));
    }

    pub fn get(&self, name: &str) -> Option<Arc<Analyzer>> {
        self.analyzers.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.analyzers.contains_key(name)
    }

    /// Analyze with the named analyzer; `None` when it is not registered.
    pub fn analyze(&self, analyzer_name: &str, text: &str) -> Option<Vec<Token>> {
        self.analyzers
            .get(analyzer_name)
            .map(|analyzer| analyzer.analyze(text))
    }
}

impl fmt::Debug for AnalyzerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.analyzers.keys().collect();
        names.sort();
        f.debug_struct("AnalyzerRegistry")
            .field("analyzers", &names)
            .finish()
    }
}

impl Default for AnalyzerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
