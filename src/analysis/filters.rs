use std::collections::HashSet;

use rust_stemmers::{Algorithm, Stemmer};

use crate::analysis::token::Token;

/// One stage of an analyzer pipeline, applied after tokenization
pub trait TokenFilter: Send + Sync {
    fn filter(&self, tokens: Vec<Token>) -> Vec<Token>;

    fn name(&self) -> &str;
}

pub struct LowercaseFilter;

impl TokenFilter for LowercaseFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in &mut tokens {
            if token.text.chars().any(char::is_uppercase) {
                token.text = token.text.to_lowercase();
            }
        }
        tokens
    }

    fn name(&self) -> &str {
        "lowercase"
    }
}

/// Drops common words. Positions of the remaining tokens are untouched, so
/// phrase matching still sees the gap.
pub struct StopWordFilter {
    words: HashSet<&'static str>,
}

const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with",
];

impl StopWordFilter {
    pub fn english() -> Self {
        StopWordFilter {
            words: ENGLISH_STOP_WORDS.iter().copied().collect(),
        }
    }
}

impl TokenFilter for StopWordFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        tokens.retain(|token| !self.words.contains(token.text.as_str()));
        tokens
    }

    fn name(&self) -> &str {
        "stop_words"
    }
}

pub struct StemmerFilter {
    stemmer: Stemmer,
}

impl StemmerFilter {
    pub fn new(algorithm: Algorithm) -> Self {
        StemmerFilter {
            stemmer: Stemmer::create(algorithm),
        }
    }
}

impl TokenFilter for StemmerFilter {
    fn filter(&self, mut tokens: Vec<Token>) -> Vec<Token> {
        for token in &mut tokens {
            let stemmed = self.stemmer.stem(&token.text);
            if stemmed != token.text {
                token.text = stemmed.into_owned();
            }
        }
        tokens
    }

    fn name(&self) -> &str {
        "stemmer"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(words: &[&str]) -> Vec<Token> {
        words
            .iter()
            .enumerate()
            .map(|(i, w)| Token::new(w.to_string(), i as u32, 0))
            .collect()
    }

    #[test]
    fn test_stop_words_keep_positions() {
        let out = StopWordFilter::english().filter(tokens(&["the", "left", "of", "darkness"]));
        let kept: Vec<_> = out.iter().map(|t| (t.text.as_str(), t.position)).collect();
        assert_eq!(kept, vec![("left", 1), ("darkness", 3)]);
    }

    #[test]
    fn test_lowercase_then_stem() {
        let lowered = LowercaseFilter.filter(tokens(&["Dragons", "RUNNING"]));
        let stemmed = StemmerFilter::new(Algorithm::English).filter(lowered);
        let texts: Vec<_> = stemmed.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["dragon", "run"]);
    }
}
