use std::collections::HashMap;

use regex::Regex;
use roaring::RoaringBitmap;

use crate::analysis::analyzer::AnalyzerRegistry;
use crate::core::error::{Error, Result};
use crate::index::document::{Document, FieldValue, Indexing};
use crate::index::posting::PostingList;

// Gap inserted between the values of a multi-valued analyzed field so
// phrases do not match across element boundaries.
const POSITION_GAP: u32 = 100;

/// Analyzed postings of one field
#[derive(Debug, Default)]
pub struct FieldPostings {
    pub terms: HashMap<String, PostingList>,
    pub doc_lengths: HashMap<u32, u32>,
    pub total_tokens: u64,
}

impl FieldPostings {
    pub fn doc_length(&self, doc: u32) -> u32 {
        self.doc_lengths.get(&doc).copied().unwrap_or(0)
    }
}

/// Inverted index structure over the documents of one segment
///
/// Built in memory when a segment is loaded; nothing here is persisted.
#[derive(Debug, Default)]
pub struct InvertedIndex {
    pub analyzed: HashMap<String, FieldPostings>,
    pub exact: HashMap<String, HashMap<String, RoaringBitmap>>,
    pub values: HashMap<String, Vec<(u32, FieldValue)>>,
    pub vectors: HashMap<String, Vec<(u32, Vec<f32>)>>,
    pub doc_count: u32,
}

impl InvertedIndex {
    pub fn build(documents: &[Document], analyzers: &AnalyzerRegistry) -> Result<Self> {
        let mut index = InvertedIndex::default();
        for (ordinal, document) in documents.iter().enumerate() {
            index.add_document(ordinal as u32, document, analyzers)?;
        }
        Ok(index)
    }

    fn add_document(
        &mut self,
        doc: u32,
        document: &Document,
        analyzers: &AnalyzerRegistry,
    ) -> Result<()> {
        let mut next_position: HashMap<&str, u32> = HashMap::new();

        for entry in &document.entries {
            match &entry.indexing {
                Indexing::Analyzed(analyzer) => {
                    let Some(text) = entry.value.token() else {
                        continue;
                    };
                    let tokens = analyzers.analyze(analyzer, &text).ok_or_else(|| {
                        Error::Corrupt(format!(
                            "field '{}' uses unknown analyzer '{}'",
                            entry.name, analyzer
                        ))
                    })?;

                    let base = next_position.get(entry.name.as_str()).copied().unwrap_or(0);
                    let postings = self.analyzed.entry(entry.name.clone()).or_default();
                    let mut last = base;
                    for token in &tokens {
                        let position = base + token.position;
                        last = last.max(position);
                        postings
                            .terms
                            .entry(token.text.clone())
                            .or_default()
                            .record(doc, position);
                    }
                    *postings.doc_lengths.entry(doc).or_insert(0) += tokens.len() as u32;
                    postings.total_tokens += tokens.len() as u64;
                    next_position.insert(entry.name.as_str(), last + POSITION_GAP);
                }
                Indexing::Exact => {
                    if let Some(term) = entry.value.token() {
                        self.exact
                            .entry(entry.name.clone())
                            .or_default()
                            .entry(term)
                            .or_default()
                            .insert(doc);
                    }
                    self.values
                        .entry(entry.name.clone())
                        .or_default()
                        .push((doc, entry.value.clone()));
                }
                Indexing::Numeric => {
                    self.values
                        .entry(entry.name.clone())
                        .or_default()
                        .push((doc, entry.value.clone()));
                }
                Indexing::Vector => {
                    if let FieldValue::Vector(vector) = &entry.value {
                        self.vectors
                            .entry(entry.name.clone())
                            .or_default()
                            .push((doc, vector.clone()));
                    }
                }
                Indexing::Sortable | Indexing::StoredOnly => {}
            }
        }

        self.doc_count = self.doc_count.max(doc + 1);
        Ok(())
    }

    pub fn postings(&self, field: &str, term: &str) -> Option<&PostingList> {
        self.analyzed.get(field).and_then(|f| f.terms.get(term))
    }

    pub fn exact_docs(&self, field: &str, term: &str) -> Option<&RoaringBitmap> {
        self.exact.get(field).and_then(|terms| terms.get(term))
    }

    pub fn doc_freq(&self, field: &str, term: &str) -> u64 {
        let analyzed = self.postings(field, term).map_or(0, |p| p.doc_freq() as u64);
        let exact = self.exact_docs(field, term).map_or(0, |d| d.len());
        analyzed + exact
    }

    /// Every term of `field`, analyzed and exact.
    pub fn terms<'a>(&'a self, field: &str) -> impl Iterator<Item = &'a str> + 'a {
        let analyzed = self
            .analyzed
            .get(field)
            .into_iter()
            .flat_map(|f| f.terms.keys().map(String::as_str));
        let exact = self
            .exact
            .get(field)
            .into_iter()
            .flat_map(|t| t.keys().map(String::as_str));
        analyzed.chain(exact)
    }

    pub fn prefix_terms(&self, field: &str, prefix: &str) -> Vec<String> {
        self.terms(field)
            .filter(|term| term.starts_with(prefix))
            .map(String::from)
            .collect()
    }

    pub fn wildcard_terms(&self, field: &str, pattern: &Regex) -> Vec<String> {
        self.terms(field)
            .filter(|term| pattern.is_match(term))
            .map(String::from)
            .collect()
    }

    pub fn field_values(&self, field: &str) -> &[(u32, FieldValue)] {
        self.values.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_vectors(&self, field: &str) -> &[(u32, Vec<f32>)] {
        self.vectors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Converts a `*`/`?` wildcard pattern into an anchored regex.
pub fn wildcard_regex(pattern: &str) -> Result<Regex> {
    let mut regex_pattern = String::with_capacity(pattern.len() + 2);
    regex_pattern.push('^');
    for ch in pattern.chars() {
        match ch {
            '*' => regex_pattern.push_str(".*"),
            '?' => regex_pattern.push('.'),
            other => regex_pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex_pattern.push('$');

    Regex::new(&regex_pattern)
        .map_err(|e| Error::InvalidQuery(format!("invalid wildcard '{}': {}", pattern, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::document::FieldEntry;

    fn sample() -> Vec<Document> {
        let mut first = Document::new();
        first.push(FieldEntry::new(
            "title",
            FieldValue::Str("Running dogs".into()),
            Indexing::Analyzed("standard".into()),
        ));
        first.push(FieldEntry::new("tag", FieldValue::Str("pets".into()), Indexing::Exact));
        first.push(FieldEntry::new("year", FieldValue::I64(2001), Indexing::Numeric));

        let mut second = Document::new();
        second.push(FieldEntry::new(
            "title",
            FieldValue::Str("a dog".into()),
            Indexing::Analyzed("standard".into()),
        ));
        second.push(FieldEntry::new(
            "embedding",
            FieldValue::Vector(vec![1.0, 0.0]),
            Indexing::Vector,
        ));
        vec![first, second]
    }

    #[test]
    fn test_build_indexes_every_mode() {
        let index = InvertedIndex::build(&sample(), &AnalyzerRegistry::new()).unwrap();

        assert_eq!(index.doc_count, 2);
        assert_eq!(index.doc_freq("title", "dog"), 2);
        assert_eq!(index.analyzed["title"].doc_length(0), 2);
        assert!(index.exact_docs("tag", "pets").unwrap().contains(0));
        assert_eq!(index.field_values("year").len(), 1);
        assert_eq!(index.field_vectors("embedding")[0].0, 1);
    }

    #[test]
    fn test_multi_valued_fields_do_not_form_phrases() {
        let mut doc = Document::new();
        for text in ["new", "york"] {
            doc.push(
                FieldEntry::new(
                    "tags",
                    FieldValue::Str(text.into()),
                    Indexing::Analyzed("simple".into()),
                )
                .multi(true),
            );
        }
        let index = InvertedIndex::build(&[doc], &AnalyzerRegistry::new()).unwrap();
        let new = index.postings("tags", "new").unwrap().get(0).unwrap().positions[0];
        let york = index.postings("tags", "york").unwrap().get(0).unwrap().positions[0];
        assert!(york - new > 1);
    }

    #[test]
    fn test_unknown_analyzer_is_corrupt() {
        let mut doc = Document::new();
        doc.push(FieldEntry::new(
            "title",
            FieldValue::Str("x".into()),
            Indexing::Analyzed("nope".into()),
        ));
        assert!(matches!(
            InvertedIndex::build(&[doc], &AnalyzerRegistry::new()),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn test_wildcard_regex_is_anchored_and_escaped() {
        let regex = wildcard_regex("d?g*").unwrap();
        assert!(regex.is_match("dogs"));
        assert!(!regex.is_match("hotdog"));
        assert!(wildcard_regex("a.b").unwrap().is_match("a.b"));
        assert!(!wildcard_regex("a.b").unwrap().is_match("axb"));
    }
}
