use std::cmp::Ordering;
use std::collections::HashMap;

use crate::core::error::Result;
use crate::index::document::FieldValue;
use crate::index::inverted::wildcard_regex;
use crate::mvcc::controller::LiveSegment;
use crate::query::ast::{
    BoolQuery, NearestQuery, PhraseQuery, PrefixQuery, Query, RangeQuery, TermQuery,
    WildcardQuery,
};
use crate::scoring::scorer::{BM25Scorer, DocStats, Scorer, TermStats};

/// Matching live docs of one segment and their scores
pub type Matches = HashMap<u32, f32>;

/// Scoring statistics over every segment of a snapshot
pub struct CollectionStats<'a> {
    segments: &'a [LiveSegment],
    total_docs: u64,
}

impl<'a> CollectionStats<'a> {
    pub fn new(segments: &'a [LiveSegment]) -> Self {
        let total_docs = segments
            .iter()
            .map(|s| s.segment.doc_count() as u64)
            .sum();
        CollectionStats {
            segments,
            total_docs,
        }
    }

    pub fn term(&self, field: &str, term: &str) -> TermStats {
        let doc_freq = self
            .segments
            .iter()
            .map(|s| s.segment.index.doc_freq(field, term))
            .sum();
        TermStats {
            doc_freq,
            total_docs: self.total_docs.max(1),
        }
    }

    pub fn avg_length(&self, field: &str) -> f32 {
        let tokens: u64 = self
            .segments
            .iter()
            .filter_map(|s| s.segment.index.analyzed.get(field))
            .map(|f| f.total_tokens)
            .sum();
        if self.total_docs == 0 {
            0.0
        } else {
            tokens as f32 / self.total_docs as f32
        }
    }
}

/// Resolves every nearest-neighbour clause of `query` against the whole
/// snapshot, in the order `Query::collect_nearest` visits them.
///
/// kNN is global: the k best live vectors across all segments, not per
/// segment. Each result holds one `Matches` per segment.
pub fn resolve_nearest(query: &Query, segments: &[LiveSegment]) -> Vec<Vec<Matches>> {
    let mut clauses = Vec::new();
    query.collect_nearest(&mut clauses);

    clauses
        .into_iter()
        .map(|clause| nearest_across(clause, segments))
        .collect()
}

fn nearest_across(clause: &NearestQuery, segments: &[LiveSegment]) -> Vec<Matches> {
    let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
    for (seg_idx, live) in segments.iter().enumerate() {
        for (doc, vector) in live.segment.index.field_vectors(&clause.field) {
            if !live.is_live(*doc) {
                continue;
            }
            let similarity = clause.metric.similarity(&clause.vector, vector);
            if let Some(similarity) = similarity.filter(|s| !s.is_nan()) {
                candidates.push((seg_idx, *doc, similarity));
            }
        }
    }

    candidates.sort_by(|a, b| {
        b.2.total_cmp(&a.2)
            .then(a.0.cmp(&b.0))
            .then(a.1.cmp(&b.1))
    });

    // A doc with several vectors counts once, with its best similarity.
    let mut per_segment = vec![Matches::new(); segments.len()];
    let mut taken = 0;
    for (seg_idx, doc, similarity) in candidates {
        if taken == clause.k {
            break;
        }
        if per_segment[seg_idx].contains_key(&doc) {
            continue;
        }
        per_segment[seg_idx].insert(doc, similarity);
        taken += 1;
    }
    per_segment
}

/// Evaluates queries over one segment using the inverted index
pub struct SegmentMatcher<'a> {
    seg_idx: usize,
    segment: &'a LiveSegment,
    stats: &'a CollectionStats<'a>,
    nearest: &'a [Vec<Matches>],
    scorer: BM25Scorer,
}

impl<'a> SegmentMatcher<'a> {
    pub fn new(
        seg_idx: usize,
        segment: &'a LiveSegment,
        stats: &'a CollectionStats<'a>,
        nearest: &'a [Vec<Matches>],
    ) -> Self {
        SegmentMatcher {
            seg_idx,
            segment,
            stats,
            nearest,
            scorer: BM25Scorer::default(),
        }
    }

    /// Live documents matching `query`, with their scores.
    pub fn evaluate(&self, query: &Query) -> Result<Matches> {
        let mut cursor = 0;
        self.eval(query, &mut cursor)
    }

    fn eval(&self, query: &Query, cursor: &mut usize) -> Result<Matches> {
        let boost = query.boost();
        let mut matches = match query {
            Query::MatchAll => self.segment.live_docs().map(|doc| (doc, 1.0)).collect(),
            Query::MatchNone => Matches::new(),
            Query::Term(q) => self.eval_term(q),
            Query::Phrase(q) => self.eval_phrase(q),
            Query::Bool(q) => self.eval_bool(q, cursor)?,
            Query::Range(q) => self.eval_range(q),
            Query::Prefix(q) => self.eval_prefix(q),
            Query::Wildcard(q) => self.eval_wildcard(q)?,
            Query::Nearest(_) => {
                let hits = self
                    .nearest
                    .get(*cursor)
                    .and_then(|per_segment| per_segment.get(self.seg_idx))
                    .cloned()
                    .unwrap_or_default();
                *cursor += 1;
                hits
            }
        };

        if boost != 1.0 {
            for score in matches.values_mut() {
                *score *= boost;
            }
        }
        Ok(matches)
    }

    fn eval_term(&self, query: &TermQuery) -> Matches {
        let index = &self.segment.segment.index;
        let term_stats = self.stats.term(&query.field, &query.value);
        let mut matches = Matches::new();

        if let Some(postings) = index.postings(&query.field, &query.value) {
            let avg_doc_length = self.stats.avg_length(&query.field);
            let field = &index.analyzed[&query.field];
            for posting in &postings.postings {
                if !self.segment.is_live(posting.doc) {
                    continue;
                }
                let doc_stats = DocStats {
                    doc_length: field.doc_length(posting.doc),
                    avg_doc_length,
                };
                *matches.entry(posting.doc).or_insert(0.0) +=
                    self.scorer.score(posting.term_freq, &term_stats, &doc_stats);
            }
        }

        if let Some(docs) = index.exact_docs(&query.field, &query.value) {
            let doc_stats = DocStats {
                doc_length: 1,
                avg_doc_length: 1.0,
            };
            let score = self.scorer.score(1, &term_stats, &doc_stats);
            for doc in docs.iter().filter(|doc| self.segment.is_live(*doc)) {
                *matches.entry(doc).or_insert(0.0) += score;
            }
        }

        matches
    }

    fn eval_phrase(&self, query: &PhraseQuery) -> Matches {
        let index = &self.segment.segment.index;
        let mut matches = Matches::new();

        let mut lists = Vec::with_capacity(query.terms.len());
        for term in &query.terms {
            match index.postings(&query.field, &term.text) {
                Some(list) => lists.push(list),
                None => return matches,
            }
        }
        let Some(first) = lists.first() else {
            return matches;
        };

        let offsets: Vec<u32> = query.terms.iter().map(|t| t.position).collect();
        let avg_doc_length = self.stats.avg_length(&query.field);
        let field = &index.analyzed[&query.field];

        for posting in &first.postings {
            let doc = posting.doc;
            if !self.segment.is_live(doc) {
                continue;
            }

            let mut doc_postings = Vec::with_capacity(lists.len());
            for list in &lists {
                match list.get(doc) {
                    Some(p) => doc_postings.push(p),
                    None => break,
                }
            }
            if doc_postings.len() != lists.len() {
                continue;
            }

            let positions: Vec<&[u32]> = doc_postings
                .iter()
                .map(|p| p.positions.as_slice())
                .collect();
            if !phrase_matches(&positions, &offsets, query.slop) {
                continue;
            }

            let doc_stats = DocStats {
                doc_length: field.doc_length(doc),
                avg_doc_length,
            };
            let score = query
                .terms
                .iter()
                .zip(&doc_postings)
                .map(|(term, p)| {
                    let term_stats = self.stats.term(&query.field, &term.text);
                    self.scorer.score(p.term_freq, &term_stats, &doc_stats)
                })
                .sum();
            matches.insert(doc, score);
        }

        matches
    }

    fn eval_bool(&self, query: &BoolQuery, cursor: &mut usize) -> Result<Matches> {
        // Clause order must follow Query::collect_nearest.
        let must = self.eval_all(&query.must, cursor)?;
        let should = self.eval_all(&query.should, cursor)?;
        let must_not = self.eval_all(&query.must_not, cursor)?;
        let filter = self.eval_all(&query.filter, cursor)?;
        let required_should = query.required_should();

        let candidates: Vec<u32> = if let Some(first) = must.first().or(filter.first()) {
            first.keys().copied().collect()
        } else if !should.is_empty() {
            let mut docs: Vec<u32> = should.iter().flat_map(|m| m.keys().copied()).collect();
            docs.sort_unstable();
            docs.dedup();
            docs
        } else {
            self.segment.live_docs().collect()
        };

        let mut matches = Matches::new();
        for doc in candidates {
            if !must.iter().all(|m| m.contains_key(&doc))
                || !filter.iter().all(|m| m.contains_key(&doc))
                || must_not.iter().any(|m| m.contains_key(&doc))
            {
                continue;
            }

            let should_scores: Vec<f32> = should
                .iter()
                .filter_map(|m| m.get(&doc).copied())
                .collect();
            if should_scores.len() < required_should {
                continue;
            }

            let score = must.iter().filter_map(|m| m.get(&doc)).sum::<f32>()
                + should_scores.iter().sum::<f32>();
            matches.insert(doc, score);
        }

        Ok(matches)
    }

    fn eval_all(&self, queries: &[Query], cursor: &mut usize) -> Result<Vec<Matches>> {
        queries.iter().map(|q| self.eval(q, cursor)).collect()
    }

    fn eval_range(&self, query: &RangeQuery) -> Matches {
        let in_range = |value: &FieldValue| {
            let check = |bound: &Option<FieldValue>, accept: fn(Ordering) -> bool| match bound {
                Some(bound) => value.compare(bound).is_some_and(accept),
                None => true,
            };
            check(&query.gt, |o| o == Ordering::Greater)
                && check(&query.gte, |o| o != Ordering::Less)
                && check(&query.lt, |o| o == Ordering::Less)
                && check(&query.lte, |o| o != Ordering::Greater)
        };

        self.segment
            .segment
            .index
            .field_values(&query.field)
            .iter()
            .filter(|(doc, value)| self.segment.is_live(*doc) && in_range(value))
            .map(|(doc, _)| (*doc, 1.0))
            .collect()
    }

    fn eval_prefix(&self, query: &PrefixQuery) -> Matches {
        let terms = self
            .segment
            .segment
            .index
            .prefix_terms(&query.field, &query.prefix);
        self.constant_score_terms(&query.field, &terms)
    }

    fn eval_wildcard(&self, query: &WildcardQuery) -> Result<Matches> {
        let regex = wildcard_regex(&query.pattern)?;
        let terms = self
            .segment
            .segment
            .index
            .wildcard_terms(&query.field, &regex);
        Ok(self.constant_score_terms(&query.field, &terms))
    }

    // Multi-term queries score every matching doc 1.0
    fn constant_score_terms(&self, field: &str, terms: &[String]) -> Matches {
        let index = &self.segment.segment.index;
        let mut matches = Matches::new();

        for term in terms {
            if let Some(postings) = index.postings(field, term) {
                for posting in &postings.postings {
                    if self.segment.is_live(posting.doc) {
                        matches.insert(posting.doc, 1.0);
                    }
                }
            }
            if let Some(docs) = index.exact_docs(field, term) {
                for doc in docs.iter().filter(|doc| self.segment.is_live(*doc)) {
                    matches.insert(doc, 1.0);
                }
            }
        }

        matches
    }
}

/// Check that the positions of consecutive terms keep the gaps given by
/// `offsets`, each stretched by at most `slop`.
fn phrase_matches(positions: &[&[u32]], offsets: &[u32], slop: u32) -> bool {
    let Some(first) = positions.first() else {
        return false;
    };

    'start: for &start in first.iter() {
        let mut current = start;
        for i in 1..positions.len() {
            let gap = offsets[i].saturating_sub(offsets[i - 1]).max(1);
            let min_pos = current + gap;
            let max_pos = min_pos + slop;

            match positions[i].iter().find(|&&p| p >= min_pos && p <= max_pos) {
                Some(&next) => current = next,
                None => continue 'start,
            }
        }
        return true;
    }

    false
}
