use std::sync::Arc;

use rayon::prelude::*;

use crate::core::error::Result;
use crate::index::document::Document;
use crate::mvcc::controller::Generation;
use crate::query::ast::Query;
use crate::query::matcher::{CollectionStats, Matches, SegmentMatcher, resolve_nearest};
use crate::search::results::{DocAddress, Hit, ScoredDocument, TopDocs, TopKCollector};
use crate::search::sort::Sort;

/// Point-in-time reader over one published generation
///
/// Holding a snapshot keeps its generation alive; later commits never
/// change what it sees. Dropping it releases the generation.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: Arc<Generation>,
}

impl Snapshot {
    pub fn new(generation: Arc<Generation>) -> Self {
        Snapshot { generation }
    }

    pub fn version(&self) -> u64 {
        self.generation.version
    }

    pub fn generation(&self) -> &Generation {
        &self.generation
    }

    /// Live documents.
    pub fn doc_count(&self) -> u64 {
        self.generation.doc_count()
    }

    pub fn count(&self, query: &Query) -> Result<usize> {
        Ok(self.matches(query)?.iter().map(|m| m.len()).sum())
    }

    /// Best `limit` matches in `sort` order; `total_hits` counts them all.
    pub fn search(&self, query: &Query, limit: usize, sort: &Sort) -> Result<TopDocs> {
        let per_segment = self.matches(query)?;
        let total_hits = per_segment.iter().map(|m| m.len()).sum();

        let hits = per_segment
            .iter()
            .enumerate()
            .flat_map(|(segment, matches)| {
                matches.iter().map(move |(doc, score)| Hit {
                    address: DocAddress {
                        segment,
                        doc: *doc,
                    },
                    score: *score,
                })
            });

        let ranked: Vec<Hit> = if sort.is_relevance() {
            let mut collector = TopKCollector::new(limit);
            for hit in hits {
                collector.collect(hit);
            }
            collector.into_sorted()
        } else {
            let mut all: Vec<(Hit, &Document)> = hits
                .filter_map(|hit| self.document(hit.address).map(|doc| (hit, doc)))
                .collect();
            all.sort_by(|a, b| sort.compare((&a.0, a.1), (&b.0, b.1)));
            all.truncate(limit);
            all.into_iter().map(|(hit, _)| hit).collect()
        };

        let hits = ranked
            .into_iter()
            .filter_map(|hit| {
                self.document(hit.address).map(|document| ScoredDocument {
                    address: hit.address,
                    score: hit.score,
                    document: document.clone(),
                })
            })
            .collect();

        Ok(TopDocs { total_hits, hits })
    }

    pub fn document(&self, address: DocAddress) -> Option<&Document> {
        let live = self.generation.segments.get(address.segment)?;
        if !live.is_live(address.doc) {
            return None;
        }
        live.segment.document(address.doc)
    }

    fn matches(&self, query: &Query) -> Result<Vec<Matches>> {
        let segments = &self.generation.segments;
        let stats = CollectionStats::new(segments);
        let nearest = resolve_nearest(query, segments);

        segments
            .par_iter()
            .enumerate()
            .map(|(idx, segment)| {
                SegmentMatcher::new(idx, segment, &stats, &nearest).evaluate(query)
            })
            .collect()
    }
}
