use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::index::document::Document;

/// Position of a document inside a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocAddress {
    pub segment: usize,
    pub doc: u32,
}

/// Document with relevance score
#[derive(Debug, Clone)]
pub struct ScoredDocument {
    pub address: DocAddress,
    pub score: f32,
    pub document: Document,
}

/// Search results container
#[derive(Debug, Clone, Default)]
pub struct TopDocs {
    pub total_hits: usize,
    pub hits: Vec<ScoredDocument>,
}

/// A ranked match before its stored document is fetched
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    pub address: DocAddress,
    pub score: f32,
}

// Greater means ranked lower, so the heap top is the worst hit kept
impl Ord for Hit {
    fn cmp(&self, other: &Self) -> Ordering {
        rank_score(other.score)
            .total_cmp(&rank_score(self.score))
            .then(self.address.cmp(&other.address))
    }
}

// NaN ranks below every real score
fn rank_score(score: f32) -> f32 {
    if score.is_nan() { f32::NEG_INFINITY } else { score }
}

impl PartialOrd for Hit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Hit {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Hit {}

/// Top-K collector for relevance-ranked result collection
pub struct TopKCollector {
    heap: BinaryHeap<Hit>,
    k: usize,
}

impl TopKCollector {
    pub fn new(k: usize) -> Self {
        TopKCollector {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            k,
        }
    }

    pub fn collect(&mut self, hit: Hit) {
        if self.k == 0 {
            return;
        }

        if self.heap.len() < self.k {
            self.heap.push(hit);
        } else if let Some(worst) = self.heap.peek() {
            if hit < *worst {
                self.heap.pop();
                self.heap.push(hit);
            }
        }
    }

    /// Best hit first.
    pub fn into_sorted(self) -> Vec<Hit> {
        self.heap.into_sorted_vec()
    }
}
