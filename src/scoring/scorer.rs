/// Collection statistics for one term in one field
#[derive(Debug, Clone, Copy)]
pub struct TermStats {
    pub doc_freq: u64,   // Documents containing the term
    pub total_docs: u64, // Documents in the snapshot
}

impl TermStats {
    pub fn idf(&self) -> f32 {
        let n = self.total_docs as f32;
        let df = self.doc_freq as f32;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

/// Document statistics for scoring
#[derive(Debug, Clone, Copy)]
pub struct DocStats {
    pub doc_length: u32,     // Number of tokens in the field
    pub avg_doc_length: f32, // Average field length in the snapshot
}

/// Scorer trait
pub trait Scorer: Send + Sync {
    fn score(&self, term_freq: u32, term: &TermStats, doc: &DocStats) -> f32;

    fn name(&self) -> &str;
}

/// BM25 Scorer
#[derive(Debug, Clone, Copy)]
pub struct BM25Scorer {
    pub k1: f32, // Term frequency saturation (default: 1.2)
    pub b: f32,  // Length normalization strength (default: 0.75)
}

impl Default for BM25Scorer {
    fn default() -> Self {
        BM25Scorer { k1: 1.2, b: 0.75 }
    }
}

impl Scorer for BM25Scorer {
    fn score(&self, term_freq: u32, term: &TermStats, doc: &DocStats) -> f32 {
        let tf = term_freq as f32;
        let doc_len = doc.doc_length as f32;
        let avg_doc_len = if doc.avg_doc_length > 0.0 {
            doc.avg_doc_length
        } else {
            1.0
        };

        let numerator = term.idf() * tf * (self.k1 + 1.0);
        let denominator = tf + self.k1 * (1.0 - self.b + self.b * (doc_len / avg_doc_len));

        numerator / denominator
    }

    fn name(&self) -> &str {
        "bm25"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rarer_terms_score_higher() {
        let scorer = BM25Scorer::default();
        let doc = DocStats {
            doc_length: 10,
            avg_doc_length: 10.0,
        };
        let rare = TermStats {
            doc_freq: 1,
            total_docs: 100,
        };
        let common = TermStats {
            doc_freq: 90,
            total_docs: 100,
        };
        assert!(scorer.score(1, &rare, &doc) > scorer.score(1, &common, &doc));
    }

    #[test]
    fn test_score_is_positive_when_every_doc_matches() {
        let scorer = BM25Scorer::default();
        let stats = TermStats {
            doc_freq: 5,
            total_docs: 5,
        };
        let doc = DocStats {
            doc_length: 3,
            avg_doc_length: 0.0,
        };
        assert!(scorer.score(2, &stats, &doc) > 0.0);
    }
}
