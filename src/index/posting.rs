/// Occurrences of one term in one document
#[derive(Debug, Clone)]
pub struct Posting {
    pub doc: u32,
    pub term_freq: u32,
    pub positions: Vec<u32>, // Token positions for phrase queries
}

/// Posting list for a term
/// Note: Sorted by doc ordinal for efficient merging
#[derive(Debug, Clone, Default)]
pub struct PostingList {
    pub postings: Vec<Posting>,
}

impl PostingList {
    pub fn new() -> Self {
        PostingList {
            postings: Vec::new(),
        }
    }

    /// Adds one occurrence of the term at `position` in `doc`.
    pub fn record(&mut self, doc: u32, position: u32) {
        match self.postings.binary_search_by_key(&doc, |p| p.doc) {
            Ok(idx) => {
                let posting = &mut self.postings[idx];
                posting.term_freq += 1;
                posting.positions.push(position);
            }
            Err(idx) => {
                self.postings.insert(
                    idx,
                    Posting {
                        doc,
                        term_freq: 1,
                        positions: vec![position],
                    },
                );
            }
        }
    }

    pub fn get(&self, doc: u32) -> Option<&Posting> {
        self.postings
            .binary_search_by_key(&doc, |p| p.doc)
            .ok()
            .map(|idx| &self.postings[idx])
    }

    pub fn len(&self) -> usize {
        self.postings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.postings.is_empty()
    }

    pub fn doc_freq(&self) -> u32 {
        self.postings.len() as u32
    }

    /// Intersect two posting lists (simple linear merge), returning doc ordinals
    pub fn intersect(&self, other: &PostingList) -> Vec<u32> {
        let mut result = Vec::new();
        let mut i = 0;
        let mut j = 0;

        while i < self.postings.len() && j < other.postings.len() {
            let a = self.postings[i].doc;
            let b = other.postings[j].doc;

            if a == b {
                result.push(a);
                i += 1;
                j += 1;
            } else if a < b {
                i += 1;
            } else {
                j += 1;
            }
        }

        result
    }
}
