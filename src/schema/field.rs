use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::schema::constraint::Constraint;

/// Semantic role of a record field
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKind {
    /// The record's identity. Exactly one per schema; always exact-matched.
    UniqueId,
    Keyword,
    ForeignKey,
    /// Projected into the reserved `_sort` field
    SortKey,
    Text,
    DefaultSearch,
    Vector,
    /// Carried in the structured form only, never indexed
    MetaTagsOnly,
    /// Indexed according to the runtime value type
    Auto,
}

/// Group of kinds sharing one encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KindFamily {
    Exact,
    Vector,
    Dynamic,
    Sort,
    Ignored,
}

impl FieldKind {
    pub const ALL: [FieldKind; 9] = [
        FieldKind::UniqueId,
        FieldKind::Keyword,
        FieldKind::ForeignKey,
        FieldKind::SortKey,
        FieldKind::Text,
        FieldKind::DefaultSearch,
        FieldKind::Vector,
        FieldKind::MetaTagsOnly,
        FieldKind::Auto,
    ];

    /// Lower wins when picking the kind that owns the stored value.
    pub fn precedence(self) -> u8 {
        match self {
            FieldKind::UniqueId => 0,
            FieldKind::Keyword => 1,
            FieldKind::ForeignKey => 2,
            FieldKind::Vector => 3,
            FieldKind::Text | FieldKind::DefaultSearch | FieldKind::Auto => 4,
            FieldKind::SortKey => 5,
            FieldKind::MetaTagsOnly => 6,
        }
    }

    pub fn family(self) -> KindFamily {
        match self {
            FieldKind::UniqueId | FieldKind::Keyword | FieldKind::ForeignKey => KindFamily::Exact,
            FieldKind::Vector => KindFamily::Vector,
            FieldKind::Text | FieldKind::DefaultSearch | FieldKind::Auto => KindFamily::Dynamic,
            FieldKind::SortKey => KindFamily::Sort,
            FieldKind::MetaTagsOnly => KindFamily::Ignored,
        }
    }

    pub fn is_keyword_like(self) -> bool {
        self.family() == KindFamily::Exact
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Name, kinds and constraints of one record field
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub kinds: BTreeSet<FieldKind>,
    pub constraints: Vec<Arc<dyn Constraint>>,
}

impl FieldDescriptor {
    pub fn new(name: &str) -> Self {
        FieldDescriptor {
            name: name.to_string(),
            kinds: BTreeSet::new(),
            constraints: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn kinds(mut self, kinds: &[FieldKind]) -> Self {
        self.kinds.extend(kinds.iter().copied());
        self
    }

    pub fn constraint(mut self, constraint: impl Constraint + 'static) -> Self {
        self.constraints.push(Arc::new(constraint));
        self
    }

    pub fn has_kind(&self, kind: FieldKind) -> bool {
        self.kinds.contains(&kind)
    }

    /// Kind owning the stored representation.
    pub fn primary_kind(&self) -> Option<FieldKind> {
        self.kinds.iter().copied().min_by_key(|k| k.precedence())
    }

    /// One kind per family, primary first.
    pub fn encoding_kinds(&self) -> Vec<FieldKind> {
        let mut kinds: Vec<FieldKind> = self.kinds.iter().copied().collect();
        kinds.sort_by_key(|k| k.precedence());

        let mut seen = Vec::new();
        kinds.retain(|k| {
            let family = k.family();
            if seen.contains(&family) {
                false
            } else {
                seen.push(family);
                true
            }
        });
        kinds
    }

    /// Meta-only fields never reach the engine.
    pub fn is_indexed(&self) -> bool {
        !self.has_kind(FieldKind::MetaTagsOnly)
    }

    pub fn is_keyword_like(&self) -> bool {
        self.kinds.iter().any(|k| k.is_keyword_like())
    }
}
