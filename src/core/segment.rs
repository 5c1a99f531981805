// src/core/segment.rs
use crate::core::types::{FeatureValue, LEFT_WORD_BOUNDARY, RIGHT_WORD_BOUNDARY, UNKNOWN_CHAR};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// An atomic symbol together with its feature vector.
/// Identity, hashing and ordering all go through the symbol alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    symbol: String,
    features: Vec<FeatureValue>,
}

impl Segment {
    pub fn new(symbol: impl Into<String>, features: Vec<FeatureValue>) -> Self {
        Self {
            symbol: symbol.into(),
            features,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn features(&self) -> &[FeatureValue] {
        &self.features
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl Eq for Segment {}

impl Hash for Segment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.symbol.hash(state);
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        self.symbol.cmp(&other.symbol)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.symbol)
    }
}

/// One position of a word as the learner sees it: a real segment, one of the
/// word-boundary sentinels, or the marker left behind by an unresolvable rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    Segment(Segment),
    LeftBoundary,
    RightBoundary,
    Unknown,
}

impl Symbol {
    pub fn as_str(&self) -> &str {
        match self {
            Symbol::Segment(seg) => seg.symbol(),
            Symbol::LeftBoundary => LEFT_WORD_BOUNDARY,
            Symbol::RightBoundary => RIGHT_WORD_BOUNDARY,
            Symbol::Unknown => UNKNOWN_CHAR,
        }
    }

    pub fn as_segment(&self) -> Option<&Segment> {
        match self {
            Symbol::Segment(seg) => Some(seg),
            _ => None,
        }
    }

    pub fn is_boundary(&self) -> bool {
        matches!(self, Symbol::LeftBoundary | Symbol::RightBoundary)
    }

    fn rank(&self) -> u8 {
        match self {
            Symbol::Segment(_) => 0,
            Symbol::LeftBoundary => 1,
            Symbol::RightBoundary => 2,
            Symbol::Unknown => 3,
        }
    }
}

impl From<Segment> for Symbol {
    fn from(seg: Segment) -> Self {
        Symbol::Segment(seg)
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Sorted by rendered text so that sets of symbols print in a stable order.
impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_str()
            .cmp(other.as_str())
            .then_with(|| self.rank().cmp(&other.rank()))
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn equality_is_by_symbol() {
        let s1 = Segment::new("b", vec![FeatureValue::Plus, FeatureValue::Minus]);
        let s2 = Segment::new("b", vec![]);
        let s3 = Segment::new("p", vec![FeatureValue::Plus, FeatureValue::Minus]);
        assert_eq!(s1, s2);
        assert_ne!(s1, s3);
    }

    #[test]
    fn hashing_is_by_symbol() {
        let s1 = Segment::new("b", vec![FeatureValue::Plus]);
        let s2 = Segment::new("b", vec![FeatureValue::Minus]);
        let s3 = Segment::new("p", vec![FeatureValue::Plus]);
        let segs: HashSet<Segment> = [s1.clone()].into_iter().collect();
        assert!(segs.contains(&s1));
        assert!(segs.contains(&s2));
        assert!(!segs.contains(&s3));
    }

    #[test]
    fn symbols_sort_by_text() {
        let mut syms = vec![
            Symbol::RightBoundary,
            Symbol::Segment(Segment::new("ʃ", vec![])),
            Symbol::Segment(Segment::new("S", vec![])),
            Symbol::LeftBoundary,
        ];
        syms.sort();
        let text: Vec<&str> = syms.iter().map(|s| s.as_str()).collect();
        assert_eq!(text, vec!["S", "ʃ", "⋉", "⋊"]);
    }
}
