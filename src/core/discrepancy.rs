// src/core/discrepancy.rs
use crate::core::segment::{Segment, Symbol};
use crate::core::sequence::Sequence;
use crate::core::types::{render_tuple, FeatureName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One place where an underlying form surfaced differently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub uf: Sequence,
    pub position: usize,
    pub surface: Segment,
}

/// All the evidence for one feature-difference signature.
///
/// Two discrepancies are the same phenomenon when their signatures match,
/// whatever evidence each has collected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    feat_diff: Vec<FeatureName>,
    alternations: BTreeSet<(Segment, Segment)>,
    annotated: Vec<Annotation>,
}

impl Discrepancy {
    pub fn new(feat_diff: impl IntoIterator<Item = FeatureName>) -> Self {
        let mut feat_diff: Vec<FeatureName> = feat_diff.into_iter().collect();
        feat_diff.sort();
        feat_diff.dedup();
        Self {
            feat_diff,
            alternations: BTreeSet::new(),
            annotated: Vec::new(),
        }
    }

    pub fn add(&mut self, uf: &Sequence, position: usize, uf_seg: &Segment, sf_seg: &Segment) {
        self.annotated.push(Annotation {
            uf: uf.clone(),
            position,
            surface: sf_seg.clone(),
        });
        self.alternations.insert((uf_seg.clone(), sf_seg.clone()));
    }

    /// Takes over another discrepancy's evidence.
    pub fn absorb(&mut self, other: Discrepancy) {
        self.alternations.extend(other.alternations);
        self.annotated.extend(other.annotated);
    }

    pub fn feat_diff(&self) -> &[FeatureName] {
        &self.feat_diff
    }

    pub(crate) fn set_feat_diff(&mut self, feat_diff: Vec<FeatureName>) {
        self.feat_diff = feat_diff;
    }

    pub fn alternations(&self) -> &BTreeSet<(Segment, Segment)> {
        &self.alternations
    }

    pub fn annotated(&self) -> &[Annotation] {
        &self.annotated
    }

    /// Every segment taking part in an alternation, on either side.
    pub fn alternating(&self) -> BTreeSet<Segment> {
        self.alternations
            .iter()
            .flat_map(|(uf, sf)| [uf.clone(), sf.clone()])
            .collect()
    }

    /// The underlying segments that alternate.
    pub fn alternating_ufs(&self) -> BTreeSet<Segment> {
        self.alternations.iter().map(|(uf, _)| uf.clone()).collect()
    }

    /// Whether an aligned (underlying, surface) pair is one of the alternations.
    pub fn contains(&self, uf: &Symbol, sf: &Symbol) -> bool {
        match (uf.as_segment(), sf.as_segment()) {
            (Some(uf), Some(sf)) => self.alternations.contains(&(uf.clone(), sf.clone())),
            _ => false,
        }
    }
}

impl PartialEq for Discrepancy {
    fn eq(&self, other: &Self) -> bool {
        self.feat_diff == other.feat_diff
    }
}

impl Eq for Discrepancy {}

impl Hash for Discrepancy {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.feat_diff.hash(state);
    }
}

impl fmt::Display for Discrepancy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render_tuple(&self.feat_diff, true))
    }
}
