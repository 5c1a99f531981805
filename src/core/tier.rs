// src/core/tier.rs
use crate::core::inventory::SegmentInventory;
use crate::core::natural_class::{natural_class_equals_segment_set, NaturalClass};
use crate::core::segment::{Segment, Symbol};
use crate::core::sequence::Sequence;
use crate::core::types::render_tuple;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// What stays on a tier: a natural class, or an explicit segment set once the
/// search can no longer describe the tier with a single feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierSet {
    Class(NaturalClass),
    Segments(BTreeSet<Segment>),
}

impl TierSet {
    pub fn contains(&self, symbol: &Symbol, inventory: &SegmentInventory) -> bool {
        match self {
            TierSet::Class(class) => class.contains(symbol, inventory),
            TierSet::Segments(segs) => symbol.as_segment().is_some_and(|seg| segs.contains(seg)),
        }
    }

    /// Set equality across representations: two classes compare by their
    /// constraints, a class and a raw set compare by the class's extension.
    pub fn same_as(&self, other: &TierSet, inventory: &SegmentInventory) -> bool {
        match (self, other) {
            (TierSet::Class(a), TierSet::Class(b)) => a == b,
            (TierSet::Segments(a), TierSet::Segments(b)) => a == b,
            (TierSet::Class(class), TierSet::Segments(segs))
            | (TierSet::Segments(segs), TierSet::Class(class)) => {
                natural_class_equals_segment_set(class, segs, inventory)
            }
        }
    }
}

impl fmt::Display for TierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TierSet::Class(class) => write!(f, "{}", class),
            TierSet::Segments(segs) => f.write_str(&render_tuple(segs, false)),
        }
    }
}

/// A projection filter keeping only the segments in its tierset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tier {
    tierset: TierSet,
    delset: BTreeSet<Segment>,
}

impl Tier {
    pub fn new(tierset: TierSet, inventory: &SegmentInventory) -> Self {
        let delset = match &tierset {
            TierSet::Class(class) => inventory.extension_complement(class),
            TierSet::Segments(segs) => inventory.complement(segs),
        };
        Self { tierset, delset }
    }

    /// The tier everything projects onto unchanged.
    pub fn universal(inventory: &SegmentInventory) -> Self {
        Self::new(TierSet::Class(NaturalClass::wildcard()), inventory)
    }

    pub fn tierset(&self) -> &TierSet {
        &self.tierset
    }

    /// The segments the tier removes.
    pub fn delset(&self) -> &BTreeSet<Segment> {
        &self.delset
    }

    pub fn contains(&self, symbol: &Symbol, inventory: &SegmentInventory) -> bool {
        self.tierset.contains(symbol, inventory)
    }

    /// Indices into `seq` of the symbols that survive projection.
    pub fn positions(&self, seq: &Sequence, inventory: &SegmentInventory) -> Vec<usize> {
        seq.iter()
            .enumerate()
            .filter(|(_, symbol)| self.contains(symbol, inventory))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn project(&self, seq: &Sequence, inventory: &SegmentInventory) -> Sequence {
        Sequence::new(
            self.positions(seq, inventory)
                .into_iter()
                .map(|i| seq[i].clone())
                .collect(),
        )
    }

    /// Projects an aligned pair in lock-step: the i-th surface symbol is kept
    /// wherever the i-th underlying symbol is on the tier.
    pub fn project_pair(
        &self,
        uf: &Sequence,
        sf: &Sequence,
        inventory: &SegmentInventory,
    ) -> (Sequence, Sequence) {
        let mut uf_tier = Sequence::default();
        let mut sf_tier = Sequence::default();
        for i in self.positions(uf, inventory) {
            if let Some(surface) = sf.get(i) {
                uf_tier.push(uf[i].clone());
                sf_tier.push(surface.clone());
            }
        }
        (uf_tier, sf_tier)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tierset)
    }
}
