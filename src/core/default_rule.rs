// src/core/default_rule.rs
use crate::core::inventory::SegmentInventory;
use crate::core::rule::Change;
use crate::core::segment::{Segment, Symbol};
use crate::core::sequence::Sequence;
use crate::core::types::{render_set, render_tuple, FeatureName, FeatureValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// The elsewhere condition: every target segment receives fixed values for
/// the rule's features, regardless of context or tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRule {
    target: BTreeSet<Segment>,
    feats: Vec<FeatureName>,
    vals: Vec<FeatureValue>,
}

impl DefaultRule {
    pub fn new(target: BTreeSet<Segment>, feats: Vec<FeatureName>, vals: Vec<FeatureValue>) -> Self {
        Self { target, feats, vals }
    }

    pub fn target(&self) -> &BTreeSet<Segment> {
        &self.target
    }

    pub fn feats(&self) -> &[FeatureName] {
        &self.feats
    }

    pub fn vals(&self) -> &[FeatureValue] {
        &self.vals
    }

    pub fn matches(&self, symbol: &Symbol) -> bool {
        symbol.as_segment().is_some_and(|seg| self.target.contains(seg))
    }

    pub fn get_changes(&self, seq: &Sequence, inventory: &SegmentInventory) -> Vec<Change> {
        seq.iter()
            .enumerate()
            .filter(|(_, symbol)| self.matches(symbol))
            .filter_map(|(idx, symbol)| {
                let seg = symbol.as_segment()?;
                let mut features = seg.features().to_vec();
                for (feat, val) in self.feats.iter().zip(&self.vals) {
                    if let Some(slot) = inventory.feature_index(feat).and_then(|i| features.get_mut(i)) {
                        *slot = *val;
                    }
                }
                let change = inventory
                    .lookup(&features)
                    .cloned()
                    .map_or(Symbol::Unknown, Symbol::Segment);
                Some((idx, change))
            })
            .collect()
    }

    pub fn apply(&self, seq: &Sequence, inventory: &SegmentInventory) -> Sequence {
        let mut out = seq.clone();
        for (idx, change) in self.get_changes(seq, inventory) {
            out.set(idx, change);
        }
        out
    }
}

impl fmt::Display for DefaultRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(default) {} --> {} {} / __",
            render_set(&self.target),
            render_tuple(&self.vals, true),
            render_tuple(&self.feats, true)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINLEY: &str = include_str!("../../tests/fixtures/finley.tsv");

    fn anterior_default(inventory: &SegmentInventory) -> DefaultRule {
        DefaultRule::new(
            [inventory.segment("S").unwrap().clone()].into_iter().collect(),
            vec!["ant".to_string()],
            vec![FeatureValue::Plus],
        )
    }

    #[test]
    fn rewrites_every_target() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let default = anterior_default(&inventory);
        let seq = Sequence::parse("SaSu", &inventory).unwrap();
        assert_eq!(default.apply(&seq, &inventory).to_string(), "sasu");
    }

    #[test]
    fn renders_canonical_form() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        assert_eq!(
            anterior_default(&inventory).to_string(),
            "(default) {S} --> ('+',) ('ant',) / __"
        );
    }

    #[test]
    fn missing_segment_becomes_unknown() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let default = DefaultRule::new(
            [inventory.segment("a").unwrap().clone()].into_iter().collect(),
            vec!["ant".to_string()],
            vec![FeatureValue::Plus],
        );
        let seq = Sequence::parse("pa", &inventory).unwrap();
        assert_eq!(default.apply(&seq, &inventory).to_string(), "p?");
    }
}
