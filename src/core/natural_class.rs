// src/core/natural_class.rs
use crate::core::inventory::SegmentInventory;
use crate::core::segment::{Segment, Symbol};
use crate::core::types::FeatureConstraint;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A class of segments defined by feature constraints, e.g. `{+strid}`.
/// The concrete member set is never stored; it is recomputed against the
/// inventory on demand, so the class follows the inventory as it grows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NaturalClass {
    feats: BTreeSet<FeatureConstraint>,
    wildcard: bool,
}

impl NaturalClass {
    pub fn new(feats: impl IntoIterator<Item = FeatureConstraint>) -> Self {
        Self {
            feats: feats.into_iter().collect(),
            wildcard: false,
        }
    }

    /// The class containing everything, rendered `{*}`.
    pub fn wildcard() -> Self {
        Self {
            feats: BTreeSet::new(),
            wildcard: true,
        }
    }

    /// Builds a class from constraint strings such as `"+strid"`.
    pub fn parse<S: AsRef<str>>(feats: &[S]) -> Result<Self> {
        let feats = feats
            .iter()
            .map(|f| f.as_ref().parse::<FeatureConstraint>())
            .collect::<Result<BTreeSet<_>>>()?;
        Ok(Self::new(feats))
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn feats(&self) -> &BTreeSet<FeatureConstraint> {
        &self.feats
    }

    pub fn add_feat(&mut self, feat: FeatureConstraint) {
        self.feats.insert(feat);
    }

    pub fn remove_feat(&mut self, feat: &FeatureConstraint) {
        self.feats.remove(feat);
    }

    pub fn len(&self) -> usize {
        self.feats.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.wildcard && self.feats.is_empty()
    }

    pub fn name(&self) -> String {
        if self.wildcard {
            return "{*}".to_string();
        }
        let feats: Vec<String> = self.feats.iter().map(|f| f.to_string()).collect();
        format!("{{{}}}", feats.join(","))
    }

    pub fn contains_segment(&self, seg: &Segment, inventory: &SegmentInventory) -> bool {
        self.wildcard || self.feats.iter().all(|c| inventory.satisfies(seg, c))
    }

    /// Boundaries and the unknown marker only belong to the wildcard class.
    pub fn contains(&self, symbol: &Symbol, inventory: &SegmentInventory) -> bool {
        if self.wildcard {
            return true;
        }
        match symbol {
            Symbol::Segment(seg) => self.contains_segment(seg, inventory),
            _ => false,
        }
    }

    pub fn extension(&self, inventory: &SegmentInventory) -> BTreeSet<Segment> {
        inventory.extension(self)
    }

    /// The members of `segs` that belong to this class.
    pub fn intersection(
        &self,
        segs: &BTreeSet<Segment>,
        inventory: &SegmentInventory,
    ) -> BTreeSet<Segment> {
        segs.iter()
            .filter(|seg| self.contains_segment(seg, inventory))
            .cloned()
            .collect()
    }
}

impl fmt::Display for NaturalClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A class equals a raw segment set when its extension is exactly that set.
pub fn natural_class_equals_segment_set(
    class: &NaturalClass,
    segs: &BTreeSet<Segment>,
    inventory: &SegmentInventory,
) -> bool {
    &inventory.extension(class) == segs
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINLEY: &str = include_str!("../../tests/fixtures/finley.tsv");

    #[test]
    fn strident_class_membership() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let nc = NaturalClass::parse(&["+strid"]).unwrap();
        let member = |s: &str| nc.contains_segment(inventory.segment(s).unwrap(), &inventory);
        assert!(member("s"));
        assert!(member("ʃ"));
        assert!(member("S"));
        assert!(!member("p"));
        assert!(!member("a"));
        assert!(!nc.contains(&Symbol::LeftBoundary, &inventory));
    }

    #[test]
    fn names_are_sorted_constraints() {
        let nc = NaturalClass::parse(&["+strid", "+cons"]).unwrap();
        assert_eq!(nc.name(), "{+cons,+strid}");
        assert_eq!(NaturalClass::wildcard().name(), "{*}");
    }

    #[test]
    fn wildcard_contains_everything() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let nc = NaturalClass::wildcard();
        assert!(nc.contains(&Symbol::RightBoundary, &inventory));
        assert_eq!(nc.extension(&inventory).len(), inventory.len());
    }

    #[test]
    fn adding_a_feature_narrows_the_class() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let mut nc = NaturalClass::parse(&["+strid"]).unwrap();
        assert_eq!(nc.extension(&inventory).len(), 3);
        nc.add_feat("-ant".parse().unwrap());
        let ext: Vec<String> = nc
            .extension(&inventory)
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(ext, vec!["ʃ"]);
        nc.remove_feat(&"-ant".parse().unwrap());
        assert_eq!(nc.len(), 1);
    }

    #[test]
    fn class_compares_to_its_extension() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let nc = NaturalClass::parse(&["+strid"]).unwrap();
        let segs: BTreeSet<Segment> = ["s", "ʃ", "S"]
            .iter()
            .map(|s| inventory.segment(s).unwrap().clone())
            .collect();
        assert!(natural_class_equals_segment_set(&nc, &segs, &inventory));
        let fewer: BTreeSet<Segment> = segs.iter().take(2).cloned().collect();
        assert!(!natural_class_equals_segment_set(&nc, &fewer, &inventory));
    }
}
