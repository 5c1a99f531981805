// src/core/inventory.rs
use crate::core::natural_class::NaturalClass;
use crate::core::segment::Segment;
use crate::core::types::{Direction, FeatureConstraint, FeatureName, FeatureValue, UNKNOWN_CHAR};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// The feature-matrix database: maps symbols to feature vectors and back, and
/// owns the feature algebra every other component is built on.
///
/// The inventory is append-only. Symbols are registered explicitly through
/// [`SegmentInventory::register`] by whoever owns the inventory (the learner);
/// lookups and matching never add anything.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentInventory {
    feature_space: Vec<FeatureName>,
    segments: BTreeMap<String, Segment>,
    /// First-registered symbol for each feature vector.
    by_features: BTreeMap<Vec<FeatureValue>, String>,
    max_symbol_chars: usize,
}

impl SegmentInventory {
    pub fn new(feature_space: Vec<FeatureName>) -> Self {
        Self {
            feature_space,
            segments: BTreeMap::new(),
            by_features: BTreeMap::new(),
            max_symbol_chars: 1,
        }
    }

    /// Parses a tab-separated feature table: a header `ipa<TAB>feat...` followed
    /// by one `symbol<TAB>value...` row per segment. `#` lines are comments.
    pub fn from_table(text: &str) -> Result<Self> {
        let mut rows = text
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line.trim_end_matches('\r')))
            .filter(|(_, line)| !line.trim().is_empty() && !line.trim_start().starts_with('#'));

        let (header_line, header) = rows.next().ok_or(Error::MalformedInventory {
            line: 0,
            reason: "missing header".to_string(),
        })?;
        let feature_space: Vec<FeatureName> = header
            .split('\t')
            .skip(1)
            .map(|col| col.trim().to_string())
            .collect();
        if feature_space.is_empty() || feature_space.iter().any(|f| f.is_empty()) {
            return Err(Error::MalformedInventory {
                line: header_line,
                reason: "header must name at least one feature".to_string(),
            });
        }

        let mut inventory = Self::new(feature_space);
        for (line, row) in rows {
            let mut cols = row.split('\t');
            let symbol = cols
                .next()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| Error::MalformedInventory {
                    line,
                    reason: "missing symbol".to_string(),
                })?;
            let features = cols
                .map(|v| {
                    v.trim().parse::<FeatureValue>().map_err(|_| Error::MalformedInventory {
                        line,
                        reason: format!("invalid feature value '{}'", v.trim()),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            inventory.insert(symbol, features)?;
        }
        for group in inventory.check_unique() {
            tracing::warn!(symbols = ?group, "symbols share a feature vector");
        }
        Ok(inventory)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_table(&text)
    }

    /// Adds a segment. Returns `false` if the symbol was already known, in
    /// which case the existing feature vector is kept.
    pub fn insert(&mut self, symbol: &str, features: Vec<FeatureValue>) -> Result<bool> {
        if features.len() != self.feature_space.len() {
            return Err(Error::FeatureArity {
                symbol: symbol.to_string(),
                expected: self.feature_space.len(),
                found: features.len(),
            });
        }
        if self.segments.contains_key(symbol) {
            return Ok(false);
        }
        self.by_features
            .entry(features.clone())
            .or_insert_with(|| symbol.to_string());
        self.max_symbol_chars = self.max_symbol_chars.max(symbol.chars().count());
        self.segments
            .insert(symbol.to_string(), Segment::new(symbol, features));
        Ok(true)
    }

    /// Registers every symbol of `text` not yet in the inventory, giving it an
    /// all-unspecified feature vector. Returns how many symbols were added.
    /// The unknown marker is never registered.
    pub fn register(&mut self, text: &str) -> usize {
        let mut added = 0;
        for token in self.tokenize(text) {
            if token == UNKNOWN_CHAR || self.segments.contains_key(&token) {
                continue;
            }
            tracing::warn!(symbol = %token, "registering symbol missing from the feature table");
            let features = vec![FeatureValue::Unspecified; self.feature_space.len()];
            if let Ok(true) = self.insert(&token, features) {
                added += 1;
            }
        }
        added
    }

    /// Splits text into symbols, preferring the longest known symbol at each
    /// position and falling back to a single character.
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let mut tokens = Vec::with_capacity(chars.len());
        let mut i = 0;
        while i < chars.len() {
            let longest = self.max_symbol_chars.min(chars.len() - i);
            let width = (2..=longest)
                .rev()
                .find(|&w| {
                    let candidate: String = chars[i..i + w].iter().collect();
                    self.segments.contains_key(&candidate)
                })
                .unwrap_or(1);
            tokens.push(chars[i..i + width].iter().collect());
            i += width;
        }
        tokens
    }

    pub fn feature_space(&self) -> &[FeatureName] {
        &self.feature_space
    }

    pub fn feature_index(&self, feature: &str) -> Option<usize> {
        self.feature_space.iter().position(|f| f == feature)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.values()
    }

    pub fn segment(&self, symbol: &str) -> Option<&Segment> {
        self.segments.get(symbol)
    }

    /// Finds the segment carrying exactly this feature vector.
    pub fn lookup(&self, features: &[FeatureValue]) -> Option<&Segment> {
        self.by_features
            .get(features)
            .and_then(|symbol| self.segments.get(symbol))
    }

    /// A segment's value for a named feature.
    pub fn value(&self, seg: &Segment, feature: &str) -> Option<FeatureValue> {
        let idx = self.feature_index(feature)?;
        seg.features().get(idx).copied()
    }

    pub fn satisfies(&self, seg: &Segment, constraint: &FeatureConstraint) -> bool {
        self.value(seg, &constraint.feature) == Some(constraint.value)
    }

    /// The specified feature values of a segment, as constraints (`+strid`, `-ant`, ...).
    pub fn feat_vals(&self, seg: &Segment) -> BTreeSet<FeatureConstraint> {
        self.feature_space
            .iter()
            .zip(seg.features())
            .filter(|(_, value)| value.is_specified())
            .map(|(feature, value)| FeatureConstraint::new(*value, feature.clone()))
            .collect()
    }

    /// The constraints every segment of `segs` satisfies.
    pub fn shared_feats<'a, I>(&self, segs: I) -> BTreeSet<FeatureConstraint>
    where
        I: IntoIterator<Item = &'a Segment>,
    {
        let mut segs = segs.into_iter();
        let Some(first) = segs.next() else {
            return BTreeSet::new();
        };
        let mut shared = self.feat_vals(first);
        for seg in segs {
            let vals = self.feat_vals(seg);
            shared.retain(|c| vals.contains(c));
        }
        shared
    }

    /// Names of the features on which two segments disagree.
    pub fn feat_diff(&self, a: &Segment, b: &Segment) -> BTreeSet<FeatureName> {
        self.feature_space
            .iter()
            .zip(a.features().iter().zip(b.features()))
            .filter(|(_, (x, y))| x != y)
            .map(|(feature, _)| feature.clone())
            .collect()
    }

    /// Builds a natural class from constraint strings, rejecting features
    /// outside this inventory's feature space.
    pub fn class<S: AsRef<str>>(&self, feats: &[S]) -> Result<NaturalClass> {
        let class = NaturalClass::parse(feats)?;
        if let Some(unknown) = class
            .feats()
            .iter()
            .find(|c| self.feature_index(&c.feature).is_none())
        {
            return Err(Error::UnknownFeature(unknown.feature.clone()));
        }
        Ok(class)
    }

    pub fn extension(&self, class: &NaturalClass) -> BTreeSet<Segment> {
        self.segments()
            .filter(|seg| class.contains_segment(seg, self))
            .cloned()
            .collect()
    }

    pub fn extension_complement(&self, class: &NaturalClass) -> BTreeSet<Segment> {
        self.segments()
            .filter(|seg| !class.contains_segment(seg, self))
            .cloned()
            .collect()
    }

    pub fn complement(&self, segs: &BTreeSet<Segment>) -> BTreeSet<Segment> {
        self.segments()
            .filter(|seg| !segs.contains(*seg))
            .cloned()
            .collect()
    }

    /// `seg` with the values of `feats` copied from `target`.
    ///
    /// With `only_underspec`, a feature `seg` already specifies may not be
    /// changed to a different value.
    pub fn assimilate(
        &self,
        seg: &Segment,
        target: &Segment,
        feats: &[FeatureName],
        only_underspec: bool,
    ) -> Option<Segment> {
        self.rewrite(seg, target, feats, only_underspec, Some)
    }

    /// `seg` with the opposite of `target`'s values for `feats`.
    pub fn dissimilate(
        &self,
        seg: &Segment,
        target: &Segment,
        feats: &[FeatureName],
        only_underspec: bool,
    ) -> Option<Segment> {
        self.rewrite(seg, target, feats, only_underspec, FeatureValue::opposite)
    }

    pub fn operate(
        &self,
        direction: Direction,
        seg: &Segment,
        target: &Segment,
        feats: &[FeatureName],
        only_underspec: bool,
    ) -> Option<Segment> {
        match direction {
            Direction::Assimilate => self.assimilate(seg, target, feats, only_underspec),
            Direction::Dissimilate => self.dissimilate(seg, target, feats, only_underspec),
        }
    }

    fn rewrite(
        &self,
        seg: &Segment,
        target: &Segment,
        feats: &[FeatureName],
        only_underspec: bool,
        transfer: impl Fn(FeatureValue) -> Option<FeatureValue>,
    ) -> Option<Segment> {
        let mut features = seg.features().to_vec();
        for feature in feats {
            let idx = self.feature_index(feature)?;
            let value = transfer(*target.features().get(idx)?)?;
            let current = features.get_mut(idx)?;
            if only_underspec && current.is_specified() && *current != value {
                return None;
            }
            *current = value;
        }
        self.lookup(&features).cloned()
    }

    /// Every segment reachable from `seg` by assigning `+`/`-` to the free
    /// features among `feats`. Under `only_underspec` only the features `seg`
    /// leaves unspecified are free.
    pub fn permute(
        &self,
        seg: &Segment,
        feats: &[FeatureName],
        only_underspec: bool,
    ) -> BTreeSet<Segment> {
        let free: Vec<usize> = feats
            .iter()
            .filter_map(|f| self.feature_index(f))
            .filter(|&idx| {
                !only_underspec || seg.features().get(idx) == Some(&FeatureValue::Unspecified)
            })
            .collect();

        let mut reachable = BTreeSet::new();
        for mask in 0..(1usize << free.len()) {
            let mut features = seg.features().to_vec();
            for (bit, &idx) in free.iter().enumerate() {
                if let Some(value) = features.get_mut(idx) {
                    *value = if mask & (1 << bit) != 0 {
                        FeatureValue::Plus
                    } else {
                        FeatureValue::Minus
                    };
                }
            }
            if let Some(found) = self.lookup(&features) {
                reachable.insert(found.clone());
            }
        }
        reachable
    }

    /// The segment that differs from `seg` only by being `+feature`.
    pub fn with_feats(&self, seg: &Segment, feature: &str) -> Option<Segment> {
        self.set_value(seg, feature, FeatureValue::Plus)
    }

    /// The segment that differs from `seg` only by being `-feature`.
    pub fn without_feats(&self, seg: &Segment, feature: &str) -> Option<Segment> {
        self.set_value(seg, feature, FeatureValue::Minus)
    }

    fn set_value(&self, seg: &Segment, feature: &str, value: FeatureValue) -> Option<Segment> {
        let idx = self.feature_index(feature)?;
        let mut features = seg.features().to_vec();
        *features.get_mut(idx)? = value;
        self.lookup(&features).cloned()
    }

    /// Groups of two or more symbols that share one feature vector. A data
    /// quality diagnostic: such symbols cannot be told apart by any rule.
    pub fn check_unique(&self) -> Vec<BTreeSet<String>> {
        let mut groups: BTreeMap<&[FeatureValue], BTreeSet<String>> = BTreeMap::new();
        for seg in self.segments() {
            groups
                .entry(seg.features())
                .or_default()
                .insert(seg.symbol().to_string());
        }
        groups
            .into_values()
            .filter(|symbols| symbols.len() > 1)
            .collect()
    }
}

impl FromStr for SegmentInventory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_table(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::segment::Symbol;
    use crate::core::sequence::Sequence;
    use pretty_assertions::assert_eq;

    const FINLEY: &str = include_str!("../../tests/fixtures/finley.tsv");
    const CONSONANTS: &str = include_str!("../../tests/fixtures/consonants.tsv");

    fn feats(names: &[&str]) -> Vec<FeatureName> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn seg(inventory: &SegmentInventory, symbol: &str) -> Segment {
        inventory.segment(symbol).unwrap().clone()
    }

    fn symbol(found: Option<Segment>) -> Option<String> {
        found.map(|s| s.symbol().to_string())
    }

    #[test]
    fn fixture_tables_are_unique() {
        let finley: SegmentInventory = FINLEY.parse().unwrap();
        assert!(finley.check_unique().is_empty());
        let consonants: SegmentInventory = CONSONANTS.parse().unwrap();
        assert!(consonants.check_unique().is_empty());
    }

    #[test]
    fn duplicate_vectors_are_reported() {
        let inventory = SegmentInventory::from_table("ipa\tvoice\nb\t+\nβ\t+\np\t-\n").unwrap();
        let expected: BTreeSet<String> = ["b", "β"].iter().map(|s| s.to_string()).collect();
        assert_eq!(inventory.check_unique(), vec![expected]);
        assert_eq!(inventory.lookup(&[FeatureValue::Plus]).unwrap().symbol(), "b");
    }

    #[test]
    fn lookup_round_trips_feature_vectors() {
        let inventory: SegmentInventory = CONSONANTS.parse().unwrap();
        for symbol in ["b", "p"] {
            let s = seg(&inventory, symbol);
            assert_eq!(inventory.lookup(s.features()).unwrap().symbol(), symbol);
        }
    }

    #[test]
    fn feat_diff_of_sibilants() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let s = seg(&inventory, "s");
        let expected: BTreeSet<FeatureName> = feats(&["ant"]).into_iter().collect();
        assert_eq!(inventory.feat_diff(&s, &seg(&inventory, "S")), expected);
        assert_eq!(inventory.feat_diff(&s, &seg(&inventory, "ʃ")), expected);
    }

    #[test]
    fn extension_complement_of_stridents() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let nc = NaturalClass::parse(&["+strid"]).unwrap();
        let comp = inventory.extension_complement(&nc);
        for symbol in ["s", "ʃ", "S"] {
            assert!(!comp.contains(&seg(&inventory, symbol)));
        }
        for symbol in ["p", "a"] {
            assert!(comp.contains(&seg(&inventory, symbol)));
        }
        assert_eq!(comp.len() + 3, inventory.len());
    }

    #[test]
    fn with_and_without_voice() {
        let inventory: SegmentInventory = CONSONANTS.parse().unwrap();
        let b = seg(&inventory, "b");
        let p = seg(&inventory, "p");
        assert_eq!(inventory.without_feats(&b, "voice"), Some(p.clone()));
        assert_eq!(inventory.with_feats(&p, "voice"), Some(b));
        assert_eq!(inventory.with_feats(&p, "nonexistent"), None);
    }

    #[test]
    fn assimilate_copies_target_values() {
        let inventory: SegmentInventory = CONSONANTS.parse().unwrap();
        let voice = feats(&["voice"]);
        let d = seg(&inventory, "D");
        let a = seg(&inventory, "a");
        let t = seg(&inventory, "t");
        assert_eq!(symbol(inventory.assimilate(&d, &a, &voice, true)), Some("d".into()));
        assert_eq!(symbol(inventory.assimilate(&t, &a, &voice, false)), Some("d".into()));
        // t is already voiceless, so it may not be rewritten under underspecification
        assert_eq!(inventory.assimilate(&t, &a, &voice, true), None);
    }

    #[test]
    fn assimilate_fails_without_matching_segment() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let k = seg(&inventory, "k");
        let s = seg(&inventory, "s");
        assert_eq!(inventory.assimilate(&k, &s, &feats(&["ant"]), false), None);
        let sh = seg(&inventory, "S");
        assert_eq!(
            symbol(inventory.assimilate(&sh, &seg(&inventory, "ʃ"), &feats(&["ant"]), true)),
            Some("ʃ".into())
        );
    }

    #[test]
    fn dissimilate_voice() {
        let inventory: SegmentInventory = CONSONANTS.parse().unwrap();
        let voice = feats(&["voice"]);
        let d = seg(&inventory, "d");
        assert_eq!(symbol(inventory.dissimilate(&d, &d, &voice, false)), Some("t".into()));
        assert_eq!(
            symbol(inventory.dissimilate(&seg(&inventory, "g"), &d, &voice, false)),
            Some("k".into())
        );
        assert_eq!(inventory.dissimilate(&seg(&inventory, "m"), &d, &voice, false), None);
    }

    #[test]
    fn dissimilate_liquids() {
        let inventory: SegmentInventory = CONSONANTS.parse().unwrap();
        let bundle = feats(&["ant", "lat"]);
        let r = seg(&inventory, "r");
        let l = seg(&inventory, "l");
        assert_eq!(symbol(inventory.dissimilate(&r, &r, &bundle, false)), Some("l".into()));
        assert_eq!(symbol(inventory.dissimilate(&l, &l, &bundle, false)), Some("r".into()));
    }

    #[test]
    fn dissimilating_from_unspecified_fails() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let sh = seg(&inventory, "S");
        assert_eq!(inventory.dissimilate(&sh, &seg(&inventory, "a"), &feats(&["ant"]), true), None);
    }

    #[test]
    fn permute_enumerates_surface_options() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let ant = feats(&["ant"]);
        let options: Vec<String> = inventory
            .permute(&seg(&inventory, "S"), &ant, true)
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(options, vec!["s", "ʃ"]);
        let fixed = inventory.permute(&seg(&inventory, "s"), &ant, true);
        assert_eq!(fixed.len(), 1);
        assert_eq!(inventory.permute(&seg(&inventory, "s"), &ant, false).len(), 2);
    }

    #[test]
    fn shared_feats_exclude_disagreements() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let sibilants = [seg(&inventory, "s"), seg(&inventory, "ʃ"), seg(&inventory, "S")];
        let shared = inventory.shared_feats(sibilants.iter());
        assert!(shared.contains(&"+strid".parse().unwrap()));
        assert!(shared.contains(&"+cons".parse().unwrap()));
        assert!(shared.iter().all(|c| c.feature != "ant"));
    }

    #[test]
    fn register_adds_unseen_symbols_once() {
        let mut inventory: SegmentInventory = FINLEY.parse().unwrap();
        let before = inventory.len();
        assert_eq!(inventory.register("sokix"), 1);
        assert_eq!(inventory.register("x"), 0);
        assert_eq!(inventory.len(), before + 1);
        let x = seg(&inventory, "x");
        assert!(x.features().iter().all(|v| *v == FeatureValue::Unspecified));
    }

    #[test]
    fn unknown_marker_stays_out_of_the_inventory() {
        let mut inventory: SegmentInventory = FINLEY.parse().unwrap();
        let before = inventory.len();
        assert_eq!(inventory.register("pa?"), 0);
        assert_eq!(inventory.len(), before);
        assert!(inventory.segment("?").is_none());

        let seq = Sequence::parse("pa?", &inventory).unwrap();
        assert_eq!(seq[2], Symbol::Unknown);
        let vowels = NaturalClass::parse(&["-cons"]).unwrap();
        assert!(inventory
            .extension_complement(&vowels)
            .iter()
            .all(|s| s.symbol() != "?"));
    }

    #[test]
    fn class_rejects_foreign_features() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let strident = inventory.class(&["+strid"]).unwrap();
        assert_eq!(strident.name(), "{+strid}");
        assert!(matches!(
            inventory.class(&["+strid", "-lat"]),
            Err(Error::UnknownFeature(f)) if f == "lat"
        ));
        assert!(matches!(
            inventory.class(&["strid"]),
            Err(Error::InvalidFeatureValue(_))
        ));
    }

    #[test]
    fn tokenize_prefers_longest_symbol() {
        let mut inventory = SegmentInventory::new(feats(&["long"]));
        inventory.insert("a", vec![FeatureValue::Minus]).unwrap();
        inventory.insert("aː", vec![FeatureValue::Plus]).unwrap();
        assert_eq!(inventory.tokenize("taːa"), vec!["t", "aː", "a"]);
    }

    #[test]
    fn malformed_tables_are_rejected() {
        assert!(SegmentInventory::from_table("").is_err());
        assert!(SegmentInventory::from_table("ipa\tvoice\nb\t?\n").is_err());
        assert!(matches!(
            SegmentInventory::from_table("ipa\tvoice\tson\nb\t+\n"),
            Err(Error::FeatureArity { .. })
        ));
    }
}
