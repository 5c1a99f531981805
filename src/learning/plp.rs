// File: src/learning/plp.rs
use crate::core::default_rule::DefaultRule;
use crate::core::discrepancy::Discrepancy;
use crate::core::inventory::SegmentInventory;
use crate::core::rule::Rule;
use crate::core::segment::Segment;
use crate::core::sequence::Sequence;
use crate::core::types::FeatureName;
use crate::error::Result;
use crate::learning::d2l::D2L;
use crate::learning::{tolerance_principle, Learner, LearnerConfig, Threshold};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Discrepancies keyed by their sorted feature tuple, in the order they were
/// first observed.
///
/// Signatures one feature apart are treated as the same process seen with
/// different amounts of evidence (e.g. `('back',)` and `('back', 'round')`)
/// and merged into the larger one.
#[derive(Debug, Clone, Default)]
pub struct DiscrepancySet {
    entries: Vec<Discrepancy>,
}

fn one_feature_wider(wide: &[FeatureName], narrow: &[FeatureName]) -> bool {
    let wide: BTreeSet<&FeatureName> = wide.iter().collect();
    let narrow: BTreeSet<&FeatureName> = narrow.iter().collect();
    narrow.is_subset(&wide) && wide.len() == narrow.len() + 1
}

impl DiscrepancySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Discrepancy> {
        self.entries.iter()
    }

    pub fn get(&self, feat_diff: &[FeatureName]) -> Option<&Discrepancy> {
        self.entries.iter().find(|d| d.feat_diff() == feat_diff)
    }

    /// Records one alternation under the signature `feat_diff`, merging it
    /// with a neighbouring signature when exactly one candidate qualifies.
    pub fn observe(
        &mut self,
        feat_diff: impl IntoIterator<Item = FeatureName>,
        uf: &Sequence,
        position: usize,
        uf_seg: &Segment,
        sf_seg: &Segment,
    ) {
        let mut key = Discrepancy::new(feat_diff).feat_diff().to_vec();

        let supersets: Vec<&[FeatureName]> = self
            .entries
            .iter()
            .map(|d| d.feat_diff())
            .filter(|wide| one_feature_wider(wide, &key))
            .collect();
        match supersets.as_slice() {
            [] => {}
            [wide] => key = wide.to_vec(),
            many => warn!(
                signature = ?key,
                candidates = ?many,
                "several wider signatures match; keeping the signature separate"
            ),
        }

        let subsets: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, d)| one_feature_wider(&key, d.feat_diff()))
            .map(|(i, _)| i)
            .collect();
        match subsets.as_slice() {
            [] => {}
            [idx] => {
                let mut old = self.entries.remove(*idx);
                debug!(from = ?old.feat_diff(), to = ?key, "widening discrepancy");
                match self.entries.iter_mut().find(|d| d.feat_diff() == key.as_slice()) {
                    Some(existing) => existing.absorb(old),
                    None => {
                        old.set_feat_diff(key.clone());
                        self.entries.push(old);
                    }
                }
            }
            many => warn!(
                signature = ?key,
                candidates = many.len(),
                "several narrower signatures match; leaving them in place"
            ),
        }

        let idx = match self.entries.iter().position(|d| d.feat_diff() == key.as_slice()) {
            Some(idx) => idx,
            None => {
                self.entries.push(Discrepancy::new(key));
                self.entries.len() - 1
            }
        };
        self.entries[idx].add(uf, position, uf_seg, sf_seg);
    }
}

/// What one D2L run learned for one discrepancy.
#[derive(Debug, Clone)]
pub struct Process {
    pub discrepancy: Discrepancy,
    pub rule: Option<Rule>,
    pub default: Option<DefaultRule>,
}

/// Runs D2L once per discrepancy and composes the resulting rules, so that
/// a language with several independent alternations gets one rule for each.
pub struct PlpGrammar {
    config: LearnerConfig,
    threshold: Threshold,
    inventory: SegmentInventory,
    pairs: Vec<(String, String)>,
    discrepancies: DiscrepancySet,
    processes: Vec<Process>,
    rng: StdRng,
}

impl PlpGrammar {
    pub fn new(inventory: SegmentInventory) -> Self {
        Self::with_config(inventory, LearnerConfig::default())
    }

    pub fn with_config(inventory: SegmentInventory, config: LearnerConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.seed),
            config,
            threshold: tolerance_principle,
            inventory,
            pairs: Vec::new(),
            discrepancies: DiscrepancySet::new(),
            processes: Vec::new(),
        }
    }

    pub fn with_threshold(mut self, threshold: Threshold) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn inventory(&self) -> &SegmentInventory {
        &self.inventory
    }

    pub fn discrepancies(&self) -> &DiscrepancySet {
        &self.discrepancies
    }

    pub fn processes(&self) -> &[Process] {
        &self.processes
    }

    fn add_incremental(&mut self, uf_text: &str, sf_text: &str, seen: &mut HashSet<(String, String)>) -> Result<()> {
        self.inventory.register(uf_text);
        self.inventory.register(sf_text);
        let uf = Sequence::parse(uf_text, &self.inventory)?;
        let sf = Sequence::parse(sf_text, &self.inventory)?;

        for (i, (u, s)) in uf.iter().zip(sf.iter()).enumerate() {
            let (Some(uf_seg), Some(sf_seg)) = (u.as_segment(), s.as_segment()) else {
                continue;
            };
            if uf_seg != sf_seg {
                let feat_diff = self.inventory.feat_diff(uf_seg, sf_seg);
                self.discrepancies.observe(feat_diff, &uf, i, uf_seg, sf_seg);
            }
        }

        let pair = (uf_text.to_string(), sf_text.to_string());
        if seen.insert(pair.clone()) {
            self.pairs.push(pair);
        }
        Ok(())
    }

    /// Runs every process in discrepancy order: its rule, then its default.
    pub fn predict(&self, uf: &Sequence) -> Sequence {
        let mut sf = uf.clone();
        for process in &self.processes {
            if let Some(rule) = &process.rule {
                sf = rule.apply(&sf, &self.inventory);
            }
            if self.config.underspec {
                if let Some(default) = &process.default {
                    sf = default.apply(&sf, &self.inventory);
                }
            }
        }
        sf
    }
}

impl Learner for PlpGrammar {
    fn train<S: AsRef<str>>(&mut self, pairs: &[(S, S)]) -> Result<&mut Self> {
        self.pairs.clear();
        self.discrepancies = DiscrepancySet::new();
        self.processes.clear();
        self.rng = StdRng::seed_from_u64(self.config.seed);

        let mut seen = HashSet::new();
        for (uf, sf) in pairs {
            self.add_incremental(uf.as_ref(), sf.as_ref(), &mut seen)?;
        }

        for discrepancy in self.discrepancies.iter() {
            let mut d2l = D2L::with_config(self.inventory.clone(), self.config.clone())
                .with_threshold(self.threshold);
            d2l.train_with_discrepancy(&self.pairs, discrepancy.clone())?;
            self.processes.push(Process {
                discrepancy: discrepancy.clone(),
                rule: d2l.rule().cloned(),
                default: d2l.default_rule().cloned(),
            });
        }
        Ok(self)
    }

    fn produce(&mut self, uf: &str) -> Result<String> {
        self.inventory.register(uf);
        let uf = Sequence::parse(uf, &self.inventory)?;
        Ok(self.predict(&uf).to_string())
    }

    fn choose(&mut self, uf: &str, opt1: &str, opt2: &str) -> Result<String> {
        let predicted = self.produce(uf)?;
        if predicted == opt1 || predicted == opt2 {
            return Ok(predicted);
        }
        let options = [opt1, opt2];
        let chosen = options.choose(&mut self.rng).copied().unwrap_or(opt1);
        Ok(chosen.to_string())
    }
}

impl fmt::Display for PlpGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.processes.is_empty() {
            return f.write_str("No Rule.");
        }
        for (i, process) in self.processes.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            match &process.rule {
                Some(rule) => write!(f, "{}", rule)?,
                None => write!(f, "{}: No Rule.", process.discrepancy)?,
            }
            if let Some(default) = &process.default {
                write!(f, "\n{}", default)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::FeatureValue;
    use pretty_assertions::assert_eq;

    const FINLEY: &str = include_str!("../../tests/fixtures/finley.tsv");

    const TRAIN: [(&str, &str); 6] = [
        ("ʃokuSiS", "ʃokuʃiʃ"),
        ("apʃaS", "apʃaʃ"),
        ("ʃuniS", "ʃuniʃ"),
        ("sokiS", "sokis"),
        ("sigoSiS", "sigosis"),
        ("utS", "uts"),
    ];

    fn observe(set: &mut DiscrepancySet, feats: &[&str]) {
        let a = Segment::new("a", vec![FeatureValue::Plus]);
        let b = Segment::new("b", vec![FeatureValue::Minus]);
        let uf = Sequence::from_segments([a.clone()]);
        set.observe(feats.iter().map(|f| f.to_string()), &uf, 0, &a, &b);
    }

    fn sig(feats: &[&str]) -> Vec<String> {
        feats.iter().map(|f| f.to_string()).collect()
    }

    fn keys(set: &DiscrepancySet) -> Vec<Vec<String>> {
        set.iter().map(|d| d.feat_diff().to_vec()).collect()
    }

    #[test]
    fn narrower_signature_joins_its_superset() {
        let mut set = DiscrepancySet::new();
        observe(&mut set, &["round", "back"]);
        observe(&mut set, &["back"]);
        assert_eq!(keys(&set), vec![vec!["back".to_string(), "round".to_string()]]);
        assert_eq!(set.get(&sig(&["back", "round"])).unwrap().annotated().len(), 2);
    }

    #[test]
    fn wider_signature_takes_over_its_subset() {
        let mut set = DiscrepancySet::new();
        observe(&mut set, &["back"]);
        observe(&mut set, &["back", "round"]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&sig(&["back", "round"])).unwrap().annotated().len(), 2);
        assert!(set.get(&sig(&["back"])).is_none());
    }

    #[test]
    fn ambiguous_supersets_stay_apart() {
        let mut set = DiscrepancySet::new();
        observe(&mut set, &["a", "b"]);
        observe(&mut set, &["a", "c"]);
        observe(&mut set, &["a"]);
        assert_eq!(set.len(), 3);

        // now (a) is the only one-smaller subset of (a, b): it is folded in
        observe(&mut set, &["a", "b"]);
        assert_eq!(
            keys(&set),
            vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["a".to_string(), "c".to_string()],
            ]
        );
        assert_eq!(set.get(&sig(&["a", "b"])).unwrap().annotated().len(), 3);
    }

    #[test]
    fn unrelated_signatures_stay_apart() {
        let mut set = DiscrepancySet::new();
        observe(&mut set, &["voice"]);
        observe(&mut set, &["ant"]);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn single_process_matches_d2l() {
        let mut grammar = PlpGrammar::new(FINLEY.parse().unwrap());
        grammar.train(&TRAIN).unwrap();
        let mut d2l = D2L::new(FINLEY.parse().unwrap());
        d2l.train(&TRAIN).unwrap();

        assert_eq!(grammar.processes().len(), 1);
        let process = &grammar.processes()[0];
        assert_eq!(process.rule.as_ref(), d2l.rule());
        assert_eq!(process.default.as_ref(), d2l.default_rule());
        assert_eq!(grammar.accuracy(&TRAIN).unwrap(), 1.0);
    }

    #[test]
    fn independent_alternations_get_separate_processes() {
        let mut pairs = TRAIN.to_vec();
        pairs.push(("ga", "ka"));
        let mut grammar = PlpGrammar::new(FINLEY.parse().unwrap());
        grammar.train(&pairs).unwrap();

        let signatures: Vec<String> = grammar
            .processes()
            .iter()
            .map(|p| p.discrepancy.to_string())
            .collect();
        assert_eq!(signatures, vec!["('ant',)", "('voice',)"]);
        assert_eq!(
            grammar.processes()[0].rule.as_ref().unwrap().to_string(),
            "{S} --> ('ant',) / {+strid} __ / {+strid}"
        );
        assert_eq!(grammar.produce("ga").unwrap(), "ka");
        assert_eq!(grammar.produce("sokiS").unwrap(), "sokis");
    }

    #[test]
    fn untrained_grammar_reports_no_rule() {
        let mut grammar = PlpGrammar::new(FINLEY.parse().unwrap());
        assert_eq!(grammar.to_string(), "No Rule.");
        assert_eq!(grammar.produce("utS").unwrap(), "utS");
    }
}
