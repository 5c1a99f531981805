// src/core/rule.rs
use crate::core::inventory::SegmentInventory;
use crate::core::natural_class::NaturalClass;
use crate::core::segment::{Segment, Symbol};
use crate::core::sequence::Sequence;
use crate::core::tier::{Tier, TierSet};
use crate::core::types::{render_set, render_tuple, Direction, FeatureName};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A rewrite the rule wants to make: position in the full sequence and the
/// symbol to put there (`Symbol::Unknown` when no segment fits).
pub type Change = (usize, Symbol);

/// The symbols a rule's context may be: a natural class, or the raw set of
/// contexts observed in training (which may include word boundaries).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextSet {
    Class(NaturalClass),
    Symbols(BTreeSet<Symbol>),
}

impl ContextSet {
    pub fn contains(&self, symbol: &Symbol, inventory: &SegmentInventory) -> bool {
        match self {
            ContextSet::Class(class) => class.contains(symbol, inventory),
            ContextSet::Symbols(symbols) => symbols.contains(symbol),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ContextSet::Class(class) => class.is_empty(),
            ContextSet::Symbols(symbols) => symbols.is_empty(),
        }
    }

    /// False when the set holds nothing but word boundaries.
    pub fn has_segments(&self) -> bool {
        match self {
            ContextSet::Class(_) => true,
            ContextSet::Symbols(symbols) => symbols.iter().any(|s| !s.is_boundary()),
        }
    }
}

impl From<&TierSet> for ContextSet {
    fn from(tierset: &TierSet) -> Self {
        match tierset {
            TierSet::Class(class) => ContextSet::Class(class.clone()),
            TierSet::Segments(segs) => {
                ContextSet::Symbols(segs.iter().cloned().map(Symbol::Segment).collect())
            }
        }
    }
}

impl fmt::Display for ContextSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSet::Class(class) => write!(f, "{}", class),
            ContextSet::Symbols(symbols) => f.write_str(&render_tuple(symbols, false)),
        }
    }
}

/// Which side of the target the conditioning segment sits on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Context {
    Free,
    Left(ContextSet),
    Right(ContextSet),
}

impl Context {
    /// A rule conditions on one side only; asking for both is a programming error.
    pub fn from_parts(lc: Option<ContextSet>, rc: Option<ContextSet>) -> Result<Self> {
        match (lc, rc) {
            (Some(_), Some(_)) => Err(Error::ConflictingContexts),
            (Some(lc), None) => Ok(Context::Left(lc)),
            (None, Some(rc)) => Ok(Context::Right(rc)),
            (None, None) => Ok(Context::Free),
        }
    }

    pub fn set(&self) -> Option<&ContextSet> {
        match self {
            Context::Free => None,
            Context::Left(set) | Context::Right(set) => Some(set),
        }
    }
}

/// A strict tier-adjacency rule of one of the forms
///
/// ```text
/// A --> [αF] / C __ / tier
/// A --> [αF] / __ D / tier
/// ```
///
/// where the target takes its values for `F` from (or, when dissimilating,
/// opposite to) the adjacent context segment on the tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    target: BTreeSet<Segment>,
    feats: Vec<FeatureName>,
    context: Context,
    tier: Tier,
    direction: Direction,
    underspec: bool,
}

impl Rule {
    pub fn new(
        target: BTreeSet<Segment>,
        feats: Vec<FeatureName>,
        context: Context,
        tier: Tier,
        direction: Direction,
        underspec: bool,
    ) -> Self {
        Self {
            target,
            feats,
            context,
            tier,
            direction,
            underspec,
        }
    }

    pub fn target(&self) -> &BTreeSet<Segment> {
        &self.target
    }

    pub fn feats(&self) -> &[FeatureName] {
        &self.feats
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn tier(&self) -> &Tier {
        &self.tier
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Replaces the context set, keeping its side.
    pub fn update_context(&mut self, set: ContextSet) {
        self.context = match &self.context {
            Context::Free => Context::Free,
            Context::Left(_) => Context::Left(set),
            Context::Right(_) => Context::Right(set),
        };
    }

    fn in_target(&self, symbol: &Symbol) -> bool {
        symbol.as_segment().is_some_and(|seg| self.target.contains(seg))
    }

    /// A one-symbol window matches a target; a two-symbol window needs the
    /// context on the rule's side as well. Boundaries never count as context.
    pub fn matches(&self, window: &[Symbol], inventory: &SegmentInventory) -> bool {
        let in_context =
            |set: &ContextSet, s: &Symbol| s.as_segment().is_some() && set.contains(s, inventory);
        match (window, &self.context) {
            ([only], _) => self.in_target(only),
            ([c, t], Context::Left(lc)) => in_context(lc, c) && self.in_target(t),
            ([t, c], Context::Right(rc)) => self.in_target(t) && in_context(rc, c),
            _ => false,
        }
    }

    fn rewrite(&self, seg: &Symbol, context: &Symbol, inventory: &SegmentInventory) -> Option<Segment> {
        let (seg, context) = (seg.as_segment()?, context.as_segment()?);
        inventory.operate(self.direction, seg, context, &self.feats, self.underspec)
    }

    /// Scans the tier in reading order (left-to-right for a left context,
    /// right-to-left for a right context). Each successful rewrite is written
    /// back to the tier, so later positions see earlier outputs.
    pub fn get_changes(&self, seq: &Sequence, inventory: &SegmentInventory) -> Vec<Change> {
        let positions = self.tier.positions(seq, inventory);
        let mut tier_seq: Vec<Symbol> = positions.iter().map(|&i| seq[i].clone()).collect();
        let order: Vec<usize> = match self.context {
            Context::Right(_) => (0..positions.len()).rev().collect(),
            _ => (0..positions.len()).collect(),
        };

        let mut changes = Vec::new();
        for t in order {
            let seg = seq[positions[t]].clone();
            let window = match self.context {
                Context::Free => vec![seg.clone()],
                Context::Left(_) => {
                    let lc = t.checked_sub(1).map_or(Symbol::LeftBoundary, |p| tier_seq[p].clone());
                    vec![lc, seg.clone()]
                }
                Context::Right(_) => {
                    let rc = tier_seq.get(t + 1).cloned().unwrap_or(Symbol::RightBoundary);
                    vec![seg.clone(), rc]
                }
            };
            if !self.matches(&window, inventory) {
                continue;
            }
            let replacement = match self.context {
                Context::Free => seg.as_segment().cloned(),
                Context::Left(_) => self.rewrite(&seg, &window[0], inventory),
                Context::Right(_) => self.rewrite(&seg, &window[1], inventory),
            };
            match replacement {
                Some(new_seg) => {
                    changes.push((positions[t], Symbol::Segment(new_seg.clone())));
                    tier_seq[t] = Symbol::Segment(new_seg);
                }
                None => changes.push((positions[t], Symbol::Unknown)),
            }
        }
        changes
    }

    pub fn apply(&self, seq: &Sequence, inventory: &SegmentInventory) -> Sequence {
        let mut out = seq.clone();
        for (idx, change) in self.get_changes(seq, inventory) {
            out.set(idx, change);
        }
        out
    }

    /// `n` predicted changes over the underlying forms, `c` of them matching
    /// the surface form at that position.
    pub fn n_c(&self, pairs: &[(Sequence, Sequence)], inventory: &SegmentInventory) -> (usize, usize) {
        let mut n = 0;
        let mut c = 0;
        for (uf, sf) in pairs {
            for (idx, change) in self.get_changes(uf, inventory) {
                n += 1;
                if sf.get(idx) == Some(&change) {
                    c += 1;
                }
            }
        }
        (n, c)
    }

    pub fn accuracy(&self, pairs: &[(Sequence, Sequence)], inventory: &SegmentInventory) -> f64 {
        let (n, c) = self.n_c(pairs, inventory);
        if n > 0 {
            c as f64 / n as f64
        } else {
            0.0
        }
    }

    /// Every site the rule applies to across the pairs' underlying forms.
    pub fn applications(
        &self,
        pairs: &[(Sequence, Sequence)],
        inventory: &SegmentInventory,
    ) -> Vec<(Sequence, usize, Symbol)> {
        pairs
            .iter()
            .flat_map(|(uf, _)| {
                self.get_changes(uf, inventory)
                    .into_iter()
                    .map(move |(idx, change)| (uf.clone(), idx, change))
            })
            .collect()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = format!(
            "{} {} {}",
            render_set(&self.target),
            self.direction.arrow(),
            render_tuple(&self.feats, true)
        );
        match &self.context {
            Context::Left(lc) if !lc.is_empty() => write!(f, "{} / {} __ / {}", head, lc, self.tier),
            Context::Right(rc) if !rc.is_empty() => write!(f, "{} / __ {} / {}", head, rc, self.tier),
            _ => write!(f, "{} / __ / {}", head, self.tier),
        }
    }
}

// Rules are identified by their rendering.
impl PartialEq for Rule {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

impl Eq for Rule {}

impl std::hash::Hash for Rule {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_string().hash(state);
    }
}

/// Compares a rule to its canonical text form.
pub fn rule_equals_string(rule: &Rule, text: &str) -> bool {
    rule.to_string() == text
}
