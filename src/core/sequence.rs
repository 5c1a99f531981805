// src/core/sequence.rs
use crate::core::inventory::SegmentInventory;
use crate::core::segment::{Segment, Symbol};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Index;

/// One word as an ordered list of symbols. Word boundaries are never stored;
/// they are implied one past either end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Sequence {
    symbols: Vec<Symbol>,
}

impl Sequence {
    pub fn new(symbols: Vec<Symbol>) -> Self {
        Self { symbols }
    }

    pub fn from_segments(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self::new(segments.into_iter().map(Symbol::Segment).collect())
    }

    /// Converts text to a sequence. Every symbol must already be registered
    /// with the inventory; the unknown marker `?` is accepted as such.
    pub fn parse(text: &str, inventory: &SegmentInventory) -> Result<Self> {
        inventory
            .tokenize(text)
            .into_iter()
            .map(|token| match inventory.segment(&token) {
                Some(seg) => Ok(Symbol::Segment(seg.clone())),
                None if token == Symbol::Unknown.as_str() => Ok(Symbol::Unknown),
                None => Err(Error::UnknownSymbol(token)),
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&Symbol> {
        self.symbols.get(idx)
    }

    pub fn set(&mut self, idx: usize, symbol: Symbol) {
        if let Some(slot) = self.symbols.get_mut(idx) {
            *slot = symbol;
        }
    }

    pub fn push(&mut self, symbol: Symbol) {
        self.symbols.push(symbol);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn concat(&self, other: &Sequence) -> Sequence {
        let mut symbols = self.symbols.clone();
        symbols.extend(other.symbols.iter().cloned());
        Self::new(symbols)
    }
}

impl Index<usize> for Sequence {
    type Output = Symbol;

    fn index(&self, idx: usize) -> &Symbol {
        &self.symbols[idx]
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = &'a Symbol;
    type IntoIter = std::slice::Iter<'a, Symbol>;

    fn into_iter(self) -> Self::IntoIter {
        self.symbols.iter()
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for symbol in &self.symbols {
            f.write_str(symbol.as_str())?;
        }
        Ok(())
    }
}

/// Compares a sequence to raw text by its rendered symbols.
pub fn sequence_equals_string(seq: &Sequence, text: &str) -> bool {
    seq.to_string() == text
}

#[cfg(test)]
mod tests {
    use super::*;

    const FINLEY: &str = include_str!("../../tests/fixtures/finley.tsv");

    #[test]
    fn parses_and_renders() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let seq = Sequence::parse("ʃokuSiS", &inventory).unwrap();
        assert_eq!(seq.len(), 7);
        assert_eq!(seq[4].as_str(), "S");
        assert!(sequence_equals_string(&seq, "ʃokuSiS"));
        assert!(!sequence_equals_string(&seq, "ʃokuʃiʃ"));
    }

    #[test]
    fn unregistered_symbols_are_rejected() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        assert!(Sequence::parse("xyz", &inventory).is_err());
        let marked = Sequence::parse("s?", &inventory).unwrap();
        assert_eq!(marked[1], Symbol::Unknown);
    }

    #[test]
    fn set_and_concat() {
        let inventory: SegmentInventory = FINLEY.parse().unwrap();
        let mut seq = Sequence::parse("utS", &inventory).unwrap();
        seq.set(2, Symbol::Segment(inventory.segment("s").unwrap().clone()));
        seq.set(10, Symbol::Unknown);
        let tail = Sequence::parse("a", &inventory).unwrap();
        assert_eq!(seq.concat(&tail).to_string(), "utsa");
    }
}
