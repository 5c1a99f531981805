// File: src/data.rs
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One row of a tab-separated training or test file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub underlying: String,
    pub surface: String,
    pub frequency: f64,
}

/// Parses `uf<TAB>sf`, `uf<TAB>sf<TAB>freq` or `_<TAB>uf<TAB>sf<TAB>freq`
/// rows. Blank lines are skipped.
pub fn parse_pairs(text: &str, skip_header: bool) -> Result<Vec<TrainingPair>> {
    let mut pairs = Vec::new();
    for (idx, line) in text.lines().enumerate().skip(usize::from(skip_header)) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let malformed = || Error::MalformedPair { line: idx + 1 };
        let fields: Vec<&str> = line.split('\t').map(str::trim).collect();
        let (uf, sf, freq) = match fields.as_slice() {
            [uf, sf] => (*uf, *sf, None),
            [uf, sf, freq] => (*uf, *sf, Some(*freq)),
            [_, uf, sf, freq] => (*uf, *sf, Some(*freq)),
            _ => return Err(malformed()),
        };
        let frequency = match freq {
            Some(freq) => freq.parse::<f64>().map_err(|_| malformed())?,
            None => 0.0,
        };
        pairs.push(TrainingPair {
            underlying: uf.to_string(),
            surface: sf.to_string(),
            frequency,
        });
    }
    Ok(pairs)
}

pub fn load_pairs(path: &Path, skip_header: bool) -> Result<Vec<TrainingPair>> {
    let text = fs::read_to_string(path)?;
    parse_pairs(&text, skip_header)
}

/// The (uf, sf) view the learners train on.
pub fn as_string_pairs(pairs: &[TrainingPair]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|p| (p.underlying.clone(), p.surface.clone()))
        .collect()
}
