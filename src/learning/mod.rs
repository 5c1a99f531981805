// File: src/learning/mod.rs
pub mod d2l;
pub mod plp;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Decides whether a generalization with `n` opportunities and `c` correct
/// applications is reliable enough to adopt.
pub type Threshold = fn(n: usize, c: usize) -> bool;

/// The Tolerance Principle: a generalization over `n` items survives
/// `e = n - c` exceptions as long as `e <= n / ln n`. Perfect generalizations
/// always pass; ones with two or fewer correct applications never do.
pub fn tolerance_principle(n: usize, c: usize) -> bool {
    if n == c {
        return true;
    }
    let e = n.saturating_sub(c) as f64;
    let n_f = n as f64;
    c > 2 && c as f64 > n_f / 2.0 && e <= n_f / n_f.ln()
}

/// Settings shared by every learner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Underlying forms may leave alternating features unspecified; rules may
    /// only fill those in, and an elsewhere default may cover the rest.
    pub underspec: bool,
    /// Seeds the tie-breaking choice in forced two-alternative trials.
    pub seed: u64,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            underspec: true,
            seed: 0,
        }
    }
}

impl LearnerConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// A mispredicted test item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionError {
    pub underlying: String,
    pub predicted: String,
    pub expected: String,
}

/// The contract every alternation learner exposes to an experiment harness.
pub trait Learner {
    fn train<S: AsRef<str>>(&mut self, pairs: &[(S, S)]) -> Result<&mut Self>
    where
        Self: Sized;

    /// The surface form predicted for an underlying form.
    fn produce(&mut self, uf: &str) -> Result<String>;

    /// A forced choice between two surface candidates.
    fn choose(&mut self, uf: &str, opt1: &str, opt2: &str) -> Result<String>;

    /// The share of pairs whose surface form is produced exactly.
    fn accuracy<S: AsRef<str>>(&mut self, pairs: &[(S, S)]) -> Result<f64>
    where
        Self: Sized,
    {
        Ok(self.accuracy_with_errors(pairs)?.0)
    }

    fn accuracy_with_errors<S: AsRef<str>>(
        &mut self,
        pairs: &[(S, S)],
    ) -> Result<(f64, Vec<PredictionError>)>
    where
        Self: Sized,
    {
        let mut errors = Vec::new();
        let mut correct = 0;
        for (uf, sf) in pairs {
            let predicted = self.produce(uf.as_ref())?;
            if predicted == sf.as_ref() {
                correct += 1;
            } else {
                errors.push(PredictionError {
                    underlying: uf.as_ref().to_string(),
                    predicted,
                    expected: sf.as_ref().to_string(),
                });
            }
        }
        let ratio = if pairs.is_empty() {
            0.0
        } else {
            correct as f64 / pairs.len() as f64
        };
        Ok((ratio, errors))
    }
}
