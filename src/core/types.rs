// src/core/types.rs
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Marks the position before the first segment of a word.
pub const LEFT_WORD_BOUNDARY: &str = "⋊";
/// Marks the position after the last segment of a word.
pub const RIGHT_WORD_BOUNDARY: &str = "⋉";
/// Stands in for a segment that a feature operation could not resolve.
pub const UNKNOWN_CHAR: &str = "?";

/// The name of a phonological feature, e.g. `ant` or `voice`.
pub type FeatureName = String;

/// The value a segment carries for one feature.
/// `Unspecified` is used for archiphonemes (e.g. `S`) that leave a feature open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureValue {
    Plus,
    Minus,
    Unspecified,
}

impl FeatureValue {
    /// The polar opposite of a specified value. Unspecified values have none.
    pub fn opposite(self) -> Option<FeatureValue> {
        match self {
            FeatureValue::Plus => Some(FeatureValue::Minus),
            FeatureValue::Minus => Some(FeatureValue::Plus),
            FeatureValue::Unspecified => None,
        }
    }

    pub fn is_specified(self) -> bool {
        self != FeatureValue::Unspecified
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeatureValue::Plus => "+",
            FeatureValue::Minus => "-",
            FeatureValue::Unspecified => "0",
        }
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeatureValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "+" => Ok(FeatureValue::Plus),
            "-" => Ok(FeatureValue::Minus),
            "0" => Ok(FeatureValue::Unspecified),
            other => Err(Error::InvalidFeatureValue(other.to_string())),
        }
    }
}

/// A single feature requirement such as `+strid`.
/// Orders the same way the rendered strings do (`+` < `-` < `0`, then by name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureConstraint {
    pub value: FeatureValue,
    pub feature: FeatureName,
}

impl FeatureConstraint {
    pub fn new(value: FeatureValue, feature: impl Into<FeatureName>) -> Self {
        Self {
            value,
            feature: feature.into(),
        }
    }
}

impl fmt::Display for FeatureConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.feature)
    }
}

impl FromStr for FeatureConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        let sign = chars
            .next()
            .ok_or_else(|| Error::InvalidFeatureValue(s.to_string()))?;
        let feature = chars.as_str();
        if feature.is_empty() {
            return Err(Error::InvalidFeatureValue(s.to_string()));
        }
        let value = sign
            .to_string()
            .parse::<FeatureValue>()
            .map_err(|_| Error::InvalidFeatureValue(s.to_string()))?;
        Ok(Self::new(value, feature))
    }
}

/// Whether a rule copies the context's values or their opposites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Assimilate,
    Dissimilate,
}

impl Direction {
    pub fn arrow(self) -> &'static str {
        match self {
            Direction::Assimilate => "-->",
            Direction::Dissimilate => "<--",
        }
    }
}

/// Renders items as a parenthesized tuple: `('ant',)`, `('back', 'round')`, `(s, ʃ)`.
pub(crate) fn render_tuple<I, T>(items: I, quoted: bool) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let rendered: Vec<String> = items
        .into_iter()
        .map(|item| {
            if quoted {
                format!("'{}'", item)
            } else {
                item.to_string()
            }
        })
        .collect();
    match rendered.len() {
        1 => format!("({},)", rendered[0]),
        _ => format!("({})", rendered.join(", ")),
    }
}

/// Renders items as a braced set: `{S}`, `{a, b}`.
pub(crate) fn render_set<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: fmt::Display,
{
    let rendered: Vec<String> = items.into_iter().map(|item| item.to_string()).collect();
    format!("{{{}}}", rendered.join(", "))
}
