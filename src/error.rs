// File: src/error.rs
use thiserror::Error;

/// The common error type used by this crate
#[derive(Error, Debug)]
pub enum Error {
    /// Reading or writing a file failed
    #[error("I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// A feature table line could not be interpreted
    #[error("Malformed inventory table at line {line}: {reason}")]
    MalformedInventory { line: usize, reason: String },

    /// A feature name that is not part of the inventory's feature space
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// A symbol that was never registered with the inventory
    #[error("Symbol '{0}' is not registered")]
    UnknownSymbol(String),

    /// A feature value or constraint that is not `+`, `-` or `0`
    #[error("Invalid feature value: {0}")]
    InvalidFeatureValue(String),

    /// A segment whose feature vector does not match the feature space
    #[error("Segment '{symbol}' has {found} feature values, expected {expected}")]
    FeatureArity {
        symbol: String,
        expected: usize,
        found: usize,
    },

    /// A rule was given both a left and a right context
    #[error("Cannot have both left and right contexts")]
    ConflictingContexts,

    /// A training data line with an unsupported number of columns
    #[error("Malformed training pair at line {line}")]
    MalformedPair { line: usize },

    /// A model could not be encoded or decoded
    #[error("Serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    /// A configuration file could not be parsed
    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
