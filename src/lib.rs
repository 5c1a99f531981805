// src/lib.rs

pub mod core;
pub mod data;
pub mod error;
pub mod learning;
pub mod persistence;

pub use crate::error::{Error, Result};
pub use crate::learning::d2l::D2L;
pub use crate::learning::plp::PlpGrammar;
pub use crate::learning::{Learner, LearnerConfig};
