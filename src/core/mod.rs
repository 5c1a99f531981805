// src/core/mod.rs
pub mod default_rule;
pub mod discrepancy;
pub mod inventory;
pub mod natural_class;
pub mod rule;
pub mod segment;
pub mod sequence;
pub mod tier;
pub mod types;
