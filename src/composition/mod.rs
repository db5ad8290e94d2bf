//! Rule-driven pattern composition.
//!
//! Matches declarative rules against stored atomic patterns to produce
//! higher-confidence composite patterns, consuming the atomics it uses.

mod engine;
mod rule;
mod rules;

pub use engine::CompositionEngine;
pub use rule::{CompositeRule, PatternRequirement};
pub use rules::default_rules;
