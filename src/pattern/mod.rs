//! Behavioral risk pattern model and storage.
//!
//! Patterns are the unit of signal in the engine:
//! - An atomic pattern is one detected risk signal from a single evaluator check
//! - A composite pattern combines multiple atomics per a declarative rule
//!
//! The store holds both per user, enforcing uniqueness keys and TTL eviction.

mod store;
mod types;

pub use store::PatternStore;
pub use types::{
    AtomicPattern, CompositePattern, PatternKey, PatternScope, RiskCategory, RiskLevel,
};
