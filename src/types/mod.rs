//! Shared vocabulary: the crate error type and predicate conditions.
#![forbid(unsafe_code)]

mod error;
mod predicate;

pub use error::{Result, StatsError};
pub use predicate::PredicateCondition;
