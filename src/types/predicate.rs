#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

/// Comparison kinds understood by histograms and join-graph predicates.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PredicateCondition {
    /// `column = value`
    Equals,
    /// `column != value`
    NotEquals,
    /// `column < value`
    LessThan,
    /// `column <= value`
    LessThanEquals,
    /// `column > value`
    GreaterThan,
    /// `column >= value`
    GreaterThanEquals,
    /// `column BETWEEN value AND value2`, both bounds inclusive.
    Between,
    /// `column LIKE pattern`
    Like,
    /// `column NOT LIKE pattern`
    NotLike,
}

impl PredicateCondition {
    /// All conditions, in declaration order.
    pub const ALL: [PredicateCondition; 9] = [
        PredicateCondition::Equals,
        PredicateCondition::NotEquals,
        PredicateCondition::LessThan,
        PredicateCondition::LessThanEquals,
        PredicateCondition::GreaterThan,
        PredicateCondition::GreaterThanEquals,
        PredicateCondition::Between,
        PredicateCondition::Like,
        PredicateCondition::NotLike,
    ];

    /// Condition that holds after swapping the two operands, if there is one.
    ///
    /// `a < b` becomes `b > a`. Between and the pattern predicates are not
    /// symmetric in their operands and have no mirror.
    pub fn flip(self) -> Option<Self> {
        match self {
            PredicateCondition::Equals => Some(PredicateCondition::Equals),
            PredicateCondition::NotEquals => Some(PredicateCondition::NotEquals),
            PredicateCondition::LessThan => Some(PredicateCondition::GreaterThan),
            PredicateCondition::LessThanEquals => Some(PredicateCondition::GreaterThanEquals),
            PredicateCondition::GreaterThan => Some(PredicateCondition::LessThan),
            PredicateCondition::GreaterThanEquals => Some(PredicateCondition::LessThanEquals),
            PredicateCondition::Between | PredicateCondition::Like | PredicateCondition::NotLike => {
                None
            }
        }
    }

    /// Whether the condition takes a second value.
    pub fn is_ternary(self) -> bool {
        matches!(self, PredicateCondition::Between)
    }

    /// Whether the condition compares against a single value.
    pub fn is_binary(self) -> bool {
        !self.is_ternary()
    }

    /// Whether the condition is a pattern match.
    pub fn is_pattern(self) -> bool {
        matches!(self, PredicateCondition::Like | PredicateCondition::NotLike)
    }

    /// SQL spelling of the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            PredicateCondition::Equals => "=",
            PredicateCondition::NotEquals => "!=",
            PredicateCondition::LessThan => "<",
            PredicateCondition::LessThanEquals => "<=",
            PredicateCondition::GreaterThan => ">",
            PredicateCondition::GreaterThanEquals => ">=",
            PredicateCondition::Between => "BETWEEN",
            PredicateCondition::Like => "LIKE",
            PredicateCondition::NotLike => "NOT LIKE",
        }
    }
}

impl fmt::Display for PredicateCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
