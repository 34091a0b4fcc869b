//! Join graph keys of the cardinality estimation cache.
//!
//! A join graph names the relations of an optimizer subproblem and the
//! predicates connecting them. Two graphs that only differ in operand order,
//! vertex order, or predicate order describe the same subproblem;
//! [`JoinGraph::normalized`] rewrites them into one canonical form.
#![forbid(unsafe_code)]

use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use xxhash_rust::xxh64::Xxh64;

use crate::types::PredicateCondition;

/// Column of a relation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ColumnRef {
    /// Relation (table or alias) name.
    pub relation: String,
    /// Column name.
    pub column: String,
}

impl ColumnRef {
    /// Creates a column reference.
    pub fn new(relation: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            relation: relation.into(),
            column: column.into(),
        }
    }

    /// Stable hash used to order operands.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        self.hash_content(&mut hasher);
        hasher.finish()
    }

    fn hash_content(&self, hasher: &mut Xxh64) {
        write_str(hasher, &self.relation);
        write_str(hasher, &self.column);
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.relation, self.column)
    }
}

/// Constant operand of a predicate.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarValue {
    /// SQL `NULL`.
    Null,
    /// Boolean constant.
    Bool(bool),
    /// Integer constant.
    Int(i64),
    /// Floating point constant, compared bitwise.
    Float(f64),
    /// Text constant.
    Text(String),
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ScalarValue::Null, ScalarValue::Null) => true,
            (ScalarValue::Bool(a), ScalarValue::Bool(b)) => a == b,
            (ScalarValue::Int(a), ScalarValue::Int(b)) => a == b,
            (ScalarValue::Float(a), ScalarValue::Float(b)) => a.to_bits() == b.to_bits(),
            (ScalarValue::Text(a), ScalarValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ScalarValue::Null => {}
            ScalarValue::Bool(value) => value.hash(state),
            ScalarValue::Int(value) => value.hash(state),
            ScalarValue::Float(value) => value.to_bits().hash(state),
            ScalarValue::Text(value) => value.hash(state),
        }
    }
}

impl ScalarValue {
    fn hash_content(&self, hasher: &mut Xxh64) {
        match self {
            ScalarValue::Null => hasher.write_u8(0),
            ScalarValue::Bool(value) => {
                hasher.write_u8(1);
                hasher.write_u8(u8::from(*value));
            }
            ScalarValue::Int(value) => {
                hasher.write_u8(2);
                hasher.write(&value.to_le_bytes());
            }
            ScalarValue::Float(value) => {
                hasher.write_u8(3);
                hasher.write(&value.to_bits().to_le_bytes());
            }
            ScalarValue::Text(value) => {
                hasher.write_u8(4);
                write_str(hasher, value);
            }
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Null => f.write_str("NULL"),
            ScalarValue::Bool(value) => write!(f, "{value}"),
            ScalarValue::Int(value) => write!(f, "{value}"),
            ScalarValue::Float(value) => write!(f, "{value}"),
            ScalarValue::Text(value) => write!(f, "'{value}'"),
        }
    }
}

/// Right-hand side of an atomic predicate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// Another column.
    Column(ColumnRef),
    /// A constant.
    Value(ScalarValue),
}

impl Operand {
    fn hash_content(&self, hasher: &mut Xxh64) {
        match self {
            Operand::Column(column) => {
                hasher.write_u8(0);
                column.hash_content(hasher);
            }
            Operand::Value(value) => {
                hasher.write_u8(1);
                value.hash_content(hasher);
            }
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Column(column) => column.fmt(f),
            Operand::Value(value) => value.fmt(f),
        }
    }
}

/// Connective of a compound predicate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalOperator {
    /// Both operands hold.
    And,
    /// At least one operand holds.
    Or,
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOperator::And => f.write_str("AND"),
            LogicalOperator::Or => f.write_str("OR"),
        }
    }
}

/// Predicate attached to a join graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPredicate {
    /// `left <condition> right`, with `upper` as the second bound of `BETWEEN`.
    Atomic {
        /// Column on the left of the comparison.
        left: ColumnRef,
        /// Comparison.
        condition: PredicateCondition,
        /// Right operand.
        right: Operand,
        /// Upper bound for `BETWEEN`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        upper: Option<Operand>,
    },
    /// `left <operator> right`.
    Logical {
        /// Connective.
        operator: LogicalOperator,
        /// First operand.
        left: Box<JoinPredicate>,
        /// Second operand.
        right: Box<JoinPredicate>,
    },
}

impl JoinPredicate {
    /// Binary comparison between a column and another operand.
    pub fn atomic(left: ColumnRef, condition: PredicateCondition, right: Operand) -> Self {
        JoinPredicate::Atomic {
            left,
            condition,
            right,
            upper: None,
        }
    }

    /// Equality between two columns.
    pub fn equi(left: ColumnRef, right: ColumnRef) -> Self {
        Self::atomic(left, PredicateCondition::Equals, Operand::Column(right))
    }

    /// `left BETWEEN lower AND upper`.
    pub fn between(left: ColumnRef, lower: Operand, upper: Operand) -> Self {
        JoinPredicate::Atomic {
            left,
            condition: PredicateCondition::Between,
            right: lower,
            upper: Some(upper),
        }
    }

    /// Compound of two predicates.
    pub fn logical(operator: LogicalOperator, left: JoinPredicate, right: JoinPredicate) -> Self {
        JoinPredicate::Logical {
            operator,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Human readable form.
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Stable hash over the predicate's content.
    ///
    /// Unlike [`Hash`], the value does not depend on the process or the
    /// standard library version.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = Xxh64::new(0);
        self.hash_content(&mut hasher);
        hasher.finish()
    }

    fn hash_content(&self, hasher: &mut Xxh64) {
        match self {
            JoinPredicate::Atomic {
                left,
                condition,
                right,
                upper,
            } => {
                hasher.write_u8(0);
                left.hash_content(hasher);
                write_str(hasher, condition.symbol());
                right.hash_content(hasher);
                match upper {
                    Some(upper) => {
                        hasher.write_u8(1);
                        upper.hash_content(hasher);
                    }
                    None => hasher.write_u8(0),
                }
            }
            JoinPredicate::Logical {
                operator,
                left,
                right,
            } => {
                hasher.write_u8(1);
                hasher.write_u8(match operator {
                    LogicalOperator::And => 0,
                    LogicalOperator::Or => 1,
                });
                left.hash_content(hasher);
                right.hash_content(hasher);
            }
        }
    }

    /// Canonical form of the predicate.
    ///
    /// Column-to-column comparisons put the column with the smaller content
    /// hash on the left and mirror the condition. Conditions without a mirror
    /// (`BETWEEN`, `LIKE`, `NOT LIKE`) keep their operand order. Compound
    /// predicates normalize both sides and order them by content hash.
    pub fn normalized(&self) -> JoinPredicate {
        match self {
            JoinPredicate::Atomic {
                left,
                condition,
                right: Operand::Column(right),
                upper: None,
            } if right.content_hash() < left.content_hash() => match condition.flip() {
                Some(flipped) => JoinPredicate::atomic(
                    right.clone(),
                    flipped,
                    Operand::Column(left.clone()),
                ),
                None => self.clone(),
            },
            JoinPredicate::Atomic { .. } => self.clone(),
            JoinPredicate::Logical {
                operator,
                left,
                right,
            } => {
                let mut left = left.normalized();
                let mut right = right.normalized();
                if right.content_hash() < left.content_hash() {
                    std::mem::swap(&mut left, &mut right);
                }
                JoinPredicate::logical(*operator, left, right)
            }
        }
    }
}

impl fmt::Display for JoinPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinPredicate::Atomic {
                left,
                condition: PredicateCondition::Between,
                right,
                upper: Some(upper),
            } => write!(f, "{left} BETWEEN {right} AND {upper}"),
            JoinPredicate::Atomic {
                left,
                condition,
                right,
                ..
            } => write!(f, "{left} {condition} {right}"),
            JoinPredicate::Logical {
                operator,
                left,
                right,
            } => write!(f, "({left}) {operator} ({right})"),
        }
    }
}

/// Relations and predicates of one optimizer subproblem.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinGraph {
    /// Relation names.
    pub vertices: Vec<String>,
    /// Predicates between (or on) the relations.
    pub predicates: Vec<JoinPredicate>,
}

impl JoinGraph {
    /// Creates a join graph.
    pub fn new(vertices: Vec<String>, predicates: Vec<JoinPredicate>) -> Self {
        Self {
            vertices,
            predicates,
        }
    }

    /// Human readable form, e.g. `[A, B] A.x = B.y`.
    pub fn description(&self) -> String {
        let predicates: Vec<String> = self.predicates.iter().map(|p| p.description()).collect();
        format!("[{}] {}", self.vertices.join(", "), predicates.join(" AND "))
            .trim_end()
            .to_string()
    }

    /// Canonical form used as the cache key.
    ///
    /// Vertices are sorted and deduplicated, every predicate is normalized,
    /// and the predicate list is ordered by content hash.
    pub fn normalized(&self) -> JoinGraph {
        let mut vertices = self.vertices.clone();
        vertices.sort();
        vertices.dedup();
        let mut predicates: Vec<JoinPredicate> =
            self.predicates.iter().map(JoinPredicate::normalized).collect();
        predicates.sort_by_cached_key(JoinPredicate::content_hash);
        JoinGraph {
            vertices,
            predicates,
        }
    }
}

fn write_str(hasher: &mut Xxh64, value: &str) {
    hasher.write_u64(value.len() as u64);
    hasher.write(value.as_bytes());
}
