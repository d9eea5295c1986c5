//! Boolean predicates over policy attributes.
//!
//! Every evaluation carries the point in time until which its result holds,
//! derived from the validity of the attributes that decided it.

use palisade_core::{AttributeId, AttributeSet, PalisadeError, Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Comparison applied as `attribute <op> reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericOperator {
    /// attribute < reference
    LessThan,
    /// attribute > reference
    GreaterThan,
    /// attribute == reference
    Equal,
}

impl NumericOperator {
    /// Apply the comparison.
    pub fn test(self, value: i64, reference: i64) -> bool {
        match self {
            NumericOperator::LessThan => value < reference,
            NumericOperator::GreaterThan => value > reference,
            NumericOperator::Equal => value == reference,
        }
    }
}

impl fmt::Display for NumericOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NumericOperator::LessThan => "<",
            NumericOperator::GreaterThan => ">",
            NumericOperator::Equal => "=",
        })
    }
}

/// Result of a predicate evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    /// Whether the attributes satisfy the predicate
    pub positive: bool,
    /// End of validity of the result
    pub valid_until: Timestamp,
}

impl Evaluation {
    /// Create an evaluation result.
    pub fn new(positive: bool, valid_until: Timestamp) -> Self {
        Self {
            positive,
            valid_until,
        }
    }
}

/// Predicate tree over policy attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyPredicate {
    /// Compares one numeric attribute with a reference value
    Numeric {
        /// Attribute queried
        identifier: AttributeId,
        /// Comparison
        operator: NumericOperator,
        /// Right-hand side of the comparison
        reference: i64,
    },
    /// Both children hold
    And {
        /// First child
        left: Box<PolicyPredicate>,
        /// Second child
        right: Box<PolicyPredicate>,
    },
    /// At least one child holds
    Or {
        /// First child
        left: Box<PolicyPredicate>,
        /// Second child
        right: Box<PolicyPredicate>,
    },
    /// Exactly one child holds
    Xor {
        /// First child
        left: Box<PolicyPredicate>,
        /// Second child
        right: Box<PolicyPredicate>,
    },
}

impl PolicyPredicate {
    /// Leaf comparing `identifier` with `reference`.
    pub fn numeric(
        identifier: impl Into<AttributeId>,
        operator: NumericOperator,
        reference: i64,
    ) -> Self {
        PolicyPredicate::Numeric {
            identifier: identifier.into(),
            operator,
            reference,
        }
    }

    /// Conjunction of two predicates.
    pub fn and(left: PolicyPredicate, right: PolicyPredicate) -> Self {
        PolicyPredicate::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Disjunction of two predicates.
    pub fn or(left: PolicyPredicate, right: PolicyPredicate) -> Self {
        PolicyPredicate::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Exclusive disjunction of two predicates.
    pub fn xor(left: PolicyPredicate, right: PolicyPredicate) -> Self {
        PolicyPredicate::Xor {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate against `attributes`.
    ///
    /// Fails with [`PalisadeError::AttributeUnavailable`] when a referenced
    /// attribute is missing and with [`PalisadeError::IncompatibleAttribute`]
    /// when a numeric comparison meets a text value.
    pub fn evaluate(&self, attributes: &AttributeSet) -> Result<Evaluation> {
        match self {
            PolicyPredicate::Numeric {
                identifier,
                operator,
                reference,
            } => {
                let attribute = attributes
                    .get(identifier)
                    .ok_or_else(|| PalisadeError::attribute_unavailable(identifier.clone()))?;
                let value = attribute.value().as_long().ok_or_else(|| {
                    PalisadeError::incompatible_attribute(format!(
                        "'{identifier}' is not numeric"
                    ))
                })?;
                Ok(Evaluation::new(
                    operator.test(value, *reference),
                    attribute.valid_until(),
                ))
            }
            PolicyPredicate::And { left, right } => {
                let (l, r) = (left.evaluate(attributes)?, right.evaluate(attributes)?);
                Ok(Evaluation::new(
                    l.positive && r.positive,
                    l.valid_until.min(r.valid_until),
                ))
            }
            PolicyPredicate::Or { left, right } => {
                let (l, r) = (left.evaluate(attributes)?, right.evaluate(attributes)?);
                let valid_until = match (l.positive, r.positive) {
                    (true, true) => l.valid_until.max(r.valid_until),
                    (true, false) => l.valid_until,
                    (false, true) => r.valid_until,
                    (false, false) => l.valid_until.min(r.valid_until),
                };
                Ok(Evaluation::new(l.positive || r.positive, valid_until))
            }
            PolicyPredicate::Xor { left, right } => {
                let (l, r) = (left.evaluate(attributes)?, right.evaluate(attributes)?);
                let valid_until = match (l.positive, r.positive) {
                    (true, false) => l.valid_until,
                    (false, true) => r.valid_until,
                    _ => l.valid_until.min(r.valid_until),
                };
                Ok(Evaluation::new(l.positive != r.positive, valid_until))
            }
        }
    }

    /// Identifiers of every attribute the predicate reads.
    pub fn required_attribute_identifiers(&self) -> BTreeSet<AttributeId> {
        let mut identifiers = BTreeSet::new();
        self.collect_identifiers(&mut identifiers);
        identifiers
    }

    fn collect_identifiers(&self, out: &mut BTreeSet<AttributeId>) {
        match self {
            PolicyPredicate::Numeric { identifier, .. } => {
                out.insert(identifier.clone());
            }
            PolicyPredicate::And { left, right }
            | PolicyPredicate::Or { left, right }
            | PolicyPredicate::Xor { left, right } => {
                left.collect_identifiers(out);
                right.collect_identifiers(out);
            }
        }
    }
}

impl fmt::Display for PolicyPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyPredicate::Numeric {
                identifier,
                operator,
                reference,
            } => write!(f, "{identifier} {operator} {reference}"),
            PolicyPredicate::And { left, right } => write!(f, "({left} AND {right})"),
            PolicyPredicate::Or { left, right } => write!(f, "({left} OR {right})"),
            PolicyPredicate::Xor { left, right } => write!(f, "({left} XOR {right})"),
        }
    }
}
