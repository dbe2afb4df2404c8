//! Module: predicate::semantics
//! Responsibility: three-valued truth, comparison, and LIKE matching.
//! Does not own: tree walking or column resolution (see `eval`).

use crate::{
    db::predicate::CompareOp,
    value::{Value, ValueTag, strict_order_cmp},
};
use std::cmp::Ordering;
use thiserror::Error as ThisError;

///
/// Truth
///
/// SQL three-valued logic. `Unknown` is what a comparison against NULL yields.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    /// `False` dominates, then `Unknown`.
    #[must_use]
    pub const fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::False, _) | (_, Self::False) => Self::False,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::True, Self::True) => Self::True,
        }
    }

    /// `True` dominates, then `Unknown`.
    #[must_use]
    pub const fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::True, _) | (_, Self::True) => Self::True,
            (Self::Unknown, _) | (_, Self::Unknown) => Self::Unknown,
            (Self::False, Self::False) => Self::False,
        }
    }

    #[must_use]
    pub const fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Unknown => Self::Unknown,
        }
    }

    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value { Self::True } else { Self::False }
    }

    /// Only `True` lets a conditional write through.
    #[must_use]
    pub const fn is_true(self) -> bool {
        matches!(self, Self::True)
    }

    /// Boolean projection back into the value domain; `Unknown` is `Null`.
    #[must_use]
    pub const fn to_value(self) -> Value {
        match self {
            Self::True => Value::Bool(true),
            Self::False => Value::Bool(false),
            Self::Unknown => Value::Null,
        }
    }
}

///
/// IncomparableValues
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, ThisError)]
#[error("cannot compare {left} {op} {right}")]
pub struct IncomparableValues {
    pub op: CompareOp,
    pub left: ValueTag,
    pub right: ValueTag,
}

/// Apply a comparison operator with NULL propagation.
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<Truth, IncomparableValues> {
    if left.is_null() || right.is_null() {
        return Ok(Truth::Unknown);
    }

    let ordering = strict_order_cmp(left, right).ok_or(IncomparableValues {
        op,
        left: left.tag(),
        right: right.tag(),
    })?;

    let holds = match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
    };

    Ok(Truth::from_bool(holds))
}

/// Case-sensitive SQL `LIKE`.
///
/// `%` matches any run of characters (including none), `_` matches exactly
/// one character. There is no escape character. Matching is per `char`.
#[must_use]
pub fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0, 0);
    // (pattern index of the last '%', text index it is currently absorbing up to)
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                backtrack = Some((p, t));
                p += 1;
            }
            Some(&c) if c == '_' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star, absorbed)) => {
                    backtrack = Some((star, absorbed + 1));
                    p = star + 1;
                    t = absorbed + 1;
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}
