use crate::{
    db::predicate::{
        CompareOp, Expr,
        semantics::{IncomparableValues, Truth, compare, like_matches},
    },
    value::{Value, ValueTag},
};
use std::{borrow::Cow, collections::BTreeMap};
use thiserror::Error as ThisError;

///
/// FieldPresence
///
/// Result of looking up a column in the current row image.
/// A missing row, a never-written column and an explicitly cleared column
/// all evaluate as SQL NULL.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldPresence<'a> {
    Present(&'a Value),
    Missing,
}

///
/// RowState
///
/// Read-only view of a row at the apply site.
///

pub trait RowState {
    fn field(&self, column: &str) -> FieldPresence<'_>;
}

impl RowState for BTreeMap<String, Value> {
    fn field(&self, column: &str) -> FieldPresence<'_> {
        self.get(column)
            .map_or(FieldPresence::Missing, FieldPresence::Present)
    }
}

impl<R: RowState> RowState for Option<&R> {
    fn field(&self, column: &str) -> FieldPresence<'_> {
        match self {
            Some(row) => row.field(column),
            None => FieldPresence::Missing,
        }
    }
}

///
/// EvalError
///
/// Type failures discovered while evaluating. Compiled mutations are
/// validated against the schema beforehand, so these only surface for
/// predicates that were built or shipped without that check.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum EvalError {
    #[error(transparent)]
    Incomparable(#[from] IncomparableValues),

    #[error("expected a boolean operand, found {found}")]
    NonBoolean { found: ValueTag },

    #[error("LIKE requires text operands, found {found}")]
    NonTextLike { found: ValueTag },
}

/// Evaluate a predicate against a row image with three-valued logic.
pub fn eval<R: RowState + ?Sized>(row: &R, expr: &Expr) -> Result<Truth, EvalError> {
    match expr {
        Expr::Compare { op, left, right } => {
            let left = eval_value(row, left)?;
            let right = eval_value(row, right)?;
            Ok(compare(*op, &left, &right)?)
        }
        Expr::IsNull(inner) => Ok(Truth::from_bool(eval_value(row, inner)?.is_null())),
        Expr::IsNotNull(inner) => Ok(Truth::from_bool(!eval_value(row, inner)?.is_null())),
        Expr::Like { operand, pattern } => {
            let operand = eval_value(row, operand)?;
            let pattern = eval_value(row, pattern)?;
            match (operand.as_ref(), pattern.as_ref()) {
                (Value::Null, _) | (_, Value::Null) => Ok(Truth::Unknown),
                (Value::Text(text), Value::Text(pattern)) => {
                    Ok(Truth::from_bool(like_matches(text, pattern)))
                }
                (Value::Text(_), other) | (other, _) => {
                    Err(EvalError::NonTextLike { found: other.tag() })
                }
            }
        }
        Expr::Between {
            target,
            lower,
            upper,
        } => {
            let target = eval_value(row, target)?;
            let lower = eval_value(row, lower)?;
            let upper = eval_value(row, upper)?;
            let above = compare(CompareOp::Lte, &lower, &target)?;
            let below = compare(CompareOp::Lte, &target, &upper)?;
            Ok(above.and(below))
        }
        Expr::And(children) => {
            let mut acc = Truth::True;
            for child in children {
                acc = acc.and(eval(row, child)?);
                if acc == Truth::False {
                    break;
                }
            }
            Ok(acc)
        }
        Expr::Or(children) => {
            let mut acc = Truth::False;
            for child in children {
                acc = acc.or(eval(row, child)?);
                if acc == Truth::True {
                    break;
                }
            }
            Ok(acc)
        }
        Expr::Not(inner) => Ok(eval(row, inner)?.negate()),
        Expr::Literal(_) | Expr::Column(_) => truth_of(eval_value(row, expr)?.as_ref()),
    }
}

// Scalar position: leaves resolve directly, predicates project into Bool/Null.
fn eval_value<'a, R: RowState + ?Sized>(
    row: &'a R,
    expr: &'a Expr,
) -> Result<Cow<'a, Value>, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(Cow::Borrowed(value)),
        Expr::Column(name) => Ok(match row.field(name) {
            FieldPresence::Present(value) => Cow::Borrowed(value),
            FieldPresence::Missing => Cow::Owned(Value::Null),
        }),
        _ => Ok(Cow::Owned(eval(row, expr)?.to_value())),
    }
}

fn truth_of(value: &Value) -> Result<Truth, EvalError> {
    match value {
        Value::Bool(b) => Ok(Truth::from_bool(*b)),
        Value::Null => Ok(Truth::Unknown),
        other => Err(EvalError::NonBoolean { found: other.tag() }),
    }
}
