use crate::db::predicate::{CompareOp, Expr};
use thiserror::Error as ThisError;

///
/// RowKeyInPredicateError
///
/// The row identifier is not readable as a column at the apply site, so a
/// predicate that mentions a primary-key column can never be evaluated.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("row key reference not permitted in conditional predicate")]
pub struct RowKeyInPredicateError {
    pub column: String,
}

///
/// Rewrite a predicate into the primitive form the evaluator understands.
///
/// - `Between(target, lower, upper)` becomes
///   `And(LessThanOrEqual(lower, target), LessThanOrEqual(target, upper))`
/// - every other node keeps its shape; children are normalized first
/// - any column reference naming a primary-key column is rejected
///
/// The pass is pure: the input tree is left untouched.
///
pub fn normalize(expr: &Expr, key_columns: &[String]) -> Result<Expr, RowKeyInPredicateError> {
    let normalized = match expr {
        Expr::Literal(value) => Expr::Literal(value.clone()),
        Expr::Column(name) => {
            if key_columns.iter().any(|key| key == name) {
                return Err(RowKeyInPredicateError {
                    column: name.clone(),
                });
            }
            Expr::Column(name.clone())
        }
        Expr::Compare { op, left, right } => Expr::Compare {
            op: *op,
            left: Box::new(normalize(left, key_columns)?),
            right: Box::new(normalize(right, key_columns)?),
        },
        Expr::IsNull(inner) => Expr::IsNull(Box::new(normalize(inner, key_columns)?)),
        Expr::IsNotNull(inner) => Expr::IsNotNull(Box::new(normalize(inner, key_columns)?)),
        Expr::Like { operand, pattern } => Expr::Like {
            operand: Box::new(normalize(operand, key_columns)?),
            pattern: Box::new(normalize(pattern, key_columns)?),
        },
        Expr::Between {
            target,
            lower,
            upper,
        } => {
            let target = normalize(target, key_columns)?;
            let lower = normalize(lower, key_columns)?;
            let upper = normalize(upper, key_columns)?;

            Expr::And(vec![
                Expr::compare(CompareOp::Lte, lower, target.clone()),
                Expr::compare(CompareOp::Lte, target, upper),
            ])
        }
        Expr::And(children) => Expr::And(normalize_all(children, key_columns)?),
        Expr::Or(children) => Expr::Or(normalize_all(children, key_columns)?),
        Expr::Not(inner) => Expr::Not(Box::new(normalize(inner, key_columns)?)),
    };

    Ok(normalized)
}

fn normalize_all(
    children: &[Expr],
    key_columns: &[String],
) -> Result<Vec<Expr>, RowKeyInPredicateError> {
    children
        .iter()
        .map(|child| normalize(child, key_columns))
        .collect()
}
