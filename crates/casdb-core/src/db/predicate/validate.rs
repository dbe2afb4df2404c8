use crate::{
    db::{
        predicate::{CompareOp, Expr},
        schema::{ColumnKind, TableSchema},
    },
    value::{Value, ValueTag},
};
use thiserror::Error as ThisError;

///
/// ValidateError
///
/// Schema-level rejection of a normalized predicate.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidateError {
    #[error("unknown column '{column}' in predicate")]
    UnknownColumn { column: String },

    #[error("literal {found} cannot be compared with column '{column}' of type {expected}")]
    LiteralTypeMismatch {
        column: String,
        expected: ColumnKind,
        found: ValueTag,
    },

    #[error("operands of type {left} and {right} cannot be compared with {op}")]
    IncomparableOperands {
        op: CompareOp,
        left: ColumnKind,
        right: ColumnKind,
    },

    #[error("unsupported operator {operator}: {reason}")]
    UnsupportedOperator {
        operator: &'static str,
        reason: String,
    },

    #[error("expected a boolean expression, found {found}")]
    NonBooleanPredicate { found: String },
}

///
/// ExprType
///
/// Static type of a subexpression. `Null` is the untyped NULL literal,
/// which compares with anything and yields UNKNOWN.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ExprType {
    Null,
    Kind(ColumnKind),
}

impl ExprType {
    const BOOLEAN: Self = Self::Kind(ColumnKind::Bool);

    const fn is_boolean(self) -> bool {
        matches!(self, Self::Null | Self::Kind(ColumnKind::Bool))
    }
}

/// Check a normalized predicate against a table schema.
///
/// The root (and every logical operand) must be boolean, column references
/// must resolve, and comparison operands must be mutually comparable.
pub fn validate(expr: &Expr, schema: &TableSchema) -> Result<(), ValidateError> {
    let root = infer(expr, schema)?;
    require_boolean(expr, root)
}

fn infer(expr: &Expr, schema: &TableSchema) -> Result<ExprType, ValidateError> {
    match expr {
        Expr::Literal(value) => Ok(literal_type(value)),
        Expr::Column(name) => schema
            .column(name)
            .map(|column| ExprType::Kind(column.kind))
            .ok_or_else(|| ValidateError::UnknownColumn {
                column: name.clone(),
            }),
        Expr::Compare { op, left, right } => {
            check_comparable(*op, left, right, schema)?;
            Ok(ExprType::BOOLEAN)
        }
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
            infer(inner, schema)?;
            Ok(ExprType::BOOLEAN)
        }
        Expr::Like { operand, pattern } => {
            require_text("LIKE operand", operand, infer(operand, schema)?)?;
            require_text("LIKE pattern", pattern, infer(pattern, schema)?)?;
            Ok(ExprType::BOOLEAN)
        }
        Expr::Between {
            target,
            lower,
            upper,
        } => {
            check_comparable(CompareOp::Lte, lower, target, schema)?;
            check_comparable(CompareOp::Lte, target, upper, schema)?;
            Ok(ExprType::BOOLEAN)
        }
        Expr::And(children) | Expr::Or(children) => {
            for child in children {
                let ty = infer(child, schema)?;
                require_boolean(child, ty)?;
            }
            Ok(ExprType::BOOLEAN)
        }
        Expr::Not(inner) => {
            let ty = infer(inner, schema)?;
            require_boolean(inner, ty)?;
            Ok(ExprType::BOOLEAN)
        }
    }
}

fn check_comparable(
    op: CompareOp,
    left: &Expr,
    right: &Expr,
    schema: &TableSchema,
) -> Result<(), ValidateError> {
    let left_ty = infer(left, schema)?;
    let right_ty = infer(right, schema)?;

    let (ExprType::Kind(left_kind), ExprType::Kind(right_kind)) = (left_ty, right_ty) else {
        return Ok(());
    };

    if op.is_ordering() && matches!(left_kind, ColumnKind::Bool) {
        return Err(ValidateError::UnsupportedOperator {
            operator: op.symbol(),
            reason: "boolean operands only support equality".to_string(),
        });
    }

    if left_kind.compares_with_kind(right_kind) {
        return Ok(());
    }

    Err(match (left, right) {
        (Expr::Column(column), Expr::Literal(value))
        | (Expr::Literal(value), Expr::Column(column)) => {
            let expected = if matches!(left, Expr::Column(_)) {
                left_kind
            } else {
                right_kind
            };

            ValidateError::LiteralTypeMismatch {
                column: column.clone(),
                expected,
                found: value.tag(),
            }
        }
        _ => ValidateError::IncomparableOperands {
            op,
            left: left_kind,
            right: right_kind,
        },
    })
}

fn require_text(operator: &'static str, expr: &Expr, ty: ExprType) -> Result<(), ValidateError> {
    match ty {
        ExprType::Null | ExprType::Kind(ColumnKind::Text) => Ok(()),
        ExprType::Kind(kind) => Err(ValidateError::UnsupportedOperator {
            operator,
            reason: format!("'{expr}' has type {kind}, expected Text"),
        }),
    }
}

fn require_boolean(expr: &Expr, ty: ExprType) -> Result<(), ValidateError> {
    if ty.is_boolean() {
        Ok(())
    } else {
        Err(ValidateError::NonBooleanPredicate {
            found: expr.to_string(),
        })
    }
}

const fn literal_type(value: &Value) -> ExprType {
    match value {
        Value::Null => ExprType::Null,
        Value::Bool(_) => ExprType::Kind(ColumnKind::Bool),
        Value::Int(_) => ExprType::Kind(ColumnKind::Int),
        Value::Uint(_) => ExprType::Kind(ColumnKind::Uint),
        Value::Float64(_) => ExprType::Kind(ColumnKind::Float64),
        Value::Text(_) => ExprType::Kind(ColumnKind::Text),
        Value::Blob(_) => ExprType::Kind(ColumnKind::Blob),
    }
}
