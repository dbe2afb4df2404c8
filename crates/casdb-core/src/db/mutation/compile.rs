use crate::{
    db::{
        codec::{CodecError, CodecLimits},
        mutation::{Condition, EncodedPredicate, Mutation, RowKey},
        predicate::{Expr, RowKeyInPredicateError, ValidateError, normalize, validate},
        schema::{ColumnKind, TableSchema},
    },
    error::InternalError,
    value::{Value, ValueTag},
};
use std::collections::BTreeMap;
use thiserror::Error as ThisError;

///
/// CompileError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CompileError {
    #[error("upsert targets table '{found}' but the schema describes '{expected}'")]
    TableMismatch { expected: String, found: String },

    #[error(transparent)]
    RowKeyInPredicate(#[from] RowKeyInPredicateError),

    #[error(transparent)]
    Predicate(#[from] ValidateError),

    #[error("unknown column '{column}' in upsert")]
    UnknownColumn { column: String },

    #[error("column '{column}' is assigned more than once")]
    DuplicateColumn { column: String },

    #[error("value of type {found} cannot be stored in column '{column}' of type {expected}")]
    ValueTypeMismatch {
        column: String,
        expected: ColumnKind,
        found: ValueTag,
    },

    #[error("primary key column '{column}' is not assigned")]
    MissingKeyColumn { column: String },

    #[error("primary key column '{column}' must not be NULL")]
    NullKeyColumn { column: String },

    #[error("predicate rejected by codec: {0}")]
    Codec(#[from] CodecError),
}

impl From<CompileError> for InternalError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::RowKeyInPredicate(_)
            | CompileError::Predicate(_)
            | CompileError::Codec(_) => Self::predicate_unsupported(err.to_string()),
            _ => Self::mutation_unsupported(err.to_string()),
        }
    }
}

///
/// UpsertStatement
///
/// Compiler-facing form of `UPSERT INTO table (cols) VALUES (...) [WHERE predicate]`.
/// Column order is irrelevant; the primary-key columns must all be assigned.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UpsertStatement {
    pub table: String,
    pub values: Vec<(String, Value)>,
    pub compare: Option<Expr>,
}

impl UpsertStatement {
    #[must_use]
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
            compare: None,
        }
    }

    #[must_use]
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn only_if(mut self, predicate: Expr) -> Self {
        self.compare = Some(predicate);
        self
    }
}

/// Compile an upsert statement under the default codec limits.
pub fn compile_upsert(
    schema: &TableSchema,
    stmt: UpsertStatement,
) -> Result<Mutation, CompileError> {
    compile_upsert_with_limits(schema, stmt, CodecLimits::default())
}

/// Compile an upsert statement into a mutation.
///
/// Column values are type-checked, the row identifier is built from the
/// primary-key values, and the optional predicate is normalized, validated
/// against the schema, and encoded. Key columns never appear in the
/// mutation's column payload.
pub fn compile_upsert_with_limits(
    schema: &TableSchema,
    stmt: UpsertStatement,
    limits: CodecLimits,
) -> Result<Mutation, CompileError> {
    if stmt.table != schema.name() {
        return Err(CompileError::TableMismatch {
            expected: schema.name().to_string(),
            found: stmt.table,
        });
    }

    let mut assigned = BTreeMap::new();
    for (column, value) in stmt.values {
        let Some(column_schema) = schema.column(&column) else {
            return Err(CompileError::UnknownColumn { column });
        };
        if !value.is_null() && !column_schema.kind.accepts(&value) {
            return Err(CompileError::ValueTypeMismatch {
                expected: column_schema.kind,
                found: value.tag(),
                column,
            });
        }
        if assigned.contains_key(&column) {
            return Err(CompileError::DuplicateColumn { column });
        }
        assigned.insert(column, value);
    }

    let row_key = extract_row_key(schema, &mut assigned)?;

    let Some(compare) = stmt.compare else {
        return Ok(Mutation::unconditional(stmt.table, row_key, assigned));
    };

    // normalizing never makes a tree shallower
    limits.admit_depth(compare.depth())?;
    let normalized = normalize(&compare, schema.primary_key())?;
    limits.admit_depth(normalized.depth())?;
    validate(&normalized, schema)?;

    let encoded = EncodedPredicate::from_expr_with_limits(&normalized, limits)?;

    Ok(Mutation {
        table: stmt.table,
        row_key,
        values: assigned,
        condition: Condition::Conditional(encoded),
    })
}

// Remove the key columns from the payload and fold them into the row key.
fn extract_row_key(
    schema: &TableSchema,
    assigned: &mut BTreeMap<String, Value>,
) -> Result<RowKey, CompileError> {
    let mut key_values = Vec::with_capacity(schema.primary_key().len());
    for column in schema.primary_key() {
        let value = assigned
            .remove(column)
            .ok_or_else(|| CompileError::MissingKeyColumn {
                column: column.clone(),
            })?;
        if value.is_null() {
            return Err(CompileError::NullKeyColumn {
                column: column.clone(),
            });
        }
        key_values.push(value);
    }

    Ok(RowKey::from_key_values(&key_values)?)
}
