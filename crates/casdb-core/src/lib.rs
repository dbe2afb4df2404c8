//! Core runtime for casdb: values, predicate trees, the predicate wire codec,
//! conditional mutations, and the apply-site executor.
#![warn(unreachable_pub)]

// public exports are one module level down
pub mod db;
pub mod error;
pub mod obs;
pub mod serialize;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, executors, stores, or serializers are re-exported here.
///

pub mod prelude {
    pub use crate::{
        db::{
            mutation::{Condition, Mutation, RowKey, UpsertStatement},
            predicate::{CompareOp, Expr},
            schema::{ColumnKind, ColumnSchema, TableSchema},
        },
        value::Value,
    };
}
