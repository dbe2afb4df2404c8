//! Shared fixtures for unit tests: the `UpsertCompare` table and proptest
//! strategies over values and predicate trees.

use crate::{
    db::{
        predicate::{CompareOp, Expr},
        schema::{ColumnKind, ColumnSchema, TableSchema},
    },
    value::Value,
};
use proptest::{collection::vec, prelude::*};
use std::collections::BTreeMap;

pub(crate) const COMPARE_TABLE: &str = "UpsertCompare";

/// `UpsertCompare(k text primary key, value1 text, value2 text, value3 int)`
pub(crate) fn compare_schema() -> TableSchema {
    TableSchema::new(
        COMPARE_TABLE,
        vec![
            ColumnSchema::new("k", ColumnKind::Text),
            ColumnSchema::new("value1", ColumnKind::Text),
            ColumnSchema::new("value2", ColumnKind::Text),
            ColumnSchema::new("value3", ColumnKind::Int),
        ],
        vec!["k".to_string()],
    )
    .expect("compare schema should be valid")
}

pub(crate) fn key_columns() -> Vec<String> {
    vec!["k".to_string()]
}

/// Seed row image: `value1` never written, `value2 = 'Compare Test'`, `value3 = 1`.
pub(crate) fn seeded_row() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("value2".to_string(), Value::from("Compare Test")),
        ("value3".to_string(), Value::Int(1)),
    ])
}

pub(crate) fn arb_compare_op() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Lte),
        Just(CompareOp::Gt),
        Just(CompareOp::Gte),
    ]
}

pub(crate) fn arb_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Int),
        any::<u64>().prop_map(Value::Uint),
        any::<f64>().prop_filter_map("finite floats only", Value::float64),
        "[a-zA-Z %_é]{0,8}".prop_map(Value::Text),
        vec(any::<u8>(), 0..8).prop_map(Value::Blob),
    ]
}

/// Arbitrary predicate trees over the non-key columns of `UpsertCompare`.
/// Trees are structurally arbitrary, not necessarily well-typed.
pub(crate) fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        arb_value().prop_map(Expr::Literal),
        "value[1-3]".prop_map(Expr::Column),
    ];

    leaf.prop_recursive(4, 48, 4, |inner| {
        prop_oneof![
            (arb_compare_op(), inner.clone(), inner.clone())
                .prop_map(|(op, left, right)| Expr::compare(op, left, right)),
            inner.clone().prop_map(Expr::is_null),
            inner.clone().prop_map(Expr::is_not_null),
            (inner.clone(), inner.clone()).prop_map(|(operand, pattern)| operand.like(pattern)),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(target, lower, upper)| target.between(lower, upper)),
            vec(inner.clone(), 0..4).prop_map(Expr::And),
            vec(inner.clone(), 0..4).prop_map(Expr::Or),
            inner.prop_map(|child| !child),
        ]
    })
}
