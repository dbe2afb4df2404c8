use crate::value::{Float64, Value};
use std::cmp::Ordering;

///
/// Value ordering
///
/// Ordering is strict by variant with one exception: the numeric variants
/// (`Int`, `Uint`, `Float64`) compare by mathematical value after widening.
/// `Null` is never ordered; three-valued handling belongs to the evaluator.
///

/// Compare two values, returning `None` when the variants are incomparable.
#[must_use]
pub fn strict_order_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.as_bytes().cmp(b.as_bytes())),
        (Value::Blob(a), Value::Blob(b)) => Some(a.cmp(b)),
        _ => numeric_cmp(left, right),
    }
}

/// Whether two values may be ordered against each other at all.
#[must_use]
pub fn comparable(left: &Value, right: &Value) -> bool {
    strict_order_cmp(left, right).is_some()
}

fn numeric_cmp(left: &Value, right: &Value) -> Option<Ordering> {
    let ordering = match (left, right) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Uint(a), Value::Uint(b)) => a.cmp(b),
        (Value::Int(a), Value::Uint(b)) => i128::from(*a).cmp(&i128::from(*b)),
        (Value::Uint(a), Value::Int(b)) => i128::from(*a).cmp(&i128::from(*b)),
        (Value::Float64(a), Value::Float64(b)) => a.cmp(b),
        (Value::Float64(a), Value::Int(b)) => float_cmp_integer(*a, i128::from(*b)),
        (Value::Float64(a), Value::Uint(b)) => float_cmp_integer(*a, i128::from(*b)),
        (Value::Int(a), Value::Float64(b)) => float_cmp_integer(*b, i128::from(*a)).reverse(),
        (Value::Uint(a), Value::Float64(b)) => float_cmp_integer(*b, i128::from(*a)).reverse(),
        _ => return None,
    };

    Some(ordering)
}

// Exact comparison without routing the integer through f64.
#[expect(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn float_cmp_integer(float: Float64, integer: i128) -> Ordering {
    const LIMIT: f64 = i128::MAX as f64;

    let value = float.get();
    if value >= LIMIT {
        return Ordering::Greater;
    }
    if value < -LIMIT {
        return Ordering::Less;
    }

    let whole = value.trunc();
    match (whole as i128).cmp(&integer) {
        Ordering::Equal => (value - whole).partial_cmp(&0.0).unwrap_or(Ordering::Equal),
        other => other,
    }
}
