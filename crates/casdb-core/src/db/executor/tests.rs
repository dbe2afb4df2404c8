use super::*;
use crate::{
    db::{
        mutation::{RowKey, UpsertStatement, compile_upsert, compile_upsert_with_limits},
        store::MemoryRowStore,
    },
    error::{ErrorClass, ErrorOrigin},
    obs::sink::{MetricsSink, with_metrics_sink},
    test_support::{COMPARE_TABLE, compare_schema},
    value::Value,
};
use parking_lot::Mutex;
use std::{
    collections::BTreeMap,
    sync::{Arc, mpsc},
    thread,
    time::Duration,
};

const KEY: &str = "Key-1";

fn key(name: &str) -> RowKey {
    RowKey::from_key_values(&[Value::from(name)]).expect("text key should encode")
}

fn compile(stmt: UpsertStatement) -> Mutation {
    compile_upsert(&compare_schema(), stmt).expect("upsert should compile")
}

fn apply(store: &MemoryRowStore, mutation: &Mutation) -> ApplyOutcome {
    ApplyExecutor::new(store, CodecLimits::default(), false)
        .apply(mutation)
        .expect("apply should succeed")
}

/// Store holding `Key-1 = (value1 NULL, value2 'Compare Test', value3 1)`.
fn seeded_store() -> MemoryRowStore {
    let store = MemoryRowStore::default();
    let seed = compile(
        UpsertStatement::new(COMPARE_TABLE)
            .set("k", KEY)
            .set("value2", "Compare Test")
            .set("value3", 1),
    );
    assert_eq!(apply(&store, &seed), ApplyOutcome::Applied);

    store
}

fn guarded_write(predicate: Expr) -> Mutation {
    compile(
        UpsertStatement::new(COMPARE_TABLE)
            .set("k", KEY)
            .set("value1", "written")
            .only_if(predicate),
    )
}

fn stored(store: &MemoryRowStore, name: &str) -> Row {
    store
        .read(COMPARE_TABLE, &key(name))
        .expect("read should succeed")
        .expect("row should exist")
}

fn outcome_on_seeded(predicate: Expr) -> (ApplyOutcome, Row) {
    let store = seeded_store();
    let outcome = apply(&store, &guarded_write(predicate));

    (outcome, stored(&store, KEY))
}

///
/// CaptureSink
///

#[derive(Default)]
struct CaptureSink {
    events: Mutex<Vec<String>>,
}

impl CaptureSink {
    fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

impl MetricsSink for CaptureSink {
    fn record(&self, event: MetricsEvent<'_>) {
        self.events.lock().push(format!("{event:?}"));
    }
}

// ---------------------------------------------------------------------
// evaluate
// ---------------------------------------------------------------------

#[test]
fn unconditional_always_applies() {
    let mutation = compile(UpsertStatement::new(COMPARE_TABLE).set("k", KEY));

    assert_eq!(
        evaluate(&mutation, None).expect("evaluate should succeed"),
        ApplyOutcome::Applied
    );
}

#[test]
fn unknown_root_skips() {
    let row: Row = [("value3", Value::Int(1))].into_iter().collect();
    let mutation = guarded_write(Expr::col("value1").eq(Expr::lit("test")));

    assert_eq!(
        evaluate(&mutation, Some(&row)).expect("evaluate should succeed"),
        ApplyOutcome::Skipped
    );
}

#[test]
fn absent_row_reads_every_column_as_null() {
    let is_null = guarded_write(Expr::col("value3").is_null());
    let equals = guarded_write(Expr::col("value3").eq(Expr::lit(1)));

    assert_eq!(
        evaluate(&is_null, None).expect("evaluate should succeed"),
        ApplyOutcome::Applied
    );
    assert_eq!(
        evaluate(&equals, None).expect("evaluate should succeed"),
        ApplyOutcome::Skipped
    );
}

#[test]
fn evaluate_and_apply_follow_compile_limits() {
    let limits = CodecLimits::new(64 * 1024, 512);
    let predicate = (0..200).fold(Expr::col("value1").is_null(), |expr, _| !expr);
    let mutation = compile_upsert_with_limits(
        &compare_schema(),
        UpsertStatement::new(COMPARE_TABLE)
            .set("k", KEY)
            .set("value1", "written")
            .only_if(predicate),
        limits,
    )
    .expect("deep predicate fits the raised limits");

    // an even number of negations over TRUE
    assert_eq!(
        evaluate(&mutation, None).expect("evaluate should succeed"),
        ApplyOutcome::Applied
    );

    let store = seeded_store();
    let outcome = ApplyExecutor::new(&store, limits, false)
        .apply(&mutation)
        .expect("apply should succeed");
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(stored(&store, KEY).get("value1"), Some(&Value::from("written")));
}

// ---------------------------------------------------------------------
// apply against the seeded row
// ---------------------------------------------------------------------

#[test]
fn is_null_on_unwritten_column_applies() {
    let (outcome, row) = outcome_on_seeded(Expr::col("value1").is_null());

    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(row.get("value1"), Some(&Value::from("written")));
    assert_eq!(row.get("value2"), Some(&Value::from("Compare Test")));
    assert_eq!(row.get("value3"), Some(&Value::Int(1)));
}

#[test]
fn comparison_with_null_column_skips_and_discards_values() {
    let (outcome, row) = outcome_on_seeded(Expr::col("value1").eq(Expr::lit("test")));

    assert_eq!(outcome, ApplyOutcome::Skipped);
    assert_eq!(row.get("value1"), None);
}

#[test]
fn false_comparison_skips() {
    let (outcome, row) = outcome_on_seeded(Expr::col("value2").eq(Expr::lit("root")));

    assert_eq!(outcome, ApplyOutcome::Skipped);
    assert_eq!(row.get("value1"), None);
}

#[test]
fn nested_logic_applies() {
    let predicate = Expr::col("value1").is_null()
        & (Expr::col("value2").eq(Expr::lit("root")) | Expr::col("value3").eq(Expr::lit(1)));

    let (outcome, _) = outcome_on_seeded(predicate);

    assert_eq!(outcome, ApplyOutcome::Applied);
}

#[test]
fn like_prefix_applies() {
    let (outcome, _) = outcome_on_seeded(Expr::col("value2").like(Expr::lit("Compare%")));

    assert_eq!(outcome, ApplyOutcome::Applied);
}

#[test]
fn negated_unknown_still_skips() {
    let (outcome, _) = outcome_on_seeded(!Expr::col("value1").eq(Expr::lit("test")));

    assert_eq!(outcome, ApplyOutcome::Skipped);
}

#[test]
fn upsert_if_not_exists_creates_absent_row() {
    let store = MemoryRowStore::default();
    let mutation = compile(
        UpsertStatement::new(COMPARE_TABLE)
            .set("k", "Key-abc")
            .set("value3", 1)
            .only_if(Expr::col("value3").is_null()),
    );

    assert_eq!(apply(&store, &mutation), ApplyOutcome::Applied);
    assert_eq!(stored(&store, "Key-abc").get("value3"), Some(&Value::Int(1)));

    // the row now exists, so the same guard no longer holds
    assert_eq!(apply(&store, &mutation), ApplyOutcome::Skipped);
}

#[test]
fn chained_compare_and_set_keeps_only_final_value() {
    let store = seeded_store();
    let step = |from: i64, to: i64| {
        compile(
            UpsertStatement::new(COMPARE_TABLE)
                .set("k", KEY)
                .set("value3", to)
                .only_if(Expr::col("value3").eq(Expr::lit(from))),
        )
    };

    for (from, to) in [(1, 5), (5, 9), (9, 11), (11, 64)] {
        assert_eq!(apply(&store, &step(from, to)), ApplyOutcome::Applied);
    }

    // resubmitting an earlier step is harmless but no longer applies
    assert_eq!(apply(&store, &step(1, 5)), ApplyOutcome::Skipped);
    assert_eq!(stored(&store, KEY).get("value3"), Some(&Value::Int(64)));
}

#[test]
fn null_write_clears_column() {
    let store = seeded_store();
    let clear = compile(
        UpsertStatement::new(COMPARE_TABLE)
            .set("k", KEY)
            .set("value2", Value::Null)
            .only_if(Expr::col("value2").is_not_null()),
    );

    assert_eq!(apply(&store, &clear), ApplyOutcome::Applied);
    assert_eq!(stored(&store, KEY).get("value2"), None);

    // a cleared column is indistinguishable from one never written
    let outcome = apply(&store, &guarded_write(Expr::col("value2").is_null()));
    assert_eq!(outcome, ApplyOutcome::Applied);
}

// ---------------------------------------------------------------------
// failures
// ---------------------------------------------------------------------

#[test]
fn decode_failure_leaves_row_untouched() {
    let store = seeded_store();
    let mutation = guarded_write(Expr::col("value1").is_null());
    let sink = Arc::new(CaptureSink::default());

    let err = with_metrics_sink(sink.clone(), || {
        ApplyExecutor::new(&store, CodecLimits::new(1024, 1), false)
            .apply(&mutation)
            .expect_err("over-deep predicate must fail to decode")
    });

    assert!(matches!(
        err,
        ApplyError::Decode(CodecError::DepthExceeded { max: 1 })
    ));
    assert!(!err.is_retryable());
    assert_eq!(stored(&store, KEY).get("value1"), None);
    assert_eq!(
        sink.events(),
        vec![
            format!("ApplyStart {{ table: \"{COMPARE_TABLE}\", conditional: true }}"),
            format!("DecodeFailed {{ table: \"{COMPARE_TABLE}\" }}"),
        ]
    );

    let internal = InternalError::from(err);
    assert_eq!(internal.class, ErrorClass::Corruption);
    assert_eq!(internal.origin, ErrorOrigin::Codec);
}

#[test]
fn ill_typed_predicate_is_an_executor_invariant() {
    let store = seeded_store();
    // built without schema validation: Int column against a Text literal
    let mutation = Mutation::conditional(
        COMPARE_TABLE,
        key(KEY),
        BTreeMap::from([("value1".to_string(), Value::from("written"))]),
        Expr::col("value3").eq(Expr::lit("one")),
    )
    .expect("predicate should encode");

    let err = ApplyExecutor::new(&store, CodecLimits::default(), false)
        .apply(&mutation)
        .expect_err("incomparable operands must fail");

    assert!(matches!(err, ApplyError::Eval(_)));
    assert_eq!(stored(&store, KEY).get("value1"), None);

    let internal = InternalError::from(err);
    assert_eq!(internal.class, ErrorClass::InvariantViolation);
    assert_eq!(internal.origin, ErrorOrigin::Executor);
    assert!(!internal.is_retryable());
}

#[test]
fn lock_timeout_is_retryable_and_recorded() {
    let store = &MemoryRowStore::new(crate::db::store::StoreOptions {
        lock_timeout: Duration::from_millis(20),
    });
    let k = &key(KEY);
    let mutation = guarded_write(Expr::col("value1").is_null());
    let sink = Arc::new(CaptureSink::default());
    let (held_tx, held_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();

    thread::scope(|scope| {
        scope.spawn(move || {
            store
                .apply_if(COMPARE_TABLE, k, |_| {
                    held_tx.send(()).expect("main thread should be listening");
                    release_rx
                        .recv_timeout(Duration::from_secs(5))
                        .expect("main thread should release the lock");
                    (RowWrite::Keep, ())
                })
                .expect("holder apply should succeed");
        });

        held_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("holder should acquire the row lock");

        let err = with_metrics_sink(sink.clone(), || {
            ApplyExecutor::new(store, CodecLimits::default(), false)
                .apply(&mutation)
                .expect_err("contended row must time out")
        });
        release_tx.send(()).expect("holder should be waiting");

        assert!(err.is_retryable());
        assert!(InternalError::from(err).is_retryable());
    });

    assert!(
        sink.events()
            .contains(&format!("LockTimeout {{ table: \"{COMPARE_TABLE}\" }}"))
    );

    // resubmitting the identical mutation succeeds once the lock is free
    assert_eq!(apply(store, &mutation), ApplyOutcome::Applied);
}

// ---------------------------------------------------------------------
// metrics
// ---------------------------------------------------------------------

#[test]
fn apply_records_start_and_finish() {
    let store = seeded_store();
    let sink = Arc::new(CaptureSink::default());

    with_metrics_sink(sink.clone(), || {
        apply(&store, &guarded_write(Expr::col("value2").eq(Expr::lit("root"))));
        apply(&store, &compile(UpsertStatement::new(COMPARE_TABLE).set("k", KEY)));
    });

    assert_eq!(
        sink.events(),
        vec![
            format!("ApplyStart {{ table: \"{COMPARE_TABLE}\", conditional: true }}"),
            format!("ApplyFinish {{ table: \"{COMPARE_TABLE}\", applied: false }}"),
            format!("ApplyStart {{ table: \"{COMPARE_TABLE}\", conditional: false }}"),
            format!("ApplyFinish {{ table: \"{COMPARE_TABLE}\", applied: true }}"),
        ]
    );
}
