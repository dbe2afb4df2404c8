use crate::{
    db::{
        codec::CodecLimits,
        executor::{ApplyExecutor, ApplyOutcome},
        mutation::{Mutation, RowKey, UpsertStatement, compile_upsert_with_limits},
        schema::TableSchema,
        store::{MemoryRowStore, Row, RowStore, StoreOptions},
    },
    error::InternalError,
    obs::sink::{self, MetricsEvent, MetricsSink, with_metrics_sink},
    value::Value,
};
use casdb_config::CasdbConfig;
use parking_lot::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::debug;

///
/// DbSession
///
/// Session-scoped database handle: table schemas, codec policy, debug and
/// metrics routing, and the storage engine mutations are applied to.
///

pub struct DbSession<S: RowStore> {
    store: S,
    schemas: RwLock<HashMap<String, Arc<TableSchema>>>,
    limits: CodecLimits,
    debug: bool,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl DbSession<MemoryRowStore> {
    /// Session over a fresh in-memory store configured from `config`.
    pub fn in_memory(config: &CasdbConfig) -> Result<Self, InternalError> {
        config.validate()?;
        let store = MemoryRowStore::new(StoreOptions::from(&config.store));

        Ok(Self::with_config(store, config))
    }
}

impl<S: RowStore> DbSession<S> {
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            schemas: RwLock::new(HashMap::new()),
            limits: CodecLimits::default(),
            debug: false,
            metrics: None,
        }
    }

    /// Apply codec limits and the debug flag from `config`.
    ///
    /// Store options are owned by the store itself and are not touched here.
    #[must_use]
    pub fn with_config(store: S, config: &CasdbConfig) -> Self {
        let mut session = Self::new(store).with_limits(CodecLimits::from(&config.codec));
        session.debug = config.session.debug;

        session
    }

    #[must_use]
    pub const fn with_limits(mut self, limits: CodecLimits) -> Self {
        self.limits = limits;
        self
    }

    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    #[must_use]
    pub fn metrics_sink(mut self, sink: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(sink);
        self
    }

    fn with_metrics<T>(&self, f: impl FnOnce() -> T) -> T {
        if let Some(sink) = &self.metrics {
            with_metrics_sink(sink.clone(), f)
        } else {
            f()
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub const fn limits(&self) -> CodecLimits {
        self.limits
    }

    // ---------------------------------------------------------------------
    // Schema registry
    // ---------------------------------------------------------------------

    /// Register (or replace) a table schema.
    pub fn register_table(&self, schema: TableSchema) {
        if self.debug {
            debug!(table = schema.name(), "registering table schema");
        }

        self.schemas
            .write()
            .insert(schema.name().to_string(), Arc::new(schema));
    }

    /// Look up a registered table schema.
    pub fn schema(&self, table: &str) -> Result<Arc<TableSchema>, InternalError> {
        self.schemas
            .read()
            .get(table)
            .cloned()
            .ok_or_else(|| InternalError::table_not_found(table))
    }

    // ---------------------------------------------------------------------
    // Write path
    // ---------------------------------------------------------------------

    /// Compile an upsert statement against its registered schema.
    pub fn compile(&self, stmt: UpsertStatement) -> Result<Mutation, InternalError> {
        let schema = self.schema(&stmt.table)?;
        let table = stmt.table.clone();

        compile_upsert_with_limits(&schema, stmt, self.limits).map_err(|err| {
            self.with_metrics(|| sink::record(MetricsEvent::CompileRejected { table: &table }));
            if self.debug {
                debug!(table = %table, error = %err, "upsert rejected at compile");
            }

            err.into()
        })
    }

    /// Apply an already-compiled mutation, possibly received from another process.
    pub fn apply(&self, mutation: &Mutation) -> Result<ApplyOutcome, InternalError> {
        let executor = ApplyExecutor::new(&self.store, self.limits, self.debug);

        Ok(self.with_metrics(|| executor.apply(mutation))?)
    }

    /// Compile and apply in one step.
    pub fn upsert(&self, stmt: UpsertStatement) -> Result<ApplyOutcome, InternalError> {
        let mutation = self.compile(stmt)?;

        self.apply(&mutation)
    }

    // ---------------------------------------------------------------------
    // Read path
    // ---------------------------------------------------------------------

    /// Read the current image of the row identified by its primary-key values.
    pub fn load(&self, table: &str, key_values: &[Value]) -> Result<Option<Row>, InternalError> {
        let schema = self.schema(table)?;
        if key_values.len() != schema.primary_key().len() {
            return Err(InternalError::mutation_unsupported(format!(
                "table '{table}' has {} primary key columns, {} values given",
                schema.primary_key().len(),
                key_values.len()
            )));
        }

        let key = RowKey::from_key_values(key_values)?;

        Ok(self.store.read(table, &key)?)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::predicate::Expr,
        error::{ErrorClass, ErrorOrigin},
        test_support::{COMPARE_TABLE, compare_schema},
    };
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CaptureSink {
        events: Mutex<Vec<String>>,
    }

    impl MetricsSink for CaptureSink {
        fn record(&self, event: MetricsEvent<'_>) {
            self.events.lock().push(format!("{event:?}"));
        }
    }

    fn session() -> DbSession<MemoryRowStore> {
        let session = DbSession::in_memory(&CasdbConfig::default()).expect("default config");
        session.register_table(compare_schema());
        session
    }

    #[test]
    fn upsert_then_load_round_trips_row() {
        let db = session();

        let outcome = db
            .upsert(
                UpsertStatement::new(COMPARE_TABLE)
                    .set("k", "Key-1")
                    .set("value3", 1)
                    .only_if(Expr::col("value3").is_null()),
            )
            .expect("upsert should succeed");
        assert_eq!(outcome, ApplyOutcome::Applied);

        let row = db
            .load(COMPARE_TABLE, &[Value::from("Key-1")])
            .expect("load should succeed")
            .expect("row should exist");
        assert_eq!(row.get("value3"), Some(&Value::Int(1)));
        assert_eq!(row.get("k"), None, "key columns live in the row key");
    }

    #[test]
    fn unknown_table_is_not_found() {
        let db = session();

        let err = db
            .upsert(UpsertStatement::new("Missing").set("k", "Key-1"))
            .expect_err("unregistered table must be rejected");
        assert!(err.is_not_found());

        let err = db
            .load("Missing", &[Value::from("Key-1")])
            .expect_err("unregistered table must be rejected");
        assert!(err.is_not_found());
    }

    #[test]
    fn load_rejects_wrong_key_arity() {
        let db = session();

        let err = db
            .load(COMPARE_TABLE, &[Value::from("a"), Value::from("b")])
            .expect_err("two key values for a one-column key");

        assert_eq!(err.class, ErrorClass::Unsupported);
        assert_eq!(err.origin, ErrorOrigin::Mutation);
    }

    #[test]
    fn compile_rejection_is_recorded_on_session_sink() {
        let sink = Arc::new(CaptureSink::default());
        let db = session().metrics_sink(sink.clone());

        let err = db
            .compile(
                UpsertStatement::new(COMPARE_TABLE)
                    .set("k", "Key-1")
                    .only_if(Expr::col("k").eq(Expr::lit("Key-1"))),
            )
            .expect_err("row key reference must be rejected");

        assert_eq!(
            err.message,
            "row key reference not permitted in conditional predicate"
        );
        assert_eq!(
            *sink.events.lock(),
            vec![format!("CompileRejected {{ table: \"{COMPARE_TABLE}\" }}")]
        );
    }

    #[test]
    fn session_limits_follow_config() {
        let config = CasdbConfig::from_toml_str(
            r"
            [codec]
            max_predicate_bytes = 16
            ",
        )
        .expect("config should parse");
        let db = DbSession::in_memory(&config).expect("config should be valid");
        db.register_table(compare_schema());

        let err = db
            .upsert(
                UpsertStatement::new(COMPARE_TABLE)
                    .set("k", "Key-1")
                    .only_if(Expr::col("value1").eq(Expr::lit("Compare Test"))),
            )
            .expect_err("predicate above the configured byte limit");

        assert_eq!(err.class, ErrorClass::Unsupported);
        assert_eq!(err.origin, ErrorOrigin::Predicate);
        assert_eq!(db.limits().max_bytes, 16);
    }

    #[test]
    fn raised_depth_limit_holds_across_transport() {
        let config = CasdbConfig::from_toml_str(
            r"
            [codec]
            max_predicate_depth = 512
            ",
        )
        .expect("config should parse");
        let db = DbSession::in_memory(&config).expect("config should be valid");
        db.register_table(compare_schema());

        let predicate = (0..200).fold(Expr::col("value1").is_null(), |expr, _| !expr);
        let mutation = db
            .compile(
                UpsertStatement::new(COMPARE_TABLE)
                    .set("k", "Key-1")
                    .set("value3", 1)
                    .only_if(predicate),
            )
            .expect("deep predicate fits the configured limit");

        let bytes = mutation.to_bytes().expect("mutation should serialize");
        let received = Mutation::from_bytes(&bytes, db.limits()).expect("envelope should decode");
        assert!(received.predicate().is_ok());
        assert_eq!(
            db.apply(&received).expect("apply should succeed"),
            ApplyOutcome::Applied
        );
    }

    #[test]
    fn invalid_config_is_rejected_on_open() {
        let mut config = CasdbConfig::default();
        config.store.lock_timeout_ms = 0;

        let Err(err) = DbSession::in_memory(&config) else {
            panic!("zero lock timeout must be rejected");
        };

        assert_eq!(err.class, ErrorClass::Unsupported);
        assert_eq!(err.origin, ErrorOrigin::Config);
    }
}
