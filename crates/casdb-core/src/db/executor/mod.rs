#[cfg(test)]
mod tests;

use crate::{
    db::{
        codec::{CodecError, CodecLimits},
        mutation::Mutation,
        predicate::{EvalError, Expr, eval},
        store::{Row, RowStore, RowWrite, StoreError},
    },
    error::InternalError,
    obs::sink::{self, MetricsEvent},
};
use thiserror::Error as ThisError;
use tracing::{debug, warn};

// Design notes:
// - The predicate is decoded once per attempt, before the row lock is taken.
//   Decode failures therefore never hold a lock and never touch the row.
// - Evaluation and the write happen inside RowStore::apply_if, under the row lock.
// - Skipped mutations discard their column values; nothing is written.
// - Evaluation errors are contract breaches: compiled mutations are validated
//   against the schema, so a type error here means the predicate bypassed compile.

///
/// ApplyOutcome
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyOutcome {
    Applied,
    Skipped,
}

impl ApplyOutcome {
    #[must_use]
    pub const fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
        }
    }
}

///
/// ApplyError
///

#[derive(Debug, ThisError)]
pub enum ApplyError {
    #[error("predicate decode failed: {0}")]
    Decode(#[from] CodecError),

    #[error("predicate evaluation failed: {0}")]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ApplyError {
    /// Storage contention is transient; everything else fails the same way on resubmit.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(err) => err.is_retryable(),
            Self::Decode(_) | Self::Eval(_) => false,
        }
    }
}

impl From<ApplyError> for InternalError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Decode(err) => err.into(),
            ApplyError::Eval(err) => {
                Self::executor_invariant(format!("predicate evaluation failed: {err}"))
            }
            ApplyError::Store(err) => err.into(),
        }
    }
}

/// Decide whether `mutation` applies to the row image `current`.
///
/// Unconditional mutations always apply. Conditional ones apply only when
/// their predicate evaluates to TRUE; FALSE and UNKNOWN both skip.
pub fn evaluate(mutation: &Mutation, current: Option<&Row>) -> Result<ApplyOutcome, ApplyError> {
    let predicate = mutation.predicate()?;

    Ok(decide(predicate.as_ref(), current)?)
}

fn decide(predicate: Option<&Expr>, current: Option<&Row>) -> Result<ApplyOutcome, EvalError> {
    let Some(predicate) = predicate else {
        return Ok(ApplyOutcome::Applied);
    };

    let outcome = if eval(&current, predicate)?.is_true() {
        ApplyOutcome::Applied
    } else {
        ApplyOutcome::Skipped
    };

    Ok(outcome)
}

///
/// ApplyExecutor
///
/// Apply-site executor: decodes the guard, then runs read-evaluate-write
/// atomically on the target row through the storage engine.
///

#[derive(Debug)]
pub struct ApplyExecutor<'a, S: RowStore> {
    store: &'a S,
    limits: CodecLimits,
    debug: bool,
}

impl<'a, S: RowStore> ApplyExecutor<'a, S> {
    #[must_use]
    pub const fn new(store: &'a S, limits: CodecLimits, debug: bool) -> Self {
        Self {
            store,
            limits,
            debug,
        }
    }

    #[must_use]
    pub const fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    fn debug_log(&self, s: impl AsRef<str>) {
        if self.debug {
            debug!(target: "casdb::apply", "{}", s.as_ref());
        }
    }

    /// Apply one mutation attempt.
    ///
    /// On `Applied` the assigned columns are merged into the stored row,
    /// creating it when absent. On `Skipped` the row is left untouched.
    pub fn apply(&self, mutation: &Mutation) -> Result<ApplyOutcome, ApplyError> {
        let table = mutation.table();
        let key = mutation.row_key();
        sink::record(MetricsEvent::ApplyStart {
            table,
            conditional: mutation.is_conditional(),
        });

        let predicate = match mutation.encoded_predicate() {
            None => None,
            Some(encoded) => match encoded.decode_with_limits(self.limits) {
                Ok(expr) => Some(expr),
                Err(err) => {
                    sink::record(MetricsEvent::DecodeFailed { table });
                    warn!(
                        table,
                        key = %key,
                        error = %err,
                        kind = err.kind().as_str(),
                        "predicate decode failed"
                    );

                    return Err(err.into());
                }
            },
        };

        if let Some(predicate) = &predicate {
            self.debug_log(format!("Evaluating {predicate} on {table}/{key}"));
        }

        let decision = self.store.apply_if(table, key, |current| {
            match decide(predicate.as_ref(), current) {
                Ok(ApplyOutcome::Applied) => (
                    RowWrite::Put(Row::merged(current, mutation.values())),
                    Ok(ApplyOutcome::Applied),
                ),
                Ok(ApplyOutcome::Skipped) => (RowWrite::Keep, Ok(ApplyOutcome::Skipped)),
                Err(err) => (RowWrite::Keep, Err(err)),
            }
        });

        let outcome = match decision {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                sink::record(MetricsEvent::EvalFailed { table });
                warn!(table, key = %key, error = %err, "predicate evaluation failed");

                return Err(err.into());
            }
            Err(err) => {
                if matches!(err, StoreError::LockTimeout { .. }) {
                    sink::record(MetricsEvent::LockTimeout { table });
                }
                warn!(
                    table,
                    key = %key,
                    error = %err,
                    retryable = err.is_retryable(),
                    "row apply failed"
                );

                return Err(err.into());
            }
        };

        sink::record(MetricsEvent::ApplyFinish {
            table,
            applied: outcome.is_applied(),
        });
        self.debug_log(format!(
            "Mutation on {table}/{key}: {} ({} columns)",
            outcome.as_str(),
            mutation.values().len()
        ));

        Ok(outcome)
    }
}
