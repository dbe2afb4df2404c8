use casdb_core::{
    db::{executor::ApplyError, mutation::CompileError},
    error::{ErrorClass, ErrorOrigin as CoreErrorOrigin, InternalError},
};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

///
/// Error
/// Public error type with a stable kind + origin taxonomy.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize, ThisError)]
#[error("{message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Resubmitting the identical mutation may succeed.
    pub retryable: bool,
}

impl Error {
    pub fn new(kind: ErrorKind, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        let retryable = matches!(kind, ErrorKind::Store(StoreErrorKind::Unavailable));

        Self {
            kind,
            origin,
            message: message.into(),
            retryable,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.retryable
    }
}

impl From<InternalError> for Error {
    fn from(err: InternalError) -> Self {
        let kind = match (err.class, err.origin) {
            (ErrorClass::Unavailable, _) => ErrorKind::Store(StoreErrorKind::Unavailable),
            (ErrorClass::NotFound, _) => ErrorKind::Compile(CompileErrorKind::NotFound),
            (ErrorClass::Unsupported, CoreErrorOrigin::Predicate | CoreErrorOrigin::Mutation) => {
                ErrorKind::Compile(CompileErrorKind::Unsupported)
            }
            (ErrorClass::Corruption, CoreErrorOrigin::Codec) => ErrorKind::Codec,
            _ => ErrorKind::Internal,
        };

        Self::new(kind, err.origin.into(), err.message)
    }
}

impl From<CompileError> for Error {
    fn from(err: CompileError) -> Self {
        InternalError::from(err).into()
    }
}

impl From<ApplyError> for Error {
    fn from(err: ApplyError) -> Self {
        InternalError::from(err).into()
    }
}

///
/// ErrorKind
/// Public error taxonomy for callers.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ErrorKind {
    Compile(CompileErrorKind),

    /// Predicate or envelope bytes were malformed. Never retried blindly.
    Codec,

    Store(StoreErrorKind),

    /// The caller cannot remediate this.
    Internal,
}

///
/// CompileErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum CompileErrorKind {
    /// The statement or its predicate cannot be compiled against the schema.
    Unsupported,

    /// The statement targets a table that is not registered.
    NotFound,
}

///
/// StoreErrorKind
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum StoreErrorKind {
    Unavailable,
}

///
/// ErrorOrigin
/// Public origin taxonomy for callers.
///

#[derive(Clone, Copy, Debug, Deserialize, Display, Eq, PartialEq, Serialize)]
pub enum ErrorOrigin {
    Serialize,
    Codec,
    Predicate,
    Mutation,
    Executor,
    Store,
    Config,
}

impl From<CoreErrorOrigin> for ErrorOrigin {
    fn from(origin: CoreErrorOrigin) -> Self {
        match origin {
            CoreErrorOrigin::Serialize => Self::Serialize,
            CoreErrorOrigin::Codec => Self::Codec,
            CoreErrorOrigin::Predicate => Self::Predicate,
            CoreErrorOrigin::Mutation => Self::Mutation,
            CoreErrorOrigin::Executor => Self::Executor,
            CoreErrorOrigin::Store => Self::Store,
            CoreErrorOrigin::Config => Self::Config,
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use casdb_core::serialize::{deserialize_bounded, serialize};

    #[test]
    fn unavailable_maps_to_retryable_store_error() {
        let err = Error::from(InternalError::new(
            ErrorClass::Unavailable,
            CoreErrorOrigin::Store,
            "row lock wait exceeded",
        ));

        assert_eq!(err.kind, ErrorKind::Store(StoreErrorKind::Unavailable));
        assert_eq!(err.origin, ErrorOrigin::Store);
        assert!(err.is_retryable());
    }

    #[test]
    fn predicate_rejection_maps_to_compile_error() {
        let err = Error::from(InternalError::new(
            ErrorClass::Unsupported,
            CoreErrorOrigin::Predicate,
            "row key reference not permitted in conditional predicate",
        ));

        assert_eq!(err.kind, ErrorKind::Compile(CompileErrorKind::Unsupported));
        assert!(!err.is_retryable());
        assert_eq!(
            err.to_string(),
            "row key reference not permitted in conditional predicate"
        );
    }

    #[test]
    fn codec_corruption_maps_to_codec_kind() {
        let err = Error::from(InternalError::new(
            ErrorClass::Corruption,
            CoreErrorOrigin::Codec,
            "predicate decode failed: truncated",
        ));

        assert_eq!(err.kind, ErrorKind::Codec);
        assert!(!err.is_retryable());
    }

    #[test]
    fn invariant_violations_are_internal() {
        let err = Error::from(InternalError::new(
            ErrorClass::InvariantViolation,
            CoreErrorOrigin::Executor,
            "predicate evaluation failed",
        ));

        assert_eq!(err.kind, ErrorKind::Internal);
        assert_eq!(err.origin.to_string(), "Executor");
    }

    #[test]
    fn error_crosses_process_boundary() {
        let err = Error::new(
            ErrorKind::Store(StoreErrorKind::Unavailable),
            ErrorOrigin::Store,
            "row lock wait exceeded",
        );

        let bytes = serialize(&err).expect("error should serialize");
        let decoded: Error = deserialize_bounded(&bytes, 1024).expect("error should decode");

        assert_eq!(decoded, err);
        assert!(decoded.is_retryable());
    }
}
