mod compile;


use crate::{
    db::{
        codec::{self, CodecError, CodecLimits},
        predicate::Expr,
    },
    error::InternalError,
    serialize::serialize,
    value::Value,
};
use derive_more::{Deref, From};
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::{collections::BTreeMap, fmt};

// re-exports
pub use compile::{CompileError, UpsertStatement, compile_upsert, compile_upsert_with_limits};

///
/// RowKey
///
/// Opaque row identifier. Compiled upserts build it from the primary-key
/// values in key order, each written as a literal payload of the predicate
/// wire format so the encoding is canonical and unambiguous.
///

#[derive(
    Clone, Debug, Deref, Deserialize, Eq, From, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct RowKey(#[serde(with = "serde_bytes")] Vec<u8>);

impl RowKey {
    /// Build the canonical key for a list of primary-key values.
    pub fn from_key_values<'a>(
        values: impl IntoIterator<Item = &'a Value>,
    ) -> Result<Self, CodecError> {
        let mut bytes = Vec::new();
        for value in values {
            codec::encode_value(&mut bytes, value)?;
        }

        Ok(Self(bytes))
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

///
/// EncodedPredicate
///
/// Wire bytes of a predicate tree. Always well-formed: instances are only
/// built by encoding a tree or by validating untrusted bytes, and each one
/// remembers the codec limits it was admitted under so it decodes again
/// under the same limits.
///

#[derive(Clone, Debug)]
pub struct EncodedPredicate {
    bytes: Vec<u8>,
    limits: CodecLimits,
}

impl EncodedPredicate {
    pub fn from_expr(expr: &Expr) -> Result<Self, CodecError> {
        Self::from_expr_with_limits(expr, CodecLimits::default())
    }

    /// Encode `expr`, rejecting trees the limits would refuse to decode.
    pub fn from_expr_with_limits(expr: &Expr, limits: CodecLimits) -> Result<Self, CodecError> {
        limits.admit_depth(expr.depth())?;
        let bytes = codec::encode(expr)?;
        limits.admit_len(bytes.len())?;

        Ok(Self { bytes, limits })
    }

    /// Accept untrusted bytes after checking they decode under default limits.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        Self::from_bytes_with_limits(bytes, CodecLimits::default())
    }

    pub fn from_bytes_with_limits(
        bytes: Vec<u8>,
        limits: CodecLimits,
    ) -> Result<Self, CodecError> {
        codec::decode_with_limits(&bytes, limits)?;

        Ok(Self { bytes, limits })
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub const fn limits(&self) -> CodecLimits {
        self.limits
    }

    /// Decode a fresh, independently owned tree.
    pub fn decode(&self) -> Result<Expr, CodecError> {
        codec::decode_with_limits(&self.bytes, self.limits)
    }

    pub fn decode_with_limits(&self, limits: CodecLimits) -> Result<Expr, CodecError> {
        codec::decode_with_limits(&self.bytes, limits)
    }

    /// SHA-256 over the canonical bytes. Structurally equal predicates
    /// share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> [u8; 32] {
        Sha256::digest(&self.bytes).into()
    }
}

impl PartialEq for EncodedPredicate {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for EncodedPredicate {}

impl Serialize for EncodedPredicate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serde_bytes::serialize(&self.bytes, serializer)
    }
}

///
/// Condition
///
/// Guard attached to a mutation, kept apart from the column payload.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum Condition {
    Unconditional,
    Conditional(EncodedPredicate),
}

///
/// Mutation
///
/// Column writes for one row plus an optional predicate over that row's
/// current state. The predicate is encoded at construction; later edits to
/// any in-memory tree the caller kept do not reach the mutation.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Mutation {
    table: String,
    row_key: RowKey,
    values: BTreeMap<String, Value>,
    condition: Condition,
}

impl Mutation {
    #[must_use]
    pub fn unconditional(
        table: impl Into<String>,
        row_key: RowKey,
        values: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            table: table.into(),
            row_key,
            values,
            condition: Condition::Unconditional,
        }
    }

    /// Build a conditional mutation, encoding `predicate` immediately.
    pub fn conditional(
        table: impl Into<String>,
        row_key: RowKey,
        values: BTreeMap<String, Value>,
        predicate: Expr,
    ) -> Result<Self, CodecError> {
        Self::conditional_with_limits(table, row_key, values, predicate, CodecLimits::default())
    }

    pub fn conditional_with_limits(
        table: impl Into<String>,
        row_key: RowKey,
        values: BTreeMap<String, Value>,
        predicate: Expr,
        limits: CodecLimits,
    ) -> Result<Self, CodecError> {
        let encoded = EncodedPredicate::from_expr_with_limits(&predicate, limits)?;

        Ok(Self {
            table: table.into(),
            row_key,
            values,
            condition: Condition::Conditional(encoded),
        })
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub const fn row_key(&self) -> &RowKey {
        &self.row_key
    }

    #[must_use]
    pub const fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    #[must_use]
    pub const fn condition(&self) -> &Condition {
        &self.condition
    }

    #[must_use]
    pub const fn is_conditional(&self) -> bool {
        matches!(self.condition, Condition::Conditional(_))
    }

    #[must_use]
    pub const fn encoded_predicate(&self) -> Option<&EncodedPredicate> {
        match &self.condition {
            Condition::Unconditional => None,
            Condition::Conditional(encoded) => Some(encoded),
        }
    }

    /// Decode the guarding predicate, if any, under the limits it was
    /// admitted with.
    pub fn predicate(&self) -> Result<Option<Expr>, CodecError> {
        self.encoded_predicate()
            .map(EncodedPredicate::decode)
            .transpose()
    }

    /// Serialize the mutation envelope for transport to the apply site.
    pub fn to_bytes(&self) -> Result<Vec<u8>, InternalError> {
        Ok(serialize(self)?)
    }

    /// Deserialize a mutation envelope received from another process.
    ///
    /// The carried predicate is checked against `limits`, the same limits a
    /// session compiles under.
    pub fn from_bytes(bytes: &[u8], limits: CodecLimits) -> Result<Self, InternalError> {
        let envelope: MutationEnvelope = codec::deserialize_envelope(bytes, limits)?;
        let condition = match envelope.condition {
            ConditionEnvelope::Unconditional => Condition::Unconditional,
            ConditionEnvelope::Conditional(bytes) => {
                Condition::Conditional(EncodedPredicate::from_bytes_with_limits(bytes, limits)?)
            }
        };

        Ok(Self {
            table: envelope.table,
            row_key: envelope.row_key,
            values: envelope.values,
            condition,
        })
    }
}

// Inbound shape of a serialized `Mutation`; predicate bytes stay raw until
// the caller's limits are known.
#[derive(Deserialize)]
struct MutationEnvelope {
    table: String,
    row_key: RowKey,
    values: BTreeMap<String, Value>,
    condition: ConditionEnvelope,
}

#[derive(Deserialize)]
enum ConditionEnvelope {
    Unconditional,
    Conditional(#[serde(with = "serde_bytes")] Vec<u8>),
}
