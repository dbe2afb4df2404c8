mod predicate;
mod tag;

#[cfg(test)]
mod tests;

use crate::{
    error::InternalError,
    serialize::{SerializeError, deserialize_bounded},
};
use casdb_config::{CodecConfig, DEFAULT_MAX_PREDICATE_BYTES, DEFAULT_MAX_PREDICATE_DEPTH};
use serde::de::DeserializeOwned;

// re-exports
pub use predicate::{
    CodecError, CodecErrorKind, decode, decode_with_limits, encode, encode_value,
};
pub use tag::NodeTag;

///
/// DB Codec
///
/// Binary formats owned by the database layer:
/// - the self-describing predicate wire codec carried by conditional mutations
/// - bounded decode wrappers for mutation envelopes
///
/// Format-agnostic serialization lives in `crate::serialize`.
///

/// Mutation envelopes carry column values in addition to the predicate.
const ENVELOPE_OVERHEAD_FACTOR: usize = 16;

///
/// CodecLimits
///
/// Untrusted-input bounds applied when decoding predicates.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CodecLimits {
    pub max_bytes: usize,
    pub max_depth: usize,
}

impl CodecLimits {
    #[must_use]
    pub const fn new(max_bytes: usize, max_depth: usize) -> Self {
        Self {
            max_bytes,
            max_depth,
        }
    }

    /// Reject a payload length above the byte limit.
    pub const fn admit_len(&self, len: usize) -> Result<(), CodecError> {
        if len > self.max_bytes {
            return Err(CodecError::PayloadTooLarge {
                len,
                max: self.max_bytes,
            });
        }

        Ok(())
    }

    /// Reject a tree nested deeper than the depth limit.
    pub const fn admit_depth(&self, depth: usize) -> Result<(), CodecError> {
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded {
                max: self.max_depth,
            });
        }

        Ok(())
    }

    /// Upper bound on a serialized mutation envelope under these limits.
    #[must_use]
    pub const fn max_envelope_bytes(&self) -> usize {
        self.max_bytes.saturating_mul(ENVELOPE_OVERHEAD_FACTOR)
    }
}

impl Default for CodecLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PREDICATE_BYTES, DEFAULT_MAX_PREDICATE_DEPTH)
    }
}

impl From<&CodecConfig> for CodecLimits {
    fn from(config: &CodecConfig) -> Self {
        Self::new(config.max_predicate_bytes, config.max_predicate_depth)
    }
}

/// Deserialize one mutation envelope using the envelope size policy.
pub(in crate::db) fn deserialize_envelope<T>(
    bytes: &[u8],
    limits: CodecLimits,
) -> Result<T, InternalError>
where
    T: DeserializeOwned,
{
    deserialize_bounded(bytes, limits.max_envelope_bytes())
        .map_err(|source| map_deserialize_error(source, "mutation envelope"))
}

// Convert format-level deserialize errors into DB engine classification.
fn map_deserialize_error(source: SerializeError, payload_label: &'static str) -> InternalError {
    InternalError::codec_corruption(format!("{payload_label} decode failed: {}", source.kind()))
}
