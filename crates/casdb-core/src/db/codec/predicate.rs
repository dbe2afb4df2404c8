//! Predicate wire codec.
//!
//! Layout (all integers big-endian, no padding):
//!
//! ```text
//! node      := tag:u8 payload
//! Literal   := type:u8 length:u32 bytes[length]
//! Column    := length:u32 utf8[length]
//! composite := child_count:u32 node[child_count]
//! ```
//!
//! Every non-leaf node uses the composite payload. Structurally equal trees
//! encode to identical bytes.

use crate::{
    db::{
        codec::{CodecLimits, NodeTag},
        predicate::{CompareOp, Expr},
    },
    error::InternalError,
    value::{Float64, Value, ValueTag},
};
use std::fmt;
use thiserror::Error as ThisError;

///
/// CodecError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum CodecError {
    #[error("predicate payload is empty")]
    Empty,

    #[error("predicate payload too large: {len} bytes (limit {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("predicate nesting exceeds depth limit {max}")]
    DepthExceeded { max: usize },

    #[error("unknown predicate node tag 0x{tag:02x} at offset {offset}")]
    UnknownPredicateNode { tag: u8, offset: usize },

    #[error("unknown literal type 0x{type_byte:02x} at offset {offset}")]
    UnknownLiteralType { type_byte: u8, offset: usize },

    #[error("predicate truncated at offset {offset}: {needed} more bytes required")]
    Truncated { offset: usize, needed: usize },

    #[error("{remaining} trailing bytes after predicate at offset {offset}")]
    TrailingBytes { offset: usize, remaining: usize },

    #[error("{node} node expects {expected} children, found {found}")]
    ArityMismatch {
        node: &'static str,
        expected: u32,
        found: u32,
    },

    #[error("{ty} literal must be {expected} bytes, found {found}")]
    LiteralLength {
        ty: ValueTag,
        expected: usize,
        found: usize,
    },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: usize },

    #[error("invalid Bool literal byte 0x{byte:02x} at offset {offset}")]
    InvalidBool { byte: u8, offset: usize },

    #[error("non-finite Float64 literal at offset {offset}")]
    NonFiniteFloat { offset: usize },

    #[error("length {len} does not fit the u32 length prefix")]
    LengthOverflow { len: usize },
}

///
/// CodecErrorKind
///
/// Stable error-kind taxonomy for codec failures.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CodecErrorKind {
    Empty,
    PayloadTooLarge,
    DepthExceeded,
    UnknownPredicateNode,
    UnknownLiteralType,
    Truncated,
    TrailingBytes,
    ArityMismatch,
    LiteralLength,
    InvalidUtf8,
    InvalidBool,
    NonFiniteFloat,
    LengthOverflow,
}

impl CodecErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::PayloadTooLarge => "payload_too_large",
            Self::DepthExceeded => "depth_exceeded",
            Self::UnknownPredicateNode => "unknown_predicate_node",
            Self::UnknownLiteralType => "unknown_literal_type",
            Self::Truncated => "truncated",
            Self::TrailingBytes => "trailing_bytes",
            Self::ArityMismatch => "arity_mismatch",
            Self::LiteralLength => "literal_length",
            Self::InvalidUtf8 => "invalid_utf8",
            Self::InvalidBool => "invalid_bool",
            Self::NonFiniteFloat => "non_finite_float",
            Self::LengthOverflow => "length_overflow",
        }
    }
}

impl fmt::Display for CodecErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CodecError {
    /// Return a stable error kind independent of message text.
    #[must_use]
    pub const fn kind(&self) -> CodecErrorKind {
        match self {
            Self::Empty => CodecErrorKind::Empty,
            Self::PayloadTooLarge { .. } => CodecErrorKind::PayloadTooLarge,
            Self::DepthExceeded { .. } => CodecErrorKind::DepthExceeded,
            Self::UnknownPredicateNode { .. } => CodecErrorKind::UnknownPredicateNode,
            Self::UnknownLiteralType { .. } => CodecErrorKind::UnknownLiteralType,
            Self::Truncated { .. } => CodecErrorKind::Truncated,
            Self::TrailingBytes { .. } => CodecErrorKind::TrailingBytes,
            Self::ArityMismatch { .. } => CodecErrorKind::ArityMismatch,
            Self::LiteralLength { .. } => CodecErrorKind::LiteralLength,
            Self::InvalidUtf8 { .. } => CodecErrorKind::InvalidUtf8,
            Self::InvalidBool { .. } => CodecErrorKind::InvalidBool,
            Self::NonFiniteFloat { .. } => CodecErrorKind::NonFiniteFloat,
            Self::LengthOverflow { .. } => CodecErrorKind::LengthOverflow,
        }
    }
}

impl From<CodecError> for InternalError {
    fn from(err: CodecError) -> Self {
        Self::codec_corruption(format!("predicate decode failed: {}", err.kind()))
    }
}

// ---------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------

/// Encode a predicate tree into its wire form.
pub fn encode(expr: &Expr) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    write_node(&mut out, expr)?;

    Ok(out)
}

/// Append one literal payload (`type`, `length`, `bytes`) without a node tag.
pub fn encode_value(out: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    out.push(value.tag().to_u8());

    match value {
        Value::Null => write_len(out, 0),
        Value::Bool(v) => write_bytes(out, &[u8::from(*v)]),
        Value::Int(v) => write_bytes(out, &v.to_be_bytes()),
        Value::Uint(v) => write_bytes(out, &v.to_be_bytes()),
        Value::Float64(v) => write_bytes(out, &v.to_bits().to_be_bytes()),
        Value::Text(v) => write_bytes(out, v.as_bytes()),
        Value::Blob(v) => write_bytes(out, v),
    }
}

fn write_node(out: &mut Vec<u8>, expr: &Expr) -> Result<(), CodecError> {
    match expr {
        Expr::Literal(value) => {
            out.push(NodeTag::Literal.to_u8());
            encode_value(out, value)
        }
        Expr::Column(name) => {
            out.push(NodeTag::Column.to_u8());
            write_bytes(out, name.as_bytes())
        }
        Expr::Compare { op, left, right } => {
            write_composite(out, NodeTag::for_compare(*op), [&**left, &**right])
        }
        Expr::IsNull(inner) => write_composite(out, NodeTag::IsNull, [&**inner]),
        Expr::IsNotNull(inner) => write_composite(out, NodeTag::IsNotNull, [&**inner]),
        Expr::Like { operand, pattern } => {
            write_composite(out, NodeTag::Like, [&**operand, &**pattern])
        }
        Expr::Between {
            target,
            lower,
            upper,
        } => write_composite(out, NodeTag::Between, [&**target, &**lower, &**upper]),
        Expr::And(children) => write_composite(out, NodeTag::And, children),
        Expr::Or(children) => write_composite(out, NodeTag::Or, children),
        Expr::Not(inner) => write_composite(out, NodeTag::Not, [&**inner]),
    }
}

fn write_composite<'a, I>(out: &mut Vec<u8>, tag: NodeTag, children: I) -> Result<(), CodecError>
where
    I: IntoIterator<Item = &'a Expr>,
    I::IntoIter: ExactSizeIterator,
{
    let children = children.into_iter();
    out.push(tag.to_u8());
    write_len(out, children.len())?;

    for child in children {
        write_node(out, child)?;
    }

    Ok(())
}

fn write_bytes(out: &mut Vec<u8>, bytes: &[u8]) -> Result<(), CodecError> {
    write_len(out, bytes.len())?;
    out.extend_from_slice(bytes);

    Ok(())
}

fn write_len(out: &mut Vec<u8>, len: usize) -> Result<(), CodecError> {
    let len = u32::try_from(len).map_err(|_| CodecError::LengthOverflow { len })?;
    out.extend_from_slice(&len.to_be_bytes());

    Ok(())
}

// ---------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------

/// Decode a predicate tree using the default limits.
pub fn decode(bytes: &[u8]) -> Result<Expr, CodecError> {
    decode_with_limits(bytes, CodecLimits::default())
}

/// Decode a predicate tree from untrusted input.
///
/// The whole buffer must be consumed by exactly one root node. Decoding
/// allocates only a fresh tree; no caller state is touched on failure.
pub fn decode_with_limits(bytes: &[u8], limits: CodecLimits) -> Result<Expr, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    limits.admit_len(bytes.len())?;

    let mut decoder = Decoder {
        bytes,
        pos: 0,
        max_depth: limits.max_depth,
    };
    let expr = decoder.node(1)?;

    let remaining = bytes.len() - decoder.pos;
    if remaining > 0 {
        return Err(CodecError::TrailingBytes {
            offset: decoder.pos,
            remaining,
        });
    }

    Ok(expr)
}

///
/// Decoder
///

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
    max_depth: usize,
}

impl<'a> Decoder<'a> {
    const fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: len - self.remaining(),
            });
        }

        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;

        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4)?);

        Ok(u32::from_be_bytes(buf))
    }

    fn len_prefixed(&mut self) -> Result<(usize, &'a [u8]), CodecError> {
        let len = self.u32()? as usize;
        let offset = self.pos;

        Ok((offset, self.take(len)?))
    }

    fn node(&mut self, depth: usize) -> Result<Expr, CodecError> {
        if depth > self.max_depth {
            return Err(CodecError::DepthExceeded {
                max: self.max_depth,
            });
        }

        let offset = self.pos;
        let byte = self.u8()?;
        let tag = NodeTag::from_u8(byte)
            .ok_or(CodecError::UnknownPredicateNode { tag: byte, offset })?;

        match tag {
            NodeTag::Literal => self.literal().map(Expr::Literal),
            NodeTag::Column => {
                let (offset, bytes) = self.len_prefixed()?;
                let name = std::str::from_utf8(bytes)
                    .map_err(|_| CodecError::InvalidUtf8 { offset })?;

                Ok(Expr::Column(name.to_string()))
            }
            NodeTag::Equals => self.compare(CompareOp::Eq, tag, depth),
            NodeTag::NotEquals => self.compare(CompareOp::Ne, tag, depth),
            NodeTag::LessThan => self.compare(CompareOp::Lt, tag, depth),
            NodeTag::LessThanOrEqual => self.compare(CompareOp::Lte, tag, depth),
            NodeTag::GreaterThan => self.compare(CompareOp::Gt, tag, depth),
            NodeTag::GreaterThanOrEqual => self.compare(CompareOp::Gte, tag, depth),
            NodeTag::IsNull => {
                let [inner] = self.fixed(tag, depth)?;
                Ok(Expr::IsNull(Box::new(inner)))
            }
            NodeTag::IsNotNull => {
                let [inner] = self.fixed(tag, depth)?;
                Ok(Expr::IsNotNull(Box::new(inner)))
            }
            NodeTag::Not => {
                let [inner] = self.fixed(tag, depth)?;
                Ok(Expr::Not(Box::new(inner)))
            }
            NodeTag::Like => {
                let [operand, pattern] = self.fixed(tag, depth)?;
                Ok(operand.like(pattern))
            }
            NodeTag::Between => {
                let [target, lower, upper] = self.fixed(tag, depth)?;
                Ok(target.between(lower, upper))
            }
            NodeTag::And => Ok(Expr::And(self.children(tag, depth)?)),
            NodeTag::Or => Ok(Expr::Or(self.children(tag, depth)?)),
        }
    }

    fn compare(&mut self, op: CompareOp, tag: NodeTag, depth: usize) -> Result<Expr, CodecError> {
        let [left, right] = self.fixed(tag, depth)?;

        Ok(Expr::compare(op, left, right))
    }

    fn fixed<const N: usize>(
        &mut self,
        tag: NodeTag,
        depth: usize,
    ) -> Result<[Expr; N], CodecError> {
        let children = self.children(tag, depth)?;
        let found = children.len();

        children
            .try_into()
            .map_err(|_| CodecError::ArityMismatch {
                node: tag.label(),
                expected: tag.fixed_arity().unwrap_or_default(),
                found: u32::try_from(found).unwrap_or(u32::MAX),
            })
    }

    fn children(&mut self, tag: NodeTag, depth: usize) -> Result<Vec<Expr>, CodecError> {
        let count = self.u32()?;
        if let Some(expected) = tag.fixed_arity()
            && expected != count
        {
            return Err(CodecError::ArityMismatch {
                node: tag.label(),
                expected,
                found: count,
            });
        }

        // every child needs at least its tag byte
        let count = count as usize;
        if count > self.remaining() {
            return Err(CodecError::Truncated {
                offset: self.pos,
                needed: count - self.remaining(),
            });
        }

        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            children.push(self.node(depth + 1)?);
        }

        Ok(children)
    }

    fn literal(&mut self) -> Result<Value, CodecError> {
        let offset = self.pos;
        let type_byte = self.u8()?;
        let ty = ValueTag::from_u8(type_byte)
            .ok_or(CodecError::UnknownLiteralType { type_byte, offset })?;

        let (offset, bytes) = self.len_prefixed()?;
        if let Some(expected) = ty.fixed_width()
            && bytes.len() != expected
        {
            return Err(CodecError::LiteralLength {
                ty,
                expected,
                found: bytes.len(),
            });
        }

        let value = match ty {
            ValueTag::Null => Value::Null,
            ValueTag::Bool => match bytes[0] {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                byte => return Err(CodecError::InvalidBool { byte, offset }),
            },
            ValueTag::Int => Value::Int(i64::from_be_bytes(fixed8(bytes))),
            ValueTag::Uint => Value::Uint(u64::from_be_bytes(fixed8(bytes))),
            ValueTag::Float64 => {
                let raw = f64::from_bits(u64::from_be_bytes(fixed8(bytes)));
                Float64::try_new(raw)
                    .map(Value::Float64)
                    .ok_or(CodecError::NonFiniteFloat { offset })?
            }
            ValueTag::Text => Value::Text(
                std::str::from_utf8(bytes)
                    .map_err(|_| CodecError::InvalidUtf8 { offset })?
                    .to_string(),
            ),
            ValueTag::Blob => Value::Blob(bytes.to_vec()),
        };

        Ok(value)
    }
}

// Length was checked against `fixed_width` by the caller.
fn fixed8(bytes: &[u8]) -> [u8; 8] {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(bytes);
    buf
}
