use crate::value::Value;
use std::fmt;

///
/// ValueTag
///
/// Stable canonical value-variant tag.
/// Doubles as the literal `type` byte of the predicate wire format.
///
/// IMPORTANT:
/// Tag values are part of the wire format and must never be renumbered.
/// New variants are appended.
///

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ValueTag {
    Null = 1,
    Bool = 2,
    Int = 3,
    Uint = 4,
    Float64 = 5,
    Text = 6,
    Blob = 7,
}

impl ValueTag {
    /// Stable wire byte tag for this variant.
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Resolve a wire byte back to its tag.
    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(Self::Null),
            2 => Some(Self::Bool),
            3 => Some(Self::Int),
            4 => Some(Self::Uint),
            5 => Some(Self::Float64),
            6 => Some(Self::Text),
            7 => Some(Self::Blob),
            _ => None,
        }
    }

    /// Stable human-readable value kind label for diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool => "Bool",
            Self::Int => "Int",
            Self::Uint => "Uint",
            Self::Float64 => "Float64",
            Self::Text => "Text",
            Self::Blob => "Blob",
        }
    }

    /// Exact payload width for fixed-size variants; `None` for variable-length ones.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Null => Some(0),
            Self::Bool => Some(1),
            Self::Int | Self::Uint | Self::Float64 => Some(8),
            Self::Text | Self::Blob => None,
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Uint | Self::Float64)
    }
}

impl fmt::Display for ValueTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stable canonical variant tag for a runtime value.
#[must_use]
pub const fn canonical_tag(value: &Value) -> ValueTag {
    match value {
        Value::Null => ValueTag::Null,
        Value::Bool(_) => ValueTag::Bool,
        Value::Int(_) => ValueTag::Int,
        Value::Uint(_) => ValueTag::Uint,
        Value::Float64(_) => ValueTag::Float64,
        Value::Text(_) => ValueTag::Text,
        Value::Blob(_) => ValueTag::Blob,
    }
}
