use crate::db::predicate::CompareOp;

///
/// NodeTag
///
/// Closed registry of predicate node kinds. The byte value prefixes every
/// node on the wire.
///
/// IMPORTANT:
/// The registry is append-only. Existing bytes are never reassigned or
/// reused; a decoder that meets an unregistered byte rejects the payload.
///

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum NodeTag {
    Literal = 0x01,
    Column = 0x02,
    Equals = 0x03,
    NotEquals = 0x04,
    LessThan = 0x05,
    LessThanOrEqual = 0x06,
    GreaterThan = 0x07,
    GreaterThanOrEqual = 0x08,
    IsNull = 0x09,
    IsNotNull = 0x0a,
    Like = 0x0b,
    And = 0x0c,
    Or = 0x0d,
    Between = 0x0e,
    Not = 0x0f,
}

impl NodeTag {
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::Literal),
            0x02 => Some(Self::Column),
            0x03 => Some(Self::Equals),
            0x04 => Some(Self::NotEquals),
            0x05 => Some(Self::LessThan),
            0x06 => Some(Self::LessThanOrEqual),
            0x07 => Some(Self::GreaterThan),
            0x08 => Some(Self::GreaterThanOrEqual),
            0x09 => Some(Self::IsNull),
            0x0a => Some(Self::IsNotNull),
            0x0b => Some(Self::Like),
            0x0c => Some(Self::And),
            0x0d => Some(Self::Or),
            0x0e => Some(Self::Between),
            0x0f => Some(Self::Not),
            _ => None,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Literal => "Literal",
            Self::Column => "Column",
            Self::Equals => "Equals",
            Self::NotEquals => "NotEquals",
            Self::LessThan => "LessThan",
            Self::LessThanOrEqual => "LessThanOrEqual",
            Self::GreaterThan => "GreaterThan",
            Self::GreaterThanOrEqual => "GreaterThanOrEqual",
            Self::IsNull => "IsNull",
            Self::IsNotNull => "IsNotNull",
            Self::Like => "Like",
            Self::And => "And",
            Self::Or => "Or",
            Self::Between => "Between",
            Self::Not => "Not",
        }
    }

    /// Required child count for fixed-arity composites.
    /// `None` for leaves and for the variadic `And`/`Or`.
    #[must_use]
    pub const fn fixed_arity(self) -> Option<u32> {
        match self {
            Self::Literal | Self::Column | Self::And | Self::Or => None,
            Self::IsNull | Self::IsNotNull | Self::Not => Some(1),
            Self::Equals
            | Self::NotEquals
            | Self::LessThan
            | Self::LessThanOrEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::Like => Some(2),
            Self::Between => Some(3),
        }
    }

    #[must_use]
    pub const fn for_compare(op: CompareOp) -> Self {
        match op {
            CompareOp::Eq => Self::Equals,
            CompareOp::Ne => Self::NotEquals,
            CompareOp::Lt => Self::LessThan,
            CompareOp::Lte => Self::LessThanOrEqual,
            CompareOp::Gt => Self::GreaterThan,
            CompareOp::Gte => Self::GreaterThanOrEqual,
        }
    }
}
