use crate::value::Value;
use std::{
    fmt,
    ops::{BitAnd, BitOr, Not},
};

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        }
    }

    /// Whether the operator needs an ordering rather than just equality.
    #[must_use]
    pub const fn is_ordering(self) -> bool {
        matches!(self, Self::Lt | Self::Lte | Self::Gt | Self::Gte)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

///
/// Expr
///
/// Immutable predicate tree over column references and literals.
/// `Between` is accepted from the statement compiler but never survives
/// normalization; everything downstream of `normalize` sees only the
/// primitive comparison set.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(String),
    Compare {
        op: CompareOp,
        left: Box<Self>,
        right: Box<Self>,
    },
    IsNull(Box<Self>),
    IsNotNull(Box<Self>),
    Like {
        operand: Box<Self>,
        pattern: Box<Self>,
    },
    Between {
        target: Box<Self>,
        lower: Box<Self>,
        upper: Box<Self>,
    },
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl Expr {
    #[must_use]
    pub fn col(name: impl Into<String>) -> Self {
        Self::Column(name.into())
    }

    #[must_use]
    pub fn lit(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    #[must_use]
    pub fn compare(op: CompareOp, left: impl Into<Self>, right: impl Into<Self>) -> Self {
        Self::Compare {
            op,
            left: Box::new(left.into()),
            right: Box::new(right.into()),
        }
    }

    #[must_use]
    pub fn eq(self, right: impl Into<Self>) -> Self {
        Self::compare(CompareOp::Eq, self, right)
    }

    #[must_use]
    pub fn ne(self, right: impl Into<Self>) -> Self {
        Self::compare(CompareOp::Ne, self, right)
    }

    #[must_use]
    pub fn lt(self, right: impl Into<Self>) -> Self {
        Self::compare(CompareOp::Lt, self, right)
    }

    #[must_use]
    pub fn lte(self, right: impl Into<Self>) -> Self {
        Self::compare(CompareOp::Lte, self, right)
    }

    #[must_use]
    pub fn gt(self, right: impl Into<Self>) -> Self {
        Self::compare(CompareOp::Gt, self, right)
    }

    #[must_use]
    pub fn gte(self, right: impl Into<Self>) -> Self {
        Self::compare(CompareOp::Gte, self, right)
    }

    #[must_use]
    pub fn is_null(self) -> Self {
        Self::IsNull(Box::new(self))
    }

    #[must_use]
    pub fn is_not_null(self) -> Self {
        Self::IsNotNull(Box::new(self))
    }

    #[must_use]
    pub fn like(self, pattern: impl Into<Self>) -> Self {
        Self::Like {
            operand: Box::new(self),
            pattern: Box::new(pattern.into()),
        }
    }

    #[must_use]
    pub fn between(self, lower: impl Into<Self>, upper: impl Into<Self>) -> Self {
        Self::Between {
            target: Box::new(self),
            lower: Box::new(lower.into()),
            upper: Box::new(upper.into()),
        }
    }

    #[must_use]
    pub fn and(children: impl IntoIterator<Item = Self>) -> Self {
        Self::And(children.into_iter().collect())
    }

    #[must_use]
    pub fn or(children: impl IntoIterator<Item = Self>) -> Self {
        Self::Or(children.into_iter().collect())
    }

    /// Nesting depth of the tree; a leaf has depth 1.
    #[must_use]
    pub fn depth(&self) -> usize {
        let children = match self {
            Self::Literal(_) | Self::Column(_) => return 1,
            Self::Compare { left, right, .. } => left.depth().max(right.depth()),
            Self::IsNull(inner) | Self::IsNotNull(inner) | Self::Not(inner) => inner.depth(),
            Self::Like { operand, pattern } => operand.depth().max(pattern.depth()),
            Self::Between {
                target,
                lower,
                upper,
            } => target.depth().max(lower.depth()).max(upper.depth()),
            Self::And(children) | Self::Or(children) => {
                children.iter().map(Self::depth).max().unwrap_or(0)
            }
        };

        children + 1
    }

    /// Whether any `Between` node remains in the tree.
    #[must_use]
    pub fn contains_between(&self) -> bool {
        match self {
            Self::Literal(_) | Self::Column(_) => false,
            Self::Between { .. } => true,
            Self::Compare { left, right, .. } => left.contains_between() || right.contains_between(),
            Self::IsNull(inner) | Self::IsNotNull(inner) | Self::Not(inner) => {
                inner.contains_between()
            }
            Self::Like { operand, pattern } => {
                operand.contains_between() || pattern.contains_between()
            }
            Self::And(children) | Self::Or(children) => children.iter().any(Self::contains_between),
        }
    }
}

impl From<Value> for Expr {
    fn from(value: Value) -> Self {
        Self::Literal(value)
    }
}

impl BitAnd for Expr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        match self {
            Self::And(mut children) => {
                children.push(rhs);
                Self::And(children)
            }
            lhs => Self::And(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Expr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        match self {
            Self::Or(mut children) => {
                children.push(rhs);
                Self::Or(children)
            }
            lhs => Self::Or(vec![lhs, rhs]),
        }
    }
}

impl Not for Expr {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Column(name) => f.write_str(name),
            Self::Compare { op, left, right } => write!(f, "{left} {op} {right}"),
            Self::IsNull(inner) => write!(f, "{inner} IS NULL"),
            Self::IsNotNull(inner) => write!(f, "{inner} IS NOT NULL"),
            Self::Like { operand, pattern } => write!(f, "{operand} LIKE {pattern}"),
            Self::Between {
                target,
                lower,
                upper,
            } => write!(f, "{target} BETWEEN {lower} AND {upper}"),
            Self::And(children) => write_joined(f, children, " AND ", "TRUE"),
            Self::Or(children) => write_joined(f, children, " OR ", "FALSE"),
            Self::Not(inner) => write!(f, "NOT ({inner})"),
        }
    }
}

fn write_joined(
    f: &mut fmt::Formatter<'_>,
    children: &[Expr],
    separator: &str,
    empty: &str,
) -> fmt::Result {
    if children.is_empty() {
        return f.write_str(empty);
    }

    f.write_str("(")?;
    for (idx, child) in children.iter().enumerate() {
        if idx > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{child}")?;
    }
    f.write_str(")")
}
