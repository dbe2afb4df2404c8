use crate::value::{Value, ValueTag};
use std::{collections::BTreeSet, fmt};
use thiserror::Error as ThisError;

///
/// SchemaError
///

#[derive(Debug, Eq, PartialEq, ThisError)]
pub enum SchemaError {
    #[error("table name must not be empty")]
    EmptyTableName,

    #[error("table '{table}' declares no primary key columns")]
    EmptyPrimaryKey { table: String },

    #[error("table '{table}' declares column '{column}' more than once")]
    DuplicateColumn { table: String, column: String },

    #[error("table '{table}' primary key names unknown column '{column}'")]
    UnknownKeyColumn { table: String, column: String },

    #[error("table '{table}' primary key lists column '{column}' more than once")]
    DuplicateKeyColumn { table: String, column: String },
}

///
/// ColumnKind
///
/// Declared storage type of a column.
/// Aligned with the non-null `Value` variants.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ColumnKind {
    Bool,
    Int,
    Uint,
    Float64,
    Text,
    Blob,
}

impl ColumnKind {
    #[must_use]
    pub const fn value_tag(self) -> ValueTag {
        match self {
            Self::Bool => ValueTag::Bool,
            Self::Int => ValueTag::Int,
            Self::Uint => ValueTag::Uint,
            Self::Float64 => ValueTag::Float64,
            Self::Text => ValueTag::Text,
            Self::Blob => ValueTag::Blob,
        }
    }

    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Uint | Self::Float64)
    }

    /// Whether a value may be stored in a column of this kind.
    /// Storage is exact: no numeric widening on write.
    #[must_use]
    pub const fn accepts(self, value: &Value) -> bool {
        value.tag() as u8 == self.value_tag() as u8
    }

    /// Whether a value may be compared against a column of this kind.
    /// Numeric literals of any width compare with numeric columns.
    #[must_use]
    pub const fn compares_with(self, value: &Value) -> bool {
        if self.is_numeric() {
            value.is_numeric()
        } else {
            self.accepts(value)
        }
    }

    /// Whether two column kinds may be compared with each other.
    #[must_use]
    pub const fn compares_with_kind(self, other: Self) -> bool {
        (self.is_numeric() && other.is_numeric()) || self as u8 == other as u8
    }
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.value_tag().label())
    }
}

///
/// ColumnSchema
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSchema {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

///
/// TableSchema
///
/// Column layout of one table plus its ordered primary-key columns.
/// The primary key is what the row identifier is built from and is never
/// readable as a column inside a conditional predicate.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableSchema {
    name: String,
    columns: Vec<ColumnSchema>,
    primary_key: Vec<String>,
}

impl TableSchema {
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnSchema>,
        primary_key: Vec<String>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if name.is_empty() {
            return Err(SchemaError::EmptyTableName);
        }
        if primary_key.is_empty() {
            return Err(SchemaError::EmptyPrimaryKey { table: name });
        }

        let mut seen = BTreeSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    table: name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        let mut seen_key = BTreeSet::new();
        for key in &primary_key {
            if !seen.contains(key.as_str()) {
                return Err(SchemaError::UnknownKeyColumn {
                    table: name.clone(),
                    column: key.clone(),
                });
            }
            if !seen_key.insert(key.as_str()) {
                return Err(SchemaError::DuplicateKeyColumn {
                    table: name.clone(),
                    column: key.clone(),
                });
            }
        }

        Ok(Self {
            name,
            columns,
            primary_key,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    #[must_use]
    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.iter().find(|column| column.name == name)
    }

    #[must_use]
    pub fn is_key_column(&self, name: &str) -> bool {
        self.primary_key.iter().any(|key| key == name)
    }
}

///
/// TESTS
///
