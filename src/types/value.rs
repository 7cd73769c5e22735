// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use ordered_float::OrderedFloat;
use parse_display::Display;
use serde::Serialize;

use super::{DataType, DataTypeKind};

/// A wrapper around floats providing implementations of `Eq`, `Ord`, and `Hash`.
pub type F64 = OrderedFloat<f64>;

/// Primitive SQL value.
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DataValue {
    // NOTE: Null comes first.
    // => NULL is less than any non-NULL values
    #[display("null")]
    Null,
    #[display("{0}")]
    Bool(bool),
    #[display("{0}")]
    Int32(i32),
    #[display("{0}")]
    Int64(i64),
    #[display("{0}")]
    Float64(F64),
    #[display("'{0}'")]
    String(String),
}

/// A materialised tuple: one value per relation attribute, in attribute order.
pub type Row = Vec<DataValue>;

impl DataValue {
    /// Returns `true` if value is null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type of value. `None` means NULL.
    pub fn data_type(&self) -> Option<DataType> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(DataTypeKind::Bool.not_null()),
            Self::Int32(_) => Some(DataTypeKind::Int32.not_null()),
            Self::Int64(_) => Some(DataTypeKind::Int64.not_null()),
            Self::Float64(_) => Some(DataTypeKind::Float64.not_null()),
            Self::String(_) => Some(DataTypeKind::String.not_null()),
        }
    }
}
