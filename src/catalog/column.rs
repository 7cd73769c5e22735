// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use super::ColumnId;
use crate::types::DataType;

/// The catalog of a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCatalog {
    id: ColumnId,
    name: String,
    datatype: DataType,
}

impl ColumnCatalog {
    pub fn new(id: ColumnId, name: String, datatype: DataType) -> ColumnCatalog {
        ColumnCatalog { id, name, datatype }
    }

    pub fn id(&self) -> ColumnId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn datatype(&self) -> DataType {
        self.datatype
    }

    pub fn is_nullable(&self) -> bool {
        self.datatype.is_nullable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataTypeKind;

    #[test]
    fn test_column_catalog() {
        let col_catalog = ColumnCatalog::new(0, "grade".into(), DataTypeKind::Int32.not_null());
        assert_eq!(col_catalog.id(), 0);
        assert_eq!(col_catalog.name(), "grade");
        assert!(!col_catalog.is_nullable());
        assert_eq!(col_catalog.datatype().kind(), DataTypeKind::Int32);
    }
}
