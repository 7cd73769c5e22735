// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;

use super::{ColumnCatalog, ColumnId, RelationId};
use crate::storage::BlockLayout;

/// The schema of a relation: an immutable description of its columns and
/// the default layout used for newly created storage blocks.
pub struct RelationSchema {
    id: RelationId,
    name: String,
    /// All columns (ordered) in the relation.
    columns: Vec<ColumnCatalog>,
    /// Mapping from [`ColumnId`] to column index in `columns`.
    column_map: HashMap<ColumnId, usize>,
    default_layout: BlockLayout,
}

impl RelationSchema {
    /// Columns must be ordered by dense attribute id, so that a tuple's
    /// values can be addressed positionally by attribute id.
    pub fn new(
        id: RelationId,
        name: String,
        columns: Vec<ColumnCatalog>,
        default_layout: BlockLayout,
    ) -> RelationSchema {
        for (idx, col) in columns.iter().enumerate() {
            assert_eq!(
                col.id() as usize,
                idx,
                "relation columns must be ordered by dense attribute id"
            );
        }
        let column_map = columns
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.id(), idx))
            .collect();
        RelationSchema {
            id,
            name,
            columns,
            column_map,
            default_layout,
        }
    }

    pub fn id(&self) -> RelationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[ColumnCatalog] {
        &self.columns
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn contains_column(&self, id: ColumnId) -> bool {
        self.column_map.contains_key(&id)
    }

    pub fn column_by_id(&self, id: ColumnId) -> Option<&ColumnCatalog> {
        self.column_map.get(&id).map(|idx| &self.columns[*idx])
    }

    pub fn default_layout(&self) -> BlockLayout {
        self.default_layout
    }
}
