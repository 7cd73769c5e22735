// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use bitvec::prelude::BitVec;

use crate::catalog::ColumnId;
use crate::types::{DataValue, Row};

/// A forward cursor over a set of rows, exposing attributes by id without
/// the caller owning the underlying data.
///
/// The cursor starts before the first row; `next` advances it. Bulk
/// inserts only rely on `next`, `finished`, `position`, `value` and
/// resettable iteration.
pub trait ValueAccessor {
    /// Restart iteration from before the first row.
    fn reset(&mut self);

    /// Advance to the next row. Returns `false` once exhausted.
    fn next(&mut self) -> bool;

    /// Whether no rows remain beyond the current position.
    fn finished(&self) -> bool;

    /// Ordinal of the current row within the underlying data.
    fn position(&self) -> usize;

    /// Total number of rows the accessor iterates over.
    fn num_rows(&self) -> usize;

    /// Read an attribute of the current row.
    fn value(&self, attr_id: ColumnId) -> DataValue;

    /// Read an attribute of an arbitrary row.
    fn value_at(&self, position: usize, attr_id: ColumnId) -> DataValue;
}

/// One source of a multi-accessor bulk insert: an accessor plus the source
/// attribute read for each destination column the accessor feeds.
pub struct AccessorAttrs<'a> {
    pub accessor: &'a mut dyn ValueAccessor,
    pub attribute_ids: Vec<ColumnId>,
}

/// Accessor over a materialised vector of rows.
pub struct RowVectorAccessor {
    rows: Vec<Row>,
    cursor: Option<usize>,
}

impl RowVectorAccessor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows, cursor: None }
    }
}

impl ValueAccessor for RowVectorAccessor {
    fn reset(&mut self) {
        self.cursor = None;
    }

    fn next(&mut self) -> bool {
        let next = self.cursor.map_or(0, |cur| cur + 1);
        if next < self.rows.len() {
            self.cursor = Some(next);
            true
        } else {
            false
        }
    }

    fn finished(&self) -> bool {
        self.cursor.map_or(0, |cur| cur + 1) >= self.rows.len()
    }

    fn position(&self) -> usize {
        self.cursor.expect("accessor cursor is before the first row")
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn value(&self, attr_id: ColumnId) -> DataValue {
        self.value_at(self.position(), attr_id)
    }

    fn value_at(&self, position: usize, attr_id: ColumnId) -> DataValue {
        self.rows[position][attr_id as usize].clone()
    }
}

/// Adapter restricting a base accessor to the positions set in a selection
/// bitmap. Used by partition-aware bulk inserts to drain one partition's
/// membership at a time.
pub struct SelectionAccessor<'a> {
    base: &'a dyn ValueAccessor,
    selection: &'a BitVec,
    cursor: Option<usize>,
}

impl<'a> SelectionAccessor<'a> {
    pub fn new(base: &'a dyn ValueAccessor, selection: &'a BitVec) -> Self {
        debug_assert_eq!(selection.len(), base.num_rows());
        Self {
            base,
            selection,
            cursor: None,
        }
    }

    fn next_selected(&self, from: usize) -> Option<usize> {
        self.selection[from..].first_one().map(|offset| from + offset)
    }
}

impl ValueAccessor for SelectionAccessor<'_> {
    fn reset(&mut self) {
        self.cursor = None;
    }

    fn next(&mut self) -> bool {
        let from = self.cursor.map_or(0, |cur| cur + 1);
        match self.next_selected(from) {
            Some(pos) => {
                self.cursor = Some(pos);
                true
            }
            None => false,
        }
    }

    fn finished(&self) -> bool {
        self.next_selected(self.cursor.map_or(0, |cur| cur + 1))
            .is_none()
    }

    fn position(&self) -> usize {
        self.cursor.expect("accessor cursor is before the first row")
    }

    fn num_rows(&self) -> usize {
        self.selection.count_ones()
    }

    fn value(&self, attr_id: ColumnId) -> DataValue {
        self.base.value_at(self.position(), attr_id)
    }

    fn value_at(&self, position: usize, attr_id: ColumnId) -> DataValue {
        self.base.value_at(position, attr_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        (0..5).map(|i| vec![DataValue::Int32(i)]).collect()
    }

    #[test]
    fn cursor_walk() {
        let mut accessor = RowVectorAccessor::new(rows());
        assert!(!accessor.finished());
        let mut seen = vec![];
        while accessor.next() {
            assert_eq!(accessor.position(), seen.len());
            seen.push(accessor.value(0));
        }
        assert!(accessor.finished());
        assert_eq!(seen.len(), 5);

        accessor.reset();
        assert!(accessor.next());
        assert_eq!(accessor.position(), 0);
    }

    #[test]
    fn empty_accessor_is_finished() {
        let mut accessor = RowVectorAccessor::new(vec![]);
        assert!(accessor.finished());
        assert!(!accessor.next());
    }

    #[test]
    fn selection_skips_unselected() {
        let base = RowVectorAccessor::new(rows());
        let mut selection = BitVec::repeat(false, 5);
        selection.set(1, true);
        selection.set(4, true);

        let mut selected = SelectionAccessor::new(&base, &selection);
        assert!(!selected.finished());
        assert!(selected.next());
        assert_eq!(selected.value(0), DataValue::Int32(1));
        assert!(!selected.finished());
        assert!(selected.next());
        assert_eq!(selected.value(0), DataValue::Int32(4));
        assert!(selected.finished());
        assert!(!selected.next());
        assert_eq!(selected.num_rows(), 2);
    }
}
