// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use super::{AccessorAttrs, StorageOptions, StorageResult, TracedStorageError, ValueAccessor};
use crate::catalog::{ColumnId, RelationId};
use crate::types::Row;

/// A template describing how a new block is formatted. Currently the only
/// knob is the tuple capacity; a capacity of at least one guarantees that
/// any single tuple fits in a fresh empty block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    tuple_capacity: usize,
}

impl BlockLayout {
    pub fn new(tuple_capacity: usize) -> Self {
        assert!(tuple_capacity >= 1, "a block must hold at least one tuple");
        Self { tuple_capacity }
    }

    /// The layout a relation gets when nothing overrides it.
    pub fn from_storage_options(options: &StorageOptions) -> Self {
        Self::new(options.default_block_capacity)
    }

    pub fn tuple_capacity(&self) -> usize {
        self.tuple_capacity
    }
}

/// A fixed-capacity, relation-attached unit of storage holding a
/// contiguous set of tuples.
///
/// The storage manager owns the block data; writers go through a
/// [`MutableBlockReference`](super::MutableBlockReference), and the
/// insert destinations guarantee a single writer at a time.
pub struct StorageBlock {
    id: super::BlockId,
    relation_id: RelationId,
    num_columns: usize,
    layout: BlockLayout,
    rows: RwLock<Vec<Row>>,
    /// Number of live references pinning this block in memory.
    pins: AtomicUsize,
}

impl StorageBlock {
    pub(super) fn new(
        id: super::BlockId,
        relation_id: RelationId,
        num_columns: usize,
        layout: BlockLayout,
    ) -> Self {
        Self {
            id,
            relation_id,
            num_columns,
            layout,
            rows: RwLock::new(Vec::new()),
            pins: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> super::BlockId {
        self.id
    }

    pub fn relation_id(&self) -> RelationId {
        self.relation_id
    }

    pub fn num_tuples(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_full(&self) -> bool {
        self.num_tuples() >= self.layout.tuple_capacity
    }

    /// Append a single tuple. `Ok(false)` means the block is out of space;
    /// a tuple whose arity does not match the relation is an error.
    pub fn insert_tuple(&self, tuple: &Row) -> StorageResult<bool> {
        if tuple.len() != self.num_columns {
            return Err(TracedStorageError::tuple_arity(self.num_columns, tuple.len()));
        }
        let mut rows = self.rows.write();
        if rows.len() >= self.layout.tuple_capacity {
            return Ok(false);
        }
        rows.push(tuple.clone());
        Ok(true)
    }

    /// Append rows from the accessor's current position until the block is
    /// full or the accessor is exhausted. Returns the number inserted.
    pub fn bulk_insert_tuples(&self, accessor: &mut dyn ValueAccessor) -> usize {
        self.bulk_insert(accessor, None)
    }

    /// Like [`bulk_insert_tuples`](Self::bulk_insert_tuples), but column
    /// `i` of the block is read from accessor attribute `attribute_map[i]`.
    pub fn bulk_insert_tuples_remapped(
        &self,
        attribute_map: &[ColumnId],
        accessor: &mut dyn ValueAccessor,
    ) -> usize {
        assert_eq!(
            attribute_map.len(),
            self.num_columns,
            "attribute map must cover every destination column"
        );
        self.bulk_insert(accessor, Some(attribute_map))
    }

    fn bulk_insert(
        &self,
        accessor: &mut dyn ValueAccessor,
        attribute_map: Option<&[ColumnId]>,
    ) -> usize {
        let mut rows = self.rows.write();
        let mut inserted = 0;
        while rows.len() < self.layout.tuple_capacity && accessor.next() {
            let row = (0..self.num_columns)
                .map(|i| {
                    let attr = attribute_map.map_or(i as ColumnId, |map| map[i]);
                    accessor.value(attr)
                })
                .collect();
            rows.push(row);
            inserted += 1;
        }
        inserted
    }

    /// Append rows built from several accessors advanced in lockstep, each
    /// contributing its listed source attributes to the next destination
    /// columns in order. Returns the number inserted.
    pub fn bulk_insert_tuples_from_accessors(&self, groups: &mut [AccessorAttrs<'_>]) -> usize {
        let total: usize = groups.iter().map(|g| g.attribute_ids.len()).sum();
        assert_eq!(
            total, self.num_columns,
            "accessor attribute groups must cover every destination column"
        );
        let mut rows = self.rows.write();
        let mut inserted = 0;
        while rows.len() < self.layout.tuple_capacity {
            let advanced: Vec<bool> = groups.iter_mut().map(|g| g.accessor.next()).collect();
            if advanced.iter().all(|&stepped| !stepped) {
                break;
            }
            assert!(
                advanced.iter().all(|&stepped| stepped),
                "value accessors advanced out of lockstep"
            );
            let mut row = Vec::with_capacity(self.num_columns);
            for group in groups.iter() {
                for &attr in &group.attribute_ids {
                    row.push(group.accessor.value(attr));
                }
            }
            rows.push(row);
            inserted += 1;
        }
        inserted
    }

    /// Snapshot of the block's tuples, for scans.
    pub fn tuples(&self) -> Vec<Row> {
        self.rows.read().clone()
    }

    pub(super) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::SeqCst);
    }

    pub(super) fn unpin(&self) {
        let previous = self.pins.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "unpinned a block that was not pinned");
    }

    /// Number of live references pinning this block.
    pub fn pin_count(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::RowVectorAccessor;
    use crate::types::DataValue;

    fn block(capacity: usize) -> StorageBlock {
        StorageBlock::new(0, 1, 2, BlockLayout::new(capacity))
    }

    #[test]
    fn default_layout_follows_storage_options() {
        let options = StorageOptions::default_for_test();
        let layout = BlockLayout::from_storage_options(&options);
        assert_eq!(layout.tuple_capacity(), options.default_block_capacity);
    }

    fn tuple(a: i32, b: i64) -> Row {
        vec![DataValue::Int32(a), DataValue::Int64(b)]
    }

    #[test]
    fn insert_until_full() {
        let block = block(2);
        assert!(block.insert_tuple(&tuple(1, 10)).unwrap());
        assert!(!block.is_full());
        assert!(block.insert_tuple(&tuple(2, 20)).unwrap());
        assert!(block.is_full());
        // Out of space, not an error.
        assert!(!block.insert_tuple(&tuple(3, 30)).unwrap());
        assert_eq!(block.num_tuples(), 2);
    }

    #[test]
    fn arity_mismatch_is_an_error() {
        let block = block(2);
        let err = block.insert_tuple(&vec![DataValue::Int32(1)]).unwrap_err();
        assert!(err.to_string().contains("1 attributes"));
    }

    #[test]
    fn bulk_insert_stops_at_capacity() {
        let first = block(3);
        let rows: Vec<Row> = (0..5).map(|i| tuple(i, i as i64)).collect();
        let mut accessor = RowVectorAccessor::new(rows);
        assert_eq!(first.bulk_insert_tuples(&mut accessor), 3);
        assert!(first.is_full());
        assert!(!accessor.finished());
        // The accessor resumes where the previous block saturated.
        let rest = block(3);
        assert_eq!(rest.bulk_insert_tuples(&mut accessor), 2);
        assert!(accessor.finished());
        assert_eq!(rest.tuples()[0], tuple(3, 3));
    }

    #[test]
    fn bulk_insert_remapped_reorders_columns() {
        let block = block(4);
        let rows = vec![vec![DataValue::Int64(10), DataValue::Int32(1)]];
        let mut accessor = RowVectorAccessor::new(rows);
        // Destination column 0 reads accessor attribute 1 and vice versa.
        assert_eq!(block.bulk_insert_tuples_remapped(&[1, 0], &mut accessor), 1);
        assert_eq!(block.tuples()[0], tuple(1, 10));
    }

    #[test]
    fn bulk_insert_from_accessors_in_lockstep() {
        let block = block(4);
        let mut left = RowVectorAccessor::new(vec![
            vec![DataValue::Int32(1)],
            vec![DataValue::Int32(2)],
        ]);
        let mut right = RowVectorAccessor::new(vec![
            vec![DataValue::Int64(10)],
            vec![DataValue::Int64(20)],
        ]);
        let mut groups = [
            AccessorAttrs {
                accessor: &mut left,
                attribute_ids: vec![0],
            },
            AccessorAttrs {
                accessor: &mut right,
                attribute_ids: vec![0],
            },
        ];
        assert_eq!(block.bulk_insert_tuples_from_accessors(&mut groups), 2);
        assert_eq!(block.tuples(), vec![tuple(1, 10), tuple(2, 20)]);
    }
}
