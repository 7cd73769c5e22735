// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use parking_lot::Mutex;
use tracing::trace;

use super::{BlockSource, DestinationContext, InsertDestination};
use crate::catalog::PartitionId;
use crate::storage::{
    AccessorAttrs, BlockId, MutableBlockReference, StorageResult, ValueAccessor,
};
use crate::types::Row;

/// Bookkeeping of one pool of blocks. The destination guards it with a
/// mutex held only around these state transitions, never around tuple
/// copies.
#[derive(Default)]
pub(super) struct BlockPool {
    /// References to blocks which are loaded in memory and not checked
    /// out by a worker.
    available_refs: Vec<MutableBlockReference>,
    /// Pre-existing blocks of the relation that have not been loaded yet.
    available_ids: Vec<BlockId>,
    /// Fully filled blocks, in the order they were declared full.
    done_ids: Vec<BlockId>,
    /// Partial blocks already handed to the finalising caller; they still
    /// count as touched.
    drained_ids: Vec<BlockId>,
}

impl BlockPool {
    pub(super) fn with_blocks(blocks: Vec<BlockId>) -> Self {
        Self {
            available_ids: blocks,
            ..Self::default()
        }
    }

    /// Pop a loaded block, else load the most recently listed id, else
    /// create a fresh block.
    pub(super) fn acquire(
        &mut self,
        context: &DestinationContext,
    ) -> StorageResult<MutableBlockReference> {
        if let Some(block) = self.available_refs.pop() {
            return Ok(block);
        }
        if let Some(id) = self.available_ids.pop() {
            return context.storage_manager.get_block_mutable(id);
        }
        context.create_new_block()
    }

    /// Take a block back. A full block becomes terminal; its id is
    /// returned so the caller can pipeline it after unlocking.
    pub(super) fn put_back(
        &mut self,
        block: MutableBlockReference,
        full: bool,
    ) -> Option<BlockId> {
        if full {
            let id = block.id();
            trace!(block_id = id, "block declared full");
            self.done_ids.push(id);
            drop(block);
            Some(id)
        } else {
            self.available_refs.push(block);
            None
        }
    }

    pub(super) fn add_available_id(&mut self, block_id: BlockId) {
        self.available_ids.push(block_id);
    }

    pub(super) fn drain_partials(&mut self) -> Vec<MutableBlockReference> {
        let refs = std::mem::take(&mut self.available_refs);
        self.drained_ids.extend(refs.iter().map(|block| block.id()));
        refs
    }

    /// Done blocks first, then partial blocks (still held or drained).
    pub(super) fn touched(&self) -> Vec<BlockId> {
        self.done_ids
            .iter()
            .copied()
            .chain(self.partial_ids())
            .collect()
    }

    pub(super) fn done_ids(&self) -> &[BlockId] {
        &self.done_ids
    }

    /// Ids of partial blocks: references still held, plus any already
    /// drained to the finalising caller.
    pub(super) fn partial_ids(&self) -> Vec<BlockId> {
        self.available_refs
            .iter()
            .map(|block| block.id())
            .chain(self.drained_ids.iter().copied())
            .collect()
    }

    #[cfg(test)]
    pub(super) fn sizes(&self) -> (usize, usize, usize) {
        (
            self.available_refs.len(),
            self.available_ids.len(),
            self.done_ids.len(),
        )
    }
}

/// Destination that keeps a pool of partially-full blocks, reusing them
/// across workers and creating new blocks only when no pooled block is
/// free.
pub struct BlockPoolDestination {
    context: DestinationContext,
    pool: Mutex<BlockPool>,
}

impl BlockPoolDestination {
    pub fn new(context: DestinationContext) -> Self {
        Self::with_blocks(context, Vec::new())
    }

    /// Seed the pool with pre-existing blocks of the relation.
    // TODO: replace the LIFO seed order with fill statistics once the
    // catalog tracks per-block occupancy.
    pub fn with_blocks(context: DestinationContext, blocks: Vec<BlockId>) -> Self {
        Self {
            context,
            pool: Mutex::new(BlockPool::with_blocks(blocks)),
        }
    }

    #[cfg(test)]
    pub(super) fn pool_sizes(&self) -> (usize, usize, usize) {
        self.pool.lock().sizes()
    }
}

impl BlockSource for BlockPoolDestination {
    fn get_block_for_insertion(&self) -> StorageResult<MutableBlockReference> {
        self.pool.lock().acquire(&self.context)
    }

    fn return_block(&self, block: MutableBlockReference, full: bool) {
        let filled = self.pool.lock().put_back(block, full);
        // The pipeline message goes out after the pool lock is released.
        if let Some(id) = filled {
            self.context.send_block_filled(id, 0);
        }
    }
}

impl InsertDestination for BlockPoolDestination {
    fn relation(&self) -> &crate::catalog::RelationSchema {
        &self.context.relation
    }

    fn insert_tuple(&self, tuple: &Row) -> StorageResult<()> {
        self.insert_tuple_with_rotation(tuple, true)
    }

    fn insert_tuple_in_batch(&self, tuple: &Row) -> StorageResult<()> {
        self.insert_tuple_with_rotation(tuple, false)
    }

    fn bulk_insert_tuples(
        &self,
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> StorageResult<()> {
        self.bulk_insert_with_rotation(accessor, None, always_mark_full)
    }

    fn bulk_insert_tuples_with_remapped_attributes(
        &self,
        attribute_map: &[crate::catalog::ColumnId],
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> StorageResult<()> {
        self.bulk_insert_with_rotation(accessor, Some(attribute_map), always_mark_full)
    }

    fn bulk_insert_tuples_from_value_accessors(
        &self,
        accessor_attribute_map: &mut [AccessorAttrs<'_>],
        always_mark_full: bool,
    ) -> StorageResult<()> {
        self.bulk_insert_from_accessors_with_rotation(accessor_attribute_map, always_mark_full)
    }

    fn get_partially_filled_blocks(
        &self,
        partial_blocks: &mut Vec<MutableBlockReference>,
        part_ids: &mut Vec<PartitionId>,
    ) {
        let drained = self.pool.lock().drain_partials();
        for block in drained {
            partial_blocks.push(block);
            part_ids.push(0);
        }
    }

    fn touched_blocks(&self) -> Vec<BlockId> {
        self.pool.lock().touched()
    }
}
