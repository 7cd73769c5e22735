// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use parking_lot::Mutex;

use super::{BlockSource, DestinationContext, InsertDestination};
use crate::catalog::PartitionId;
use crate::storage::{
    AccessorAttrs, BlockId, MutableBlockReference, StorageResult, ValueAccessor,
};
use crate::types::Row;

/// Destination that always creates new blocks, leaving some of them
/// potentially very underfull. Used where output must be segregated,
/// e.g. when each batch needs its own block.
pub struct AlwaysCreateDestination {
    context: DestinationContext,
    returned_block_ids: Mutex<Vec<BlockId>>,
}

impl AlwaysCreateDestination {
    pub fn new(context: DestinationContext) -> Self {
        Self {
            context,
            returned_block_ids: Mutex::new(Vec::new()),
        }
    }
}

impl BlockSource for AlwaysCreateDestination {
    fn get_block_for_insertion(&self) -> StorageResult<MutableBlockReference> {
        self.context.create_new_block()
    }

    fn return_block(&self, block: MutableBlockReference, _full: bool) {
        // A block that was never written to (the insert failed before
        // touching it) is just released, not recorded or streamed.
        if block.num_tuples() == 0 {
            return;
        }
        let id = block.id();
        self.returned_block_ids.lock().push(id);
        drop(block);
        // Every written block of this strategy is terminal: stream it
        // whether or not it filled up.
        self.context.send_block_filled(id, 0);
    }
}

impl InsertDestination for AlwaysCreateDestination {
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
        _accessor_attribute_map: &mut [AccessorAttrs<'_>],
        _always_mark_full: bool,
    ) -> StorageResult<()> {
        panic!(
            "bulk_insert_tuples_from_value_accessors is not implemented for \
             AlwaysCreateDestination"
        );
    }

    fn get_partially_filled_blocks(
        &self,
        _partial_blocks: &mut Vec<MutableBlockReference>,
        _part_ids: &mut Vec<PartitionId>,
    ) {
        // This strategy never retains block references.
    }

    fn touched_blocks(&self) -> Vec<BlockId> {
        self.returned_block_ids.lock().clone()
    }
}
