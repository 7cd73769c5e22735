// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use std::sync::atomic::{AtomicU32, Ordering};

use bitvec::prelude::BitVec;
use parking_lot::Mutex;

use super::block_pool::BlockPool;
use super::{BlockSource, DestinationContext, InsertDestination};
use crate::catalog::{ColumnId, PartitionId, PartitionSchemeHeader, PartitionValues};
use crate::storage::{
    AccessorAttrs, BlockId, MutableBlockReference, SelectionAccessor, StorageResult, ValueAccessor,
};
use crate::types::Row;

/// Destination replicating the block pool per partition of the relation,
/// routing every tuple to the pool of the partition computed from its
/// partitioning attributes.
///
/// Each partition has its own mutex; a worker holds at most one at a
/// time, so writes to different partitions never serialise on each other.
pub struct PartitionAwareDestination {
    context: DestinationContext,
    partition_scheme_header: PartitionSchemeHeader,
    pools: Vec<Mutex<BlockPool>>,
    /// Partition every tuple is routed to when the partitioning attribute
    /// list is empty, supporting passthrough from an upstream partitioned
    /// scan.
    input_partition_id: AtomicU32,
}

impl PartitionAwareDestination {
    /// `partitions`, when present, seeds each partition's pool with
    /// pre-existing block ids and must have exactly one entry per
    /// partition.
    pub fn new(
        partition_scheme_header: PartitionSchemeHeader,
        context: DestinationContext,
        partitions: Option<Vec<Vec<BlockId>>>,
    ) -> Self {
        let num_partitions = partition_scheme_header.num_partitions();
        let pools = match partitions {
            Some(partitions) => {
                assert_eq!(
                    partitions.len(),
                    num_partitions,
                    "seed block lists must cover every partition"
                );
                partitions
                    .into_iter()
                    .map(|blocks| Mutex::new(BlockPool::with_blocks(blocks)))
                    .collect()
            }
            None => (0..num_partitions)
                .map(|_| Mutex::new(BlockPool::default()))
                .collect(),
        };
        Self {
            context,
            partition_scheme_header,
            pools,
            input_partition_id: AtomicU32::new(0),
        }
    }

    /// Manually add a pre-existing block to a partition's pool.
    /// Call only once per block.
    pub fn add_block_to_pool(&self, block_id: BlockId, part_id: PartitionId) {
        self.pools[part_id as usize].lock().add_available_id(block_id);
    }

    fn pool(&self, part_id: PartitionId) -> PartitionPool<'_> {
        PartitionPool {
            dest: self,
            part_id,
        }
    }

    fn partition_for_tuple(&self, tuple: &Row) -> PartitionId {
        let attrs = self.partition_scheme_header.partition_attribute_ids();
        if attrs.is_empty() {
            return self.input_partition_id.load(Ordering::Relaxed);
        }
        let values: PartitionValues = attrs
            .iter()
            .map(|&attr| tuple[attr as usize].clone())
            .collect();
        let part_id = self.partition_scheme_header.partition_id(&values);
        debug_assert!((part_id as usize) < self.pools.len());
        part_id
    }

    /// Classify every row of the accessor into per-partition membership
    /// bitmaps, so each partition can then be drained sequentially while
    /// holding only its own lock.
    fn partition_membership(
        &self,
        accessor: &mut dyn ValueAccessor,
        attribute_map: Option<&[ColumnId]>,
    ) -> Vec<BitVec> {
        let num_rows = accessor.num_rows();
        let mut membership: Vec<BitVec> = (0..self.pools.len())
            .map(|_| BitVec::repeat(false, num_rows))
            .collect();

        accessor.reset();
        let attrs = self.partition_scheme_header.partition_attribute_ids();
        if attrs.is_empty() {
            let part_id = self.input_partition_id.load(Ordering::Relaxed) as usize;
            while accessor.next() {
                membership[part_id].set(accessor.position(), true);
            }
        } else {
            while accessor.next() {
                let values: PartitionValues = attrs
                    .iter()
                    .map(|&attr| {
                        let source = attribute_map.map_or(attr, |map| map[attr as usize]);
                        accessor.value(source)
                    })
                    .collect();
                let part_id = self.partition_scheme_header.partition_id(&values) as usize;
                membership[part_id].set(accessor.position(), true);
            }
        }
        membership
    }

    fn bulk_insert_partitioned(
        &self,
        accessor: &mut dyn ValueAccessor,
        attribute_map: Option<&[ColumnId]>,
        always_mark_full: bool,
    ) -> StorageResult<()> {
        let membership = self.partition_membership(accessor, attribute_map);
        for (part_id, selection) in membership.iter().enumerate() {
            if selection.not_any() {
                continue;
            }
            let mut selected = SelectionAccessor::new(&*accessor, selection);
            self.pool(part_id as PartitionId).bulk_insert_with_rotation(
                &mut selected,
                attribute_map,
                always_mark_full,
            )?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(super) fn partition_block_counts(&self) -> Vec<usize> {
        self.pools
            .iter()
            .map(|pool| pool.lock().touched().len())
            .collect()
    }
}

/// View of one partition's pool, so the shared insert loops can run
/// against a single partition and stamp its id on pipeline messages.
struct PartitionPool<'a> {
    dest: &'a PartitionAwareDestination,
    part_id: PartitionId,
}

impl BlockSource for PartitionPool<'_> {
    fn get_block_for_insertion(&self) -> StorageResult<MutableBlockReference> {
        self.dest.pools[self.part_id as usize]
            .lock()
            .acquire(&self.dest.context)
    }

    fn return_block(&self, block: MutableBlockReference, full: bool) {
        let filled = self.dest.pools[self.part_id as usize]
            .lock()
            .put_back(block, full);
        if let Some(id) = filled {
            self.dest.context.send_block_filled(id, self.part_id);
        }
    }
}

impl InsertDestination for PartitionAwareDestination {
    fn relation(&self) -> &crate::catalog::RelationSchema {
        &self.context.relation
    }

    fn partitioning_attributes(&self) -> Vec<ColumnId> {
        self.partition_scheme_header
            .partition_attribute_ids()
            .to_vec()
    }

    fn insert_tuple(&self, tuple: &Row) -> StorageResult<()> {
        let part_id = self.partition_for_tuple(tuple);
        self.pool(part_id).insert_tuple_with_rotation(tuple, true)
    }

    fn insert_tuple_in_batch(&self, tuple: &Row) -> StorageResult<()> {
        let part_id = self.partition_for_tuple(tuple);
        self.pool(part_id).insert_tuple_with_rotation(tuple, false)
    }

    fn bulk_insert_tuples(
        &self,
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> StorageResult<()> {
        self.bulk_insert_partitioned(accessor, None, always_mark_full)
    }

    fn bulk_insert_tuples_with_remapped_attributes(
        &self,
        attribute_map: &[ColumnId],
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> StorageResult<()> {
        self.bulk_insert_partitioned(accessor, Some(attribute_map), always_mark_full)
    }

    fn bulk_insert_tuples_from_value_accessors(
        &self,
        _accessor_attribute_map: &mut [AccessorAttrs<'_>],
        _always_mark_full: bool,
    ) -> StorageResult<()> {
        panic!(
            "bulk_insert_tuples_from_value_accessors is not implemented for \
             PartitionAwareDestination"
        );
    }

    fn set_input_partition_id(&self, input_partition_id: PartitionId) {
        debug_assert!((input_partition_id as usize) < self.pools.len());
        self.input_partition_id
            .store(input_partition_id, Ordering::Relaxed);
    }

    fn get_partially_filled_blocks(
        &self,
        partial_blocks: &mut Vec<MutableBlockReference>,
        part_ids: &mut Vec<PartitionId>,
    ) {
        for (part_id, pool) in self.pools.iter().enumerate() {
            let drained = pool.lock().drain_partials();
            for block in drained {
                partial_blocks.push(block);
                part_ids.push(part_id as PartitionId);
            }
        }
    }

    fn touched_blocks(&self) -> Vec<BlockId> {
        // All partitions' done blocks first, then all partial blocks,
        // partitions in ascending order in both passes.
        let mut ids: Vec<BlockId> = Vec::new();
        for pool in &self.pools {
            ids.extend_from_slice(pool.lock().done_ids());
        }
        for pool in &self.pools {
            ids.extend(pool.lock().partial_ids());
        }
        ids
    }
}
