// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

//! Insert destinations: strategies for getting blocks to insert tuples
//! into.
//!
//! A destination is instantiated per output of a relational operator in
//! the query plan DAG and lives for the duration of that operator's
//! execution. Worker threads concurrently push tuples through it; the
//! destination packs them into storage blocks and pipelines every filled
//! block to the scheduler as a `DataPipelineMessage`.
//!
//! Callers finalise a destination by draining still-held partial blocks
//! with [`InsertDestination::get_partially_filled_blocks`] and then
//! collecting [`InsertDestination::touched_blocks`]; no inserts may
//! follow either call.

use std::sync::Arc;

use bytes::Bytes;
use prost::Message;
use tracing::debug;

use flintdb_proto::query as proto;

use super::{
    AccessorAttrs, BlockId, BlockLayout, MutableBlockReference, StorageManager, StorageResult,
    TracedStorageError, ValueAccessor,
};
use crate::bus::{ClientId, ClientIdMap, MessageBus, MessageTag, TaggedMessage};
use crate::catalog::{
    ColumnId, PartitionId, PartitionSchemeHeader, RelationSchema, RelationSchemaRef,
};
use crate::types::Row;

pub use self::always_create::AlwaysCreateDestination;
pub use self::block_pool::BlockPoolDestination;
pub use self::partition_aware::PartitionAwareDestination;

mod always_create;
mod block_pool;
mod partition_aware;


/// The insert-side abstraction that owns block-selection policy during a
/// query. All methods may be called concurrently from multiple workers.
pub trait InsertDestination: Send + Sync {
    /// The relation tuples are inserted into.
    fn relation(&self) -> &RelationSchema;

    /// The partitioning attributes, empty for non-partitioned strategies.
    fn partitioning_attributes(&self) -> Vec<ColumnId> {
        Vec::new()
    }

    /// Copy a single tuple into a block of the relation. A block that just
    /// became full is returned full immediately, triggering pipelining.
    fn insert_tuple(&self, tuple: &Row) -> StorageResult<()>;

    /// Like [`insert_tuple`](Self::insert_tuple), but fullness is only
    /// discovered on the next failed append, letting batches coalesce.
    fn insert_tuple_in_batch(&self, tuple: &Row) -> StorageResult<()>;

    /// Stream all remaining tuples of `accessor` into blocks, rotating on
    /// saturation. With `always_mark_full`, even a non-saturated block is
    /// marked full on return.
    fn bulk_insert_tuples(
        &self,
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> StorageResult<()>;

    /// Like [`bulk_insert_tuples`](Self::bulk_insert_tuples), with
    /// destination attribute `i` sourced from accessor attribute
    /// `attribute_map[i]`.
    fn bulk_insert_tuples_with_remapped_attributes(
        &self,
        attribute_map: &[ColumnId],
        accessor: &mut dyn ValueAccessor,
        always_mark_full: bool,
    ) -> StorageResult<()>;

    /// Pull distinct column groups from distinct accessors advanced in
    /// lockstep. Only supported by the block-pool strategy.
    fn bulk_insert_tuples_from_value_accessors(
        &self,
        accessor_attribute_map: &mut [AccessorAttrs<'_>],
        always_mark_full: bool,
    ) -> StorageResult<()>;

    /// Equivalent to [`insert_tuple_in_batch`](Self::insert_tuple_in_batch)
    /// for every tuple of the slice.
    fn insert_tuples_from_vector(&self, tuples: &[Row]) -> StorageResult<()> {
        for tuple in tuples {
            self.insert_tuple_in_batch(tuple)?;
        }
        Ok(())
    }

    /// Set the input partition id, used by the partition-aware strategy
    /// when the partitioning attributes are empty.
    fn set_input_partition_id(&self, _input_partition_id: PartitionId) {}

    /// Drain blocks still held by the destination to the caller, recording
    /// each block's partition id (zero for non-partitioned strategies).
    /// After this call the destination holds no block references; calling
    /// it again yields nothing.
    fn get_partially_filled_blocks(
        &self,
        partial_blocks: &mut Vec<MutableBlockReference>,
        part_ids: &mut Vec<PartitionId>,
    );

    /// All block ids this destination produced: fully-filled blocks first,
    /// then any still-held partial blocks. Only valid once every
    /// handed-out block has been returned; callers drain partial blocks
    /// first and must not insert afterwards.
    fn touched_blocks(&self) -> Vec<BlockId>;
}

impl std::fmt::Debug for dyn InsertDestination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "InsertDestination({:?})", self.relation().name())
    }
}

/// State shared by every destination strategy: the target relation, the
/// layout for new blocks, and the routing information for pipeline
/// notifications.
pub struct DestinationContext {
    relation: RelationSchemaRef,
    layout: BlockLayout,
    storage_manager: Arc<StorageManager>,
    /// Index of the producing relational operator in the query plan DAG.
    relational_op_index: usize,
    query_id: u64,
    scheduler_client_id: ClientId,
    bus: Arc<MessageBus>,
    thread_id_map: Arc<ClientIdMap>,
}

impl DestinationContext {
    /// `layout` falls back to the relation's default when `None`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        relation: RelationSchemaRef,
        layout: Option<BlockLayout>,
        storage_manager: Arc<StorageManager>,
        relational_op_index: usize,
        query_id: u64,
        scheduler_client_id: ClientId,
        bus: Arc<MessageBus>,
        thread_id_map: Arc<ClientIdMap>,
    ) -> Self {
        let layout = layout.unwrap_or_else(|| relation.default_layout());
        Self {
            relation,
            layout,
            storage_manager,
            relational_op_index,
            query_id,
            scheduler_client_id,
            bus,
            thread_id_map,
        }
    }

    fn create_new_block(&self) -> StorageResult<MutableBlockReference> {
        self.storage_manager.create_block(&self.relation, &self.layout)
    }

    /// Pipeline a filled block to the scheduler.
    ///
    /// The sender identity comes from the thread-id map rather than the
    /// insert API: workers register their bus client id once at startup,
    /// so it does not have to be threaded through every insert call.
    fn send_block_filled(&self, block_id: BlockId, partition_id: PartitionId) {
        let message = proto::DataPipelineMessage {
            operator_index: self.relational_op_index as u64,
            block_id,
            relation_id: self.relation.id(),
            query_id: self.query_id,
            partition_id,
        };
        let mut payload = Vec::with_capacity(message.encoded_len() + 4);
        message
            .encode_length_delimited(&mut payload)
            .expect("failed to encode data pipeline message");

        let sender = self.thread_id_map.value();
        debug!(
            block_id,
            partition_id,
            scheduler = self.scheduler_client_id,
            "pipelining filled block to scheduler"
        );
        self.bus
            .send(
                sender,
                self.scheduler_client_id,
                TaggedMessage::new(MessageTag::DataPipeline, Bytes::from(payload)),
            )
            .expect("scheduler unreachable: data pipeline message rejected by the bus");
    }
}

/// The block supply/return seam shared by the insert loops.
///
/// Implementations hand out a writable block, and take it back with a
/// `full` flag; a full return makes the block terminal and pipelines it.
/// The partition-aware strategy implements this per partition, so the
/// loops below never know about partitioning.
trait BlockSource {
    fn get_block_for_insertion(&self) -> StorageResult<MutableBlockReference>;

    /// Release a block after using it for insertion. Must always be
    /// called once per block obtained from
    /// [`get_block_for_insertion`](Self::get_block_for_insertion).
    fn return_block(&self, block: MutableBlockReference, full: bool);

    /// Append one tuple, rotating to a fresh block while the current one
    /// reports no space. With `eager_full_check`, a block that just became
    /// exactly full is returned full right away instead of waiting for a
    /// later append to fail.
    fn insert_tuple_with_rotation(&self, tuple: &Row, eager_full_check: bool) -> StorageResult<()> {
        let mut block = self.get_block_for_insertion()?;
        loop {
            match block.insert_tuple(tuple) {
                Ok(true) => break,
                Ok(false) => {
                    // Out of space: hand the block back full and retry on a
                    // fresh one. The layout guarantees progress, since any
                    // single tuple fits in an empty block.
                    self.return_block(block, true);
                    block = self.get_block_for_insertion()?;
                }
                Err(e) => {
                    self.return_block(block, false);
                    return Err(e);
                }
            }
        }
        let full = eager_full_check && block.is_full();
        self.return_block(block, full);
        Ok(())
    }

    /// Stream the accessor's remaining rows, rotating blocks on
    /// saturation.
    fn bulk_insert_with_rotation(
        &self,
        accessor: &mut dyn ValueAccessor,
        attribute_map: Option<&[ColumnId]>,
        always_mark_full: bool,
    ) -> StorageResult<()> {
        while !accessor.finished() {
            let block = self.get_block_for_insertion()?;
            match attribute_map {
                Some(map) => block.bulk_insert_tuples_remapped(map, accessor),
                None => block.bulk_insert_tuples(accessor),
            };
            self.return_block(block, !accessor.finished() || always_mark_full);
        }
        Ok(())
    }

    /// Lockstep variant of [`bulk_insert_with_rotation`](Self::bulk_insert_with_rotation).
    fn bulk_insert_from_accessors_with_rotation(
        &self,
        groups: &mut [AccessorAttrs<'_>],
        always_mark_full: bool,
    ) -> StorageResult<()> {
        if groups.is_empty() {
            return Ok(());
        }
        while !groups[0].accessor.finished() {
            let block = self.get_block_for_insertion()?;
            block.bulk_insert_tuples_from_accessors(groups);
            let finished = groups[0].accessor.finished();
            self.return_block(block, !finished || always_mark_full);
        }
        Ok(())
    }
}

/// Rebuild a destination from the serialized description produced by the
/// query optimiser. Fails with an invalid-configuration error when the
/// description does not validate against the relation.
pub fn reconstruct_from_proto(
    query_id: u64,
    proto: &proto::InsertDestination,
    relation: RelationSchemaRef,
    storage_manager: Arc<StorageManager>,
    scheduler_client_id: ClientId,
    bus: Arc<MessageBus>,
    thread_id_map: Arc<ClientIdMap>,
) -> StorageResult<Box<dyn InsertDestination>> {
    if !proto_is_valid(proto, &relation) {
        return Err(TracedStorageError::invalid_destination(format!(
            "malformed description for relation {}",
            relation.id()
        )));
    }

    let layout = proto
        .layout
        .as_ref()
        .map(|layout| BlockLayout::new(layout.tuple_capacity as usize));
    let context = DestinationContext::new(
        relation,
        layout,
        storage_manager,
        proto.relational_op_index as usize,
        query_id,
        scheduler_client_id,
        bus,
        thread_id_map,
    );

    // Validation already proved the tag well-formed.
    let destination_type =
        proto::InsertDestinationType::try_from(proto.insert_destination_type).unwrap();
    Ok(match destination_type {
        proto::InsertDestinationType::AlwaysCreate => {
            Box::new(AlwaysCreateDestination::new(context))
        }
        proto::InsertDestinationType::BlockPool => Box::new(
            BlockPoolDestination::with_blocks(context, proto.block_ids.clone()),
        ),
        proto::InsertDestinationType::PartitionAware => {
            let scheme = proto.partition_scheme_header.as_ref().unwrap();
            let header = PartitionSchemeHeader::new(
                scheme.partition_attribute_ids.clone(),
                scheme.num_partitions as usize,
            );
            let partitions = if scheme.partitions.is_empty() {
                None
            } else {
                Some(
                    scheme
                        .partitions
                        .iter()
                        .map(|partition| partition.block_ids.clone())
                        .collect(),
                )
            };
            Box::new(PartitionAwareDestination::new(header, context, partitions))
        }
    })
}

/// Whether a serialized destination description is fully-formed and
/// consistent with `relation`.
pub fn proto_is_valid(proto: &proto::InsertDestination, relation: &RelationSchema) -> bool {
    let Ok(destination_type) =
        proto::InsertDestinationType::try_from(proto.insert_destination_type)
    else {
        return false;
    };
    if proto.relation_id != relation.id() {
        return false;
    }
    if let Some(layout) = &proto.layout {
        if layout.tuple_capacity == 0 {
            return false;
        }
    }
    match destination_type {
        proto::InsertDestinationType::AlwaysCreate => {
            proto.block_ids.is_empty() && proto.partition_scheme_header.is_none()
        }
        proto::InsertDestinationType::BlockPool => proto.partition_scheme_header.is_none(),
        proto::InsertDestinationType::PartitionAware => {
            // Seed blocks travel inside the scheme, per partition.
            if !proto.block_ids.is_empty() {
                return false;
            }
            let Some(scheme) = &proto.partition_scheme_header else {
                return false;
            };
            if scheme.num_partitions == 0 {
                return false;
            }
            if !scheme.partitions.is_empty()
                && scheme.partitions.len() != scheme.num_partitions as usize
            {
                return false;
            }
            scheme
                .partition_attribute_ids
                .iter()
                .all(|&attr| relation.contains_column(attr))
        }
    }
}
