// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::RwLock;
use tracing::debug;

use super::{BlockId, BlockLayout, StorageBlock, StorageOptions, StorageResult, TracedStorageError};
use crate::catalog::{RelationId, RelationSchema};

/// Owns all resident storage blocks and hands out writable references.
pub struct StorageManager {
    options: StorageOptions,
    blocks: RwLock<HashMap<BlockId, Arc<StorageBlock>>>,
    next_block_id: AtomicU64,
}

impl StorageManager {
    pub fn new(options: StorageOptions) -> Self {
        Self {
            options,
            blocks: RwLock::new(HashMap::new()),
            next_block_id: AtomicU64::new(0),
        }
    }

    pub fn options(&self) -> &StorageOptions {
        &self.options
    }

    /// Construct a new empty block attached to `relation`, formatted
    /// according to `layout`, and return a writable reference to it.
    pub fn create_block(
        &self,
        relation: &RelationSchema,
        layout: &BlockLayout,
    ) -> StorageResult<MutableBlockReference> {
        let id = self.next_block_id.fetch_add(1, Ordering::SeqCst);
        let block = Arc::new(StorageBlock::new(
            id,
            relation.id(),
            relation.num_columns(),
            *layout,
        ));
        self.blocks.write().insert(id, block.clone());
        debug!(block_id = id, relation_id = relation.id(), "created block");
        Ok(MutableBlockReference::new(block))
    }

    /// Pin an existing block and return a writable reference to it.
    pub fn get_block_mutable(&self, block_id: BlockId) -> StorageResult<MutableBlockReference> {
        let block = self
            .blocks
            .read()
            .get(&block_id)
            .cloned()
            .ok_or_else(|| TracedStorageError::block_not_found(block_id))?;
        Ok(MutableBlockReference::new(block))
    }

    /// Read-only access to a block, for scans.
    pub fn get_block(&self, block_id: BlockId) -> StorageResult<Arc<StorageBlock>> {
        self.blocks
            .read()
            .get(&block_id)
            .cloned()
            .ok_or_else(|| TracedStorageError::block_not_found(block_id))
    }

    /// Ids of all blocks attached to `relation_id`, in id order.
    pub fn relation_blocks(&self, relation_id: RelationId) -> Vec<BlockId> {
        self.blocks
            .read()
            .values()
            .filter(|block| block.relation_id() == relation_id)
            .map(|block| block.id())
            .sorted()
            .collect()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.read().len()
    }
}

/// An owning, reference-counted handle to a block that is resident and
/// writable. Dropping the reference releases the holder's pin.
///
/// Not clonable: a reference is exclusively owned by whichever entity
/// currently holds it (a block pool or a worker), and ownership transfers
/// by move.
pub struct MutableBlockReference {
    block: Arc<StorageBlock>,
}

impl MutableBlockReference {
    fn new(block: Arc<StorageBlock>) -> Self {
        block.pin();
        Self { block }
    }
}

impl Deref for MutableBlockReference {
    type Target = StorageBlock;

    fn deref(&self) -> &StorageBlock {
        &self.block
    }
}

impl Drop for MutableBlockReference {
    fn drop(&mut self) {
        self.block.unpin();
    }
}

impl std::fmt::Debug for MutableBlockReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MutableBlockReference({})", self.block.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ColumnCatalog;
    use crate::storage::StorageError;
    use crate::types::{DataTypeKind, DataValue};

    fn test_relation() -> RelationSchema {
        RelationSchema::new(
            1,
            "t".into(),
            vec![ColumnCatalog::new(0, "v".into(), DataTypeKind::Int32.not_null())],
            BlockLayout::new(4),
        )
    }

    #[test]
    fn create_and_reload_blocks() {
        let manager = StorageManager::new(StorageOptions::default_for_test());
        let relation = test_relation();

        let block = manager
            .create_block(&relation, &relation.default_layout())
            .unwrap();
        assert!(block.insert_tuple(&vec![DataValue::Int32(1)]).unwrap());
        let id = block.id();
        drop(block);

        let reloaded = manager.get_block_mutable(id).unwrap();
        assert_eq!(reloaded.num_tuples(), 1);
        assert_eq!(manager.relation_blocks(1), vec![id]);
        assert_eq!(manager.num_blocks(), 1);
    }

    #[test]
    fn dense_ids_in_creation_order() {
        let manager = StorageManager::new(StorageOptions::default_for_test());
        let relation = test_relation();
        let layout = relation.default_layout();

        let ids: Vec<_> = (0..3)
            .map(|_| manager.create_block(&relation, &layout).unwrap().id())
            .collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn missing_block_is_an_error() {
        let manager = StorageManager::new(StorageOptions::default_for_test());
        let err = manager.get_block_mutable(42).unwrap_err();
        assert!(matches!(err.kind(), StorageError::BlockNotFound(42)));
    }

    #[test]
    fn references_pin_blocks() {
        let manager = StorageManager::new(StorageOptions::default_for_test());
        let relation = test_relation();

        let first = manager
            .create_block(&relation, &relation.default_layout())
            .unwrap();
        let id = first.id();
        let second = manager.get_block_mutable(id).unwrap();
        assert_eq!(first.pin_count(), 2);
        drop(second);
        assert_eq!(first.pin_count(), 1);
        drop(first);
        assert_eq!(manager.get_block(id).unwrap().pin_count(), 0);
    }
}
