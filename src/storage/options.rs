// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

/// Options for the storage manager.
#[derive(Clone)]
pub struct StorageOptions {
    /// Tuple capacity used for a relation's default block layout.
    pub default_block_capacity: usize,
}

impl StorageOptions {
    pub fn default_for_test() -> Self {
        Self {
            default_block_capacity: 128,
        }
    }
}
