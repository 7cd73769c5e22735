// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use std::backtrace::Backtrace;

use thiserror::Error;

use super::BlockId;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("block {0} not found")]
    BlockNotFound(BlockId),
    #[error("tuple has {actual} attributes, relation expects {expected}")]
    TupleArity { expected: usize, actual: usize },
    #[error("invalid insert destination description: {0}")]
    InvalidDestination(String),
}

/// [`StorageError`] with backtrace.
#[derive(Error)]
#[error("{source:?}\n{backtrace}")]
pub struct TracedStorageError {
    #[from]
    source: StorageError,
    backtrace: Backtrace,
}

impl std::fmt::Debug for TracedStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl TracedStorageError {
    pub fn block_not_found(id: BlockId) -> Self {
        StorageError::BlockNotFound(id).into()
    }

    pub fn tuple_arity(expected: usize, actual: usize) -> Self {
        StorageError::TupleArity { expected, actual }.into()
    }

    pub fn invalid_destination(message: impl ToString) -> Self {
        StorageError::InvalidDestination(message.to_string()).into()
    }

    pub fn kind(&self) -> &StorageError {
        &self.source
    }
}

pub type StorageResult<T> = std::result::Result<T, TracedStorageError>;
