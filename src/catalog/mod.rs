// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

//! Catalog records consumed by the write path: relation schemas, column
//! catalogs and partition scheme headers.

use std::sync::Arc;

pub use self::column::*;
pub use self::partition::*;
pub use self::relation::*;

mod column;
mod partition;
mod relation;

pub type RelationId = u32;
pub type ColumnId = u32;
pub type PartitionId = u32;

pub type RelationSchemaRef = Arc<RelationSchema>;
