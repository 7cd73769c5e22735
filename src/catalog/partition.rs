// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use super::{ColumnId, PartitionId};
use crate::types::DataValue;

/// Values of the partitioning attributes of one tuple.
pub type PartitionValues = SmallVec<[DataValue; 2]>;

/// Describes how a relation is horizontally partitioned: the ordered list
/// of partitioning attributes and the number of partitions.
///
/// Routing is hash based. Integer values hash to themselves, so a relation
/// partitioned on a single integer attribute places a tuple with value `v`
/// in partition `v mod P`.
#[derive(Debug, Clone)]
pub struct PartitionSchemeHeader {
    partition_attribute_ids: Vec<ColumnId>,
    num_partitions: usize,
}

impl PartitionSchemeHeader {
    pub fn new(partition_attribute_ids: Vec<ColumnId>, num_partitions: usize) -> Self {
        assert!(num_partitions >= 1, "a relation has at least one partition");
        Self {
            partition_attribute_ids,
            num_partitions,
        }
    }

    pub fn partition_attribute_ids(&self) -> &[ColumnId] {
        &self.partition_attribute_ids
    }

    pub fn num_partitions(&self) -> usize {
        self.num_partitions
    }

    /// The partition a tuple with the given partitioning-attribute values
    /// belongs to. Pure: equal values always map to the same partition.
    pub fn partition_id(&self, values: &[DataValue]) -> PartitionId {
        let mut hash = 0u64;
        for value in values {
            hash = hash.wrapping_mul(31).wrapping_add(value_hash(value));
        }
        (hash % self.num_partitions as u64) as PartitionId
    }
}

fn value_hash(value: &DataValue) -> u64 {
    match value {
        DataValue::Null => 0,
        DataValue::Bool(b) => *b as u64,
        DataValue::Int32(v) => *v as i64 as u64,
        DataValue::Int64(v) => *v as u64,
        DataValue::Float64(v) => v.0.to_bits(),
        DataValue::String(s) => {
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            s.hash(&mut hasher);
            hasher.finish()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_values_partition_by_modulo() {
        let header = PartitionSchemeHeader::new(vec![0], 2);
        for id in 0..10 {
            let expected = (id % 2) as PartitionId;
            assert_eq!(header.partition_id(&[DataValue::Int32(id)]), expected);
        }
    }

    #[test]
    fn routing_is_pure() {
        let header = PartitionSchemeHeader::new(vec![0, 1], 16);
        let values = [DataValue::String("ab".into()), DataValue::Int64(-3)];
        let first = header.partition_id(&values);
        for _ in 0..8 {
            assert_eq!(header.partition_id(&values), first);
        }
        assert!((first as usize) < 16);
    }

    #[test]
    #[should_panic(expected = "at least one partition")]
    fn zero_partitions_rejected() {
        PartitionSchemeHeader::new(vec![0], 0);
    }
}
