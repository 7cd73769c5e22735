// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

// Prost output for `proto/query.proto`. Regenerate with `protoc` +
// `prost-build` after editing the schema.

/// Notifies the scheduler that a storage block has been filled by an
/// insert destination and is ready for downstream consumption.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DataPipelineMessage {
    #[prost(uint64, tag = "1")]
    pub operator_index: u64,
    #[prost(uint64, tag = "2")]
    pub block_id: u64,
    #[prost(uint32, tag = "3")]
    pub relation_id: u32,
    #[prost(uint64, tag = "4")]
    pub query_id: u64,
    #[prost(uint32, tag = "5")]
    pub partition_id: u32,
}

/// Template for newly created blocks. Falls back to the relation's
/// default layout when absent.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BlockLayoutDescription {
    #[prost(uint64, tag = "1")]
    pub tuple_capacity: u64,
}

/// Pre-existing block ids of one partition.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PartitionBlocks {
    #[prost(uint64, repeated, tag = "1")]
    pub block_ids: ::prost::alloc::vec::Vec<u64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PartitionSchemeHeader {
    #[prost(uint32, repeated, tag = "1")]
    pub partition_attribute_ids: ::prost::alloc::vec::Vec<u32>,
    #[prost(uint32, tag = "2")]
    pub num_partitions: u32,
    /// Either empty or exactly `num_partitions` entries.
    #[prost(message, repeated, tag = "3")]
    pub partitions: ::prost::alloc::vec::Vec<PartitionBlocks>,
}

/// Optimiser-produced description of an insert destination, consumed by
/// the executor to reconstruct the concrete strategy.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InsertDestination {
    #[prost(enumeration = "InsertDestinationType", tag = "1")]
    pub insert_destination_type: i32,
    #[prost(uint32, tag = "2")]
    pub relation_id: u32,
    #[prost(message, optional, tag = "3")]
    pub layout: ::core::option::Option<BlockLayoutDescription>,
    /// Pre-existing blocks for the block-pool strategy.
    #[prost(uint64, repeated, tag = "4")]
    pub block_ids: ::prost::alloc::vec::Vec<u64>,
    #[prost(message, optional, tag = "5")]
    pub partition_scheme_header: ::core::option::Option<PartitionSchemeHeader>,
    #[prost(uint64, tag = "6")]
    pub relational_op_index: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum InsertDestinationType {
    AlwaysCreate = 0,
    BlockPool = 1,
    PartitionAware = 2,
}

impl InsertDestinationType {
    /// String value of the enum field names used in the ProtoBuf definition.
    ///
    /// The values are not transformed in any way and thus are considered stable
    /// (if the ProtoBuf definition does not change) and safe for programmatic use.
    pub fn as_str_name(&self) -> &'static str {
        match self {
            Self::AlwaysCreate => "ALWAYS_CREATE",
            Self::BlockPool => "BLOCK_POOL",
            Self::PartitionAware => "PARTITION_AWARE",
        }
    }

    /// Creates an enum from field names used in the ProtoBuf definition.
    pub fn from_str_name(value: &str) -> ::core::option::Option<Self> {
        match value {
            "ALWAYS_CREATE" => Some(Self::AlwaysCreate),
            "BLOCK_POOL" => Some(Self::BlockPool),
            "PARTITION_AWARE" => Some(Self::PartitionAware),
            _ => None,
        }
    }
}
