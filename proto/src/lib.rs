// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

//! Protobuf definitions shared between the FlintDB optimiser, scheduler
//! and execution engine.
//!
//! The message schema lives in `src/proto/query.proto`; the prost output
//! is checked in as [`query`] so that building the workspace does not
//! require `protoc`.

pub mod query;
