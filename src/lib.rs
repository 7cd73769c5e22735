// Copyright 2025 FlintDB Project Authors. Licensed under Apache-2.0.

#![feature(error_generic_member_access)]

//! The insert destination subsystem of the FlintDB analytical engine.
//!
//! Query operators (scans, joins, aggregations, sorts) stream their output
//! tuples into an [`storage::insert::InsertDestination`], which routes them
//! into storage blocks of the target relation, reuses partially-filled
//! blocks across worker threads, and pipelines every filled block to the
//! scheduler over the [`bus::MessageBus`].

#![deny(unused_must_use)]

pub mod bus;
pub mod catalog;
pub mod storage;
pub mod types;
