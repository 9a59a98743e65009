// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Common types and utilities for the jac uploader line protocol.
//!
//! Everything here is hardware-free:
//! - `protocol`: command formatting and reply parsing
//! - `chunk`: fixed-size splitting of outgoing messages
//! - `paths`: local tree helpers (hidden check, remote names)
//! - `crc`: the checksum the device reports in directory listings

pub mod chunk;
pub mod crc;
pub mod error;
pub mod paths;
pub mod protocol;

// Re-export commonly used types
pub use chunk::{chunks, ChunkPolicy, PUSH_CHUNKS, SYNC_CHUNKS};
pub use error::ProtocolError;
pub use protocol::{Command, EntryKind, FsEntry, Reply, StorageStats};
