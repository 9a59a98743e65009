// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Splitting of outgoing messages into paced chunks.
//!
//! The uploader has no flow control, so long PUSH lines are written in
//! fixed-size pieces with a pause after each one.

use core::time::Duration;

use crate::error::ProtocolError;

/// Chunk size and inter-chunk delay used when writing a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    pub size: usize,
    pub delay: Duration,
}

/// Used for bulk uploads, right after the device may have rebooted.
pub const SYNC_CHUNKS: ChunkPolicy = ChunkPolicy {
    size: 256,
    delay: Duration::from_millis(200),
};

/// Used for single-file pushes.
pub const PUSH_CHUNKS: ChunkPolicy = ChunkPolicy {
    size: 1024,
    delay: Duration::from_millis(100),
};

impl ChunkPolicy {
    pub fn new(size: usize, delay: Duration) -> Result<Self, ProtocolError> {
        if size == 0 {
            return Err(ProtocolError::ZeroChunkSize);
        }
        Ok(Self { size, delay })
    }
}

/// Split `message` into `size`-byte chunks; the last one may be shorter.
pub fn chunks(message: &[u8], size: usize) -> Result<core::slice::Chunks<'_, u8>, ProtocolError> {
    if size == 0 {
        return Err(ProtocolError::ZeroChunkSize);
    }
    Ok(message.chunks(size))
}

/// Number of chunks `chunks` yields for a message of `len` bytes.
pub fn chunk_count(len: usize, size: usize) -> usize {
    if size == 0 {
        0
    } else {
        len.div_ceil(size)
    }
}
