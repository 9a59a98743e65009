// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Errors produced while formatting commands or parsing device replies.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown entry kind '{0}' in listing")]
    UnknownKind(String),

    #[error("malformed line from device: {0:?}")]
    Malformed(String),

    #[error("invalid base64 payload: {0}")]
    Base64(String),

    #[error("remote name {0:?} is empty or contains whitespace")]
    InvalidName(String),

    /// The device answered with an `ERROR <message>` line.
    #[error("device error: {0}")]
    Device(String),

    #[error("chunk size must be non-zero")]
    ZeroChunkSize,
}
