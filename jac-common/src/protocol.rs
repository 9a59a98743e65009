// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Line protocol spoken by the uploader running on the device.
//!
//! Every request is a single ASCII line terminated by `\n`. File contents
//! travel inline as standard, padded base64. Replies are lines as well:
//! `OK`, `ERROR <message>`, a base64 payload (PULL), a listing terminated by an
//! empty line (LIST), or `<free> <total>` (STATS).

use base64::prelude::*;

use crate::error::ProtocolError;

/// Tag used by LIST for regular files.
pub const FILE_TAG: &str = "F";
/// Tag used by LIST for directories.
pub const DIRECTORY_TAG: &str = "D";
/// Prefix of every error line the device emits.
pub const ERROR_PREFIX: &str = "ERROR";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Enumerate remote entries, optionally below a prefix.
    List { prefix: Option<String> },
    /// Write a file. `content` is already base64-encoded.
    Push { name: String, content: String },
    Pull { name: String },
    Remove { name: String },
    /// Query free and total storage.
    Stats,
    /// Leave transfer mode.
    Exit,
}

impl Command {
    pub fn list(prefix: Option<&str>) -> Result<Self, ProtocolError> {
        let prefix = match prefix {
            Some(p) => Some(checked_name(p)?),
            None => None,
        };
        Ok(Command::List { prefix })
    }

    /// Build a PUSH command, encoding `data` as base64.
    pub fn push(name: &str, data: &[u8]) -> Result<Self, ProtocolError> {
        Ok(Command::Push {
            name: checked_name(name)?,
            content: BASE64_STANDARD.encode(data),
        })
    }

    pub fn pull(name: &str) -> Result<Self, ProtocolError> {
        Ok(Command::Pull {
            name: checked_name(name)?,
        })
    }

    pub fn remove(name: &str) -> Result<Self, ProtocolError> {
        Ok(Command::Remove {
            name: checked_name(name)?,
        })
    }

    /// Serialize the command to its wire form, including the trailing `\n`.
    pub fn encode(&self) -> String {
        match self {
            Command::List { prefix: None } => "LIST\n".to_string(),
            Command::List { prefix: Some(p) } => format!("LIST {}\n", p),
            Command::Push { name, content } => format!("PUSH {} {}\n", name, content),
            Command::Pull { name } => format!("PULL {}\n", name),
            Command::Remove { name } => format!("REMOVE {}\n", name),
            Command::Stats => "STATS\n".to_string(),
            Command::Exit => "EXIT\n".to_string(),
        }
    }
}

/// Check that `name` can be carried as a single protocol token.
pub fn validate_name(name: &str) -> Result<(), ProtocolError> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ProtocolError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn checked_name(name: &str) -> Result<String, ProtocolError> {
    validate_name(name)?;
    Ok(name.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One line of a LIST reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Size in bytes, reported for files by current firmware.
    pub size: Option<u64>,
    /// CRC-32 of the contents, reported alongside `size`.
    pub crc32: Option<u32>,
}

impl FsEntry {
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Name without the leading `/` the device prepends.
    pub fn path(&self) -> &str {
        self.name.trim_start_matches('/')
    }
}

/// Parse one LIST line. An empty line terminates the listing and yields `None`.
pub fn parse_entry(line: &str) -> Result<Option<FsEntry>, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if let Some(message) = error_message(line) {
        return Err(ProtocolError::Device(message));
    }

    let mut tokens = line.split_whitespace();
    let (tag, name) = match (tokens.next(), tokens.next()) {
        (Some(tag), Some(name)) => (tag, name),
        _ => return Err(ProtocolError::Malformed(line.to_string())),
    };
    let kind = match tag {
        FILE_TAG => EntryKind::File,
        DIRECTORY_TAG => EntryKind::Directory,
        other => return Err(ProtocolError::UnknownKind(other.to_string())),
    };

    let size = tokens
        .next()
        .map(|s| s.parse::<u64>())
        .transpose()
        .map_err(|_| ProtocolError::Malformed(line.to_string()))?;
    let crc32 = tokens
        .next()
        .map(|s| u32::from_str_radix(s, 16))
        .transpose()
        .map_err(|_| ProtocolError::Malformed(line.to_string()))?;

    Ok(Some(FsEntry {
        name: name.to_string(),
        kind,
        size,
        crc32,
    }))
}

/// One acknowledgement line, as sent after PUSH, REMOVE and EXIT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Error(String),
    /// Anything the firmware sent that is neither `OK` nor an error.
    Other(String),
}

impl Reply {
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }
}

pub fn parse_reply(line: &str) -> Reply {
    let line = strip_terminator(line);
    if let Some(message) = error_message(line) {
        return Reply::Error(message);
    }
    match line.trim() {
        "OK" => Reply::Ok,
        other => Reply::Other(other.to_string()),
    }
}

/// Decode the payload line returned by PULL.
pub fn decode_pull(line: &str) -> Result<Vec<u8>, ProtocolError> {
    let payload = strip_terminator(line);
    if let Some(message) = error_message(payload) {
        return Err(ProtocolError::Device(message));
    }
    BASE64_STANDARD
        .decode(payload)
        .map_err(|e| ProtocolError::Base64(e.to_string()))
}

/// Storage usage reported by STATS, in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    pub free: u64,
    pub total: u64,
}

impl StorageStats {
    pub fn used(&self) -> u64 {
        self.total.saturating_sub(self.free)
    }
}

pub fn parse_stats(line: &str) -> Result<StorageStats, ProtocolError> {
    let line = line.trim();
    if let Some(message) = error_message(line) {
        return Err(ProtocolError::Device(message));
    }
    let mut tokens = line.split_whitespace().map(str::parse::<u64>);
    match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(Ok(free)), Some(Ok(total)), None) => Ok(StorageStats { free, total }),
        _ => Err(ProtocolError::Malformed(line.to_string())),
    }
}

fn strip_terminator(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Message carried by an `ERROR ...` line, if `line` is one.
fn error_message(line: &str) -> Option<String> {
    let rest = line.trim_start().strip_prefix(ERROR_PREFIX)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim().to_string())
}
