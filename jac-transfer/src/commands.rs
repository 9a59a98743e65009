// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Command implementations for uploader operations.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::{info, warn};

use jac_common::crc::crc32;
use jac_common::protocol::{decode_pull, parse_entry, parse_stats, Command, FsEntry, Reply};
use jac_common::{ChunkPolicy, ProtocolError};

use crate::transport::{Port, Transport};
use crate::walk::LocalFile;

/// Options shared by the uploading commands.
#[derive(Debug, Clone, Copy)]
pub struct UploadOptions {
    pub chunks: ChunkPolicy,
    /// Re-list after uploading and compare sizes and checksums.
    pub verify: bool,
}

/// Fetch the remote listing.
///
/// `ERROR` lines inside the listing are collected and reported once the
/// terminating empty line has been read.
pub fn list_entries<P: Port>(
    transport: &mut Transport<P>,
    prefix: Option<&str>,
) -> Result<Vec<FsEntry>> {
    transport.send(&Command::list(prefix)?)?;

    let mut entries = Vec::new();
    let mut errors = Vec::new();
    loop {
        let line = transport.read_line()?;
        match parse_entry(&line) {
            Ok(Some(entry)) => entries.push(entry),
            Ok(None) => break,
            Err(ProtocolError::Device(message)) => errors.push(message),
            Err(e) => return Err(e).context("Failed to parse listing"),
        }
    }

    if !errors.is_empty() {
        bail!("Listing failed: {}", errors.join("; "));
    }
    Ok(entries)
}

/// Push one file and return the device's acknowledgement.
fn push_file<P: Port>(
    transport: &mut Transport<P>,
    name: &str,
    data: &[u8],
    chunks: ChunkPolicy,
) -> Result<Reply> {
    info!("pushing {} ({} bytes)", name, data.len());
    let cmd = Command::push(name, data)?;
    transport.send_chunked(&cmd, chunks)?;
    let reply = transport.read_ack()?;
    info!("{}: {:?}", name, reply);
    Ok(reply)
}

fn remove_entry<P: Port>(transport: &mut Transport<P>, name: &str) -> Result<Reply> {
    transport.send(&Command::remove(name)?)?;
    let reply = transport.read_ack()?;
    info!("remove {}: {:?}", name, reply);
    Ok(reply)
}

fn leave<P: Port>(transport: &mut Transport<P>) -> Result<()> {
    let reply = transport.exit()?;
    info!("exit: {:?}", reply);
    Ok(())
}

/// Compare the remote listing with what was just uploaded.
fn verify<P: Port>(transport: &mut Transport<P>, uploaded: &[(&str, &[u8])]) -> Result<()> {
    let entries = list_entries(transport, None)?;
    let remote: HashMap<&str, &FsEntry> = entries
        .iter()
        .filter(|e| e.is_file())
        .map(|e| (e.path(), e))
        .collect();

    let mut failures = Vec::new();
    for &(name, data) in uploaded {
        let Some(entry) = remote.get(name.trim_start_matches('/')) else {
            failures.push(format!("{}: missing on device", name));
            continue;
        };
        match (entry.size, entry.crc32) {
            (Some(size), Some(crc)) => {
                let expected_crc = crc32(data);
                if size != data.len() as u64 || crc != expected_crc {
                    failures.push(format!(
                        "{}: expected {} bytes (CRC32 0x{:08x}), device has {} bytes (CRC32 0x{:08x})",
                        name,
                        data.len(),
                        expected_crc,
                        size,
                        crc
                    ));
                }
            }
            _ => warn!("{}: device did not report size and checksum", name),
        }
    }

    if !failures.is_empty() {
        bail!("Verification failed:\n  {}", failures.join("\n  "));
    }
    info!("verified {} file(s)", uploaded.len());
    Ok(())
}

/// Replace the device contents with `files`.
pub fn sync<P: Port>(
    transport: &mut Transport<P>,
    files: &[LocalFile],
    options: UploadOptions,
) -> Result<()> {
    transport.wait_for_greeting()?;
    transport.enter_transfer_mode()?;

    // Files first, then directories deepest-first so they are empty on removal.
    let entries = list_entries(transport, None)?;
    let (remote_files, mut remote_dirs): (Vec<_>, Vec<_>) =
        entries.iter().partition(|e| e.is_file());
    remote_dirs.sort_by_key(|e| Reverse(e.path().matches('/').count()));
    for entry in remote_files.iter().chain(remote_dirs.iter()) {
        if let Reply::Error(message) = remove_entry(transport, &entry.name)? {
            warn!("could not remove {}: {}", entry.name, message);
        }
    }

    for file in files {
        let reply = push_file(transport, &file.name, &file.data, options.chunks)?;
        if let Reply::Error(message) = reply {
            bail!("Push of {} failed: {}", file.name, message);
        }
    }

    if options.verify {
        let uploaded: Vec<(&str, &[u8])> = files
            .iter()
            .map(|f| (f.name.as_str(), f.data.as_slice()))
            .collect();
        verify(transport, &uploaded)?;
    }

    leave(transport)?;
    println!("Synced {} file(s) to {}", files.len(), transport.port_name());
    Ok(())
}

/// Upload a single local file as `target`.
pub fn push<P: Port>(
    transport: &mut Transport<P>,
    source: &Path,
    target: &str,
    options: UploadOptions,
) -> Result<()> {
    let data = fs::read(source).with_context(|| format!("Failed to read {}", source.display()))?;

    transport.enter_transfer_mode()?;
    if let Reply::Error(message) = push_file(transport, target, &data, options.chunks)? {
        bail!("Push of {} failed: {}", target, message);
    }
    if options.verify {
        verify(transport, &[(target, data.as_slice())])?;
    }
    leave(transport)
}

/// Download remote `source` into local `target`.
pub fn pull<P: Port>(transport: &mut Transport<P>, source: &str, target: &Path) -> Result<()> {
    transport.enter_transfer_mode()?;
    transport.send(&Command::pull(source)?)?;
    let line = transport.read_line()?;
    let data = decode_pull(&line).with_context(|| format!("Failed to pull {}", source))?;

    fs::write(target, &data).with_context(|| format!("Failed to write {}", target.display()))?;
    info!("pulled {} ({} bytes) into {}", source, data.len(), target.display());
    leave(transport)
}

/// Print remote entries. Only file names unless `long` is set.
pub fn list<P: Port>(
    transport: &mut Transport<P>,
    prefix: Option<&str>,
    long: bool,
    out: &mut dyn Write,
) -> Result<()> {
    transport.enter_transfer_mode()?;
    let entries = list_entries(transport, prefix)?;

    for entry in &entries {
        if !long {
            if entry.is_file() {
                writeln!(out, "{}", entry.name)?;
            }
            continue;
        }
        match (entry.is_file(), entry.size, entry.crc32) {
            (false, _, _) => writeln!(out, "D {:>10} {:8} {}/", "", "", entry.name)?,
            (true, Some(size), Some(crc)) => {
                writeln!(out, "F {:>10} {:08x} {}", size, crc, entry.name)?
            }
            (true, Some(size), None) => writeln!(out, "F {:>10} {:8} {}", size, "", entry.name)?,
            (true, None, _) => writeln!(out, "F {:>10} {:8} {}", "?", "", entry.name)?,
        }
    }

    leave(transport)
}

/// Delete one remote file.
pub fn remove<P: Port>(transport: &mut Transport<P>, name: &str) -> Result<()> {
    transport.enter_transfer_mode()?;
    if let Reply::Error(message) = remove_entry(transport, name)? {
        bail!("Remove of {} failed: {}", name, message);
    }
    leave(transport)
}

/// Print storage usage.
pub fn stats<P: Port>(transport: &mut Transport<P>, out: &mut dyn Write) -> Result<()> {
    transport.enter_transfer_mode()?;
    transport.send(&Command::Stats)?;
    let line = transport.read_line()?;
    let stats = parse_stats(&line).context("Failed to read storage stats")?;

    writeln!(out, "Storage:")?;
    writeln!(out, "  Total: {} bytes", stats.total)?;
    writeln!(out, "  Used:  {} bytes", stats.used())?;
    writeln!(out, "  Free:  {} bytes", stats.free)?;
    leave(transport)
}

/// Reading from the device console is not implemented.
pub fn read() -> Result<()> {
    warn!("read is not implemented, nothing to do");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::{transport, MockPort};
    use std::time::Duration;

    fn fast(verify: bool) -> UploadOptions {
        UploadOptions {
            chunks: ChunkPolicy::new(8, Duration::ZERO).unwrap(),
            verify,
        }
    }

    fn file(name: &str, data: &[u8]) -> LocalFile {
        LocalFile {
            name: name.to_string(),
            data: data.to_vec(),
        }
    }

    // Listings below follow the device: a directory's contents come before
    // the directory itself, and the listing ends with an empty line.

    #[test]
    fn test_list_prints_file_names_only() {
        let port = MockPort::new()
            .reply(b"F /index.js 4 00000000\nF /lib/a.js 1 00000000\nD /lib\n\n")
            .reply(b"OK\n");
        let mut t = transport(port);
        let mut out = Vec::new();

        list(&mut t, None, false, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "/index.js\n/lib/a.js\n");
        assert_eq!(t.port().written_lines(), vec!["LIST", "EXIT"]);
        assert_eq!(t.port().rts, vec![false, true]);
    }

    #[test]
    fn test_list_long_includes_directories() {
        let port = MockPort::new()
            .reply(b"F /lib/a.js 4 deadbeef\nD /lib\n\n")
            .reply(b"OK\n");
        let mut t = transport(port);
        let mut out = Vec::new();

        list(&mut t, Some("/"), true, &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("deadbeef /lib/a.js"));
        assert!(out.contains("/lib/"));
        assert_eq!(t.port().written_lines(), vec!["LIST /", "EXIT"]);
    }

    #[test]
    fn test_list_rejects_unknown_kind() {
        let mut t = transport(MockPort::new().reply(b"? /weird\n\n"));
        let mut out = Vec::new();
        assert!(list(&mut t, None, false, &mut out).is_err());
    }

    #[test]
    fn test_list_reports_error_after_terminator() {
        let mut t = transport(MockPort::new().reply(b"ERROR No such file or directory\n\n"));
        let mut out = Vec::new();

        let err = list(&mut t, Some("/missing"), false, &mut out).unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
        assert!(t.read_line().is_err());
    }

    #[test]
    fn test_push_writes_chunked_line() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"hi").unwrap();

        let mut t = transport(MockPort::new().reply(b"OK\n").reply(b"OK\n"));
        push(&mut t, &source, "a.txt", fast(false)).unwrap();

        assert_eq!(t.port().written_str(), "PUSH a.txt aGk=\nEXIT\n");
        assert_eq!(t.port().rts, vec![false, true]);
    }

    #[test]
    fn test_push_device_error_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"hi").unwrap();

        let reply = b"ERROR Cannot finalize push: No space left\nOK\n";
        let mut t = transport(MockPort::new().reply(reply));
        let err = push(&mut t, &source, "a.txt", fast(false)).unwrap_err();
        assert!(err.to_string().contains("No space left"));
        assert_eq!(t.port().written_lines(), vec!["PUSH a.txt aGk="]);
    }

    #[test]
    fn test_push_rejected_payload_fails() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"hi").unwrap();

        // The device drops the rest of the line without a closing OK.
        let reply = b"ERROR Invalid characted in base64 encoding specified\n";
        let mut t = transport(MockPort::new().reply(reply));
        let err = push(&mut t, &source, "a.txt", fast(false)).unwrap_err();
        assert!(err.to_string().contains("Invalid characted"));
    }

    #[test]
    fn test_push_verify_checks_crc() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"hi").unwrap();
        let listing = format!("F /a.txt 2 {:08x}\n\n", crc32(b"hi"));

        let port = MockPort::new()
            .reply(b"OK\n")
            .reply(listing.as_bytes())
            .reply(b"OK\n");
        let mut t = transport(port);
        push(&mut t, &source, "a.txt", fast(true)).unwrap();
        assert_eq!(t.port().written_lines(), vec!["PUSH a.txt aGk=", "LIST", "EXIT"]);
    }

    #[test]
    fn test_push_verify_detects_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, b"hi").unwrap();

        let port = MockPort::new()
            .reply(b"OK\n")
            .reply(b"F /a.txt 1 00000000\n\n");
        let mut t = transport(port);
        let err = push(&mut t, &source, "a.txt", fast(true)).unwrap_err();
        assert!(err.to_string().contains("Verification failed"));
    }

    #[test]
    fn test_pull_writes_decoded_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");

        let mut t = transport(MockPort::new().reply(b"aGk=\r\n").reply(b"OK\n"));
        pull(&mut t, "a.txt", &target).unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"hi");
        assert_eq!(t.port().written_lines(), vec!["PULL a.txt", "EXIT"]);
    }

    #[test]
    fn test_pull_device_error_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.txt");

        let mut t = transport(MockPort::new().reply(b"ERROR No such file or directory\n"));
        assert!(pull(&mut t, "missing.txt", &target).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_remove_sends_name() {
        let mut t = transport(MockPort::new().reply(b"OK\n").reply(b"OK\n"));
        remove(&mut t, "old.js").unwrap();
        assert_eq!(t.port().written_lines(), vec!["REMOVE old.js", "EXIT"]);
    }

    #[test]
    fn test_remove_device_error_fails() {
        let reply = b"ERROR No such file or directory\nOK\n";
        let mut t = transport(MockPort::new().reply(reply));
        let err = remove(&mut t, "missing.js").unwrap_err();
        assert!(err.to_string().contains("No such file or directory"));
        assert_eq!(t.port().written_lines(), vec!["REMOVE missing.js"]);
    }

    #[test]
    fn test_stats_prints_usage() {
        let mut t = transport(MockPort::new().reply(b"1000 4000\n").reply(b"OK\n"));
        let mut out = Vec::new();
        stats(&mut t, &mut out).unwrap();

        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("Total: 4000 bytes"));
        assert!(out.contains("Used:  3000 bytes"));
        assert!(out.contains("Free:  1000 bytes"));
    }

    #[test]
    fn test_sync_clears_device_then_uploads() {
        let port = MockPort::new()
            .greeting(b"rst:0x1 (POWERON_RESET)\nboot: ESP-IDF\n")
            .reply(
                b"F /old.js 3 00000000\nF /lib/deep/x.js 1 00000000\nD /lib/deep\n\
                  F /lib/y.js 1 00000000\nD /lib\n\n",
            )
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n");
        let mut t = transport(port);
        let files = vec![file("index.js", b"main();"), file("lib/util.js", b"")];

        sync(&mut t, &files, fast(false)).unwrap();

        assert_eq!(
            t.port().written_lines(),
            vec![
                "LIST",
                "REMOVE /old.js",
                "REMOVE /lib/deep/x.js",
                "REMOVE /lib/y.js",
                "REMOVE /lib/deep",
                "REMOVE /lib",
                "PUSH index.js bWFpbigpOw==",
                "PUSH lib/util.js ",
                "EXIT",
            ]
        );
        assert_eq!(t.port().rts, vec![false, true]);
        assert_eq!(t.port().pending_replies(), 0);
    }

    #[test]
    fn test_sync_removes_children_before_parents_in_any_order() {
        let port = MockPort::new()
            .reply(b"D /a\nD /a/b\nD /a/b/c\nD /z\n\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n");
        let mut t = transport(port);

        sync(&mut t, &[], fast(false)).unwrap();

        assert_eq!(
            t.port().written_lines(),
            vec![
                "LIST",
                "REMOVE /a/b/c",
                "REMOVE /a/b",
                "REMOVE /a",
                "REMOVE /z",
                "EXIT"
            ]
        );
    }

    #[test]
    fn test_sync_continues_after_remove_error() {
        let port = MockPort::new()
            .reply(b"F /old.js 3 00000000\nD /lib\n\n")
            .reply(b"ERROR Device busy\nOK\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(b"OK\n");
        let mut t = transport(port);
        let files = vec![file("a.js", b"1")];

        sync(&mut t, &files, fast(false)).unwrap();

        assert_eq!(
            t.port().written_lines(),
            vec!["LIST", "REMOVE /old.js", "REMOVE /lib", "PUSH a.js MQ==", "EXIT"]
        );
        assert_eq!(t.port().pending_replies(), 0);
    }

    #[test]
    fn test_sync_aborts_on_push_error() {
        let port = MockPort::new()
            .reply(b"F /old.js 3 00000000\n\n")
            .reply(b"ERROR Device busy\nOK\n")
            .reply(b"ERROR Cannot finalize push: No space left\nOK\n")
            .reply(b"OK\n");
        let mut t = transport(port);
        let files = vec![file("a.js", b"1"), file("b.js", b"2")];

        let err = sync(&mut t, &files, fast(false)).unwrap_err();

        assert!(err.to_string().contains("No space left"));
        assert_eq!(
            t.port().written_lines(),
            vec!["LIST", "REMOVE /old.js", "PUSH a.js MQ=="]
        );
    }

    #[test]
    fn test_sync_verify() {
        let listing = format!(
            "F /a.js 1 {:08x}\nF /b.js 1 {:08x}\n\n",
            crc32(b"1"),
            crc32(b"2")
        );
        let port = MockPort::new()
            .reply(b"\n")
            .reply(b"OK\n")
            .reply(b"OK\n")
            .reply(listing.as_bytes())
            .reply(b"OK\n");
        let mut t = transport(port);
        let files = vec![file("a.js", b"1"), file("b.js", b"2")];

        sync(&mut t, &files, fast(true)).unwrap();
        assert_eq!(t.port().pending_replies(), 0);
    }

    #[test]
    fn test_read_is_a_no_op() {
        assert!(read().is_ok());
    }
}
