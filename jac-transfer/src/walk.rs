// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Collection of the local files a sync uploads.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::debug;
use walkdir::WalkDir;

use jac_common::paths::{is_hidden, remote_name};
use jac_common::protocol::validate_name;

/// A local file with the name it gets on the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Read every non-hidden file below `root`, ordered by remote name.
///
/// Hidden directories are not descended into. Symlinked directories are not
/// followed; symlinked files are read.
pub fn collect_files(root: &Path) -> Result<Vec<LocalFile>> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            let hidden = is_hidden(relative);
            if hidden {
                debug!("skipping hidden {}", relative.display());
            }
            !hidden
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let path = entry.path();
        if entry.file_type().is_dir() || !path.is_file() {
            continue;
        }
        let Some(name) = remote_name(root, path) else {
            continue;
        };
        validate_name(&name).with_context(|| format!("Cannot upload {}", path.display()))?;
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        files.push(LocalFile { name, data });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}
