// SPDX-License-Identifier: MIT
// Copyright (c) 2026 The jac-transfer contributors

//! Helpers for mapping a local project tree onto remote names.

use std::path::{Component, Path};

/// Lexically normalize `path`: drop `.` components and fold `x/..` pairs.
///
/// Leading `..` components that cannot be folded are kept. The filesystem is
/// never consulted, so symlinks are not resolved.
pub fn normalize(path: &Path) -> Vec<Component<'_>> {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// True when any component of the normalized path is a dotfile or dot-directory.
pub fn is_hidden(path: impl AsRef<Path>) -> bool {
    normalize(path.as_ref()).iter().any(|c| match c {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

/// Name under which `file` is stored on the device when uploading `root`.
///
/// The result is relative to `root` and always uses `/` as separator.
/// Returns `None` if `file` does not live below `root`.
pub fn remote_name(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let parts: Vec<String> = normalize(relative)
        .into_iter()
        .map(|c| match c {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Option<_>>()?;
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}
