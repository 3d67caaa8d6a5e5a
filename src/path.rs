//! Logical path handling shared by the adapters.
//!
//! Callers address files with slash-separated, adapter-relative strings.
//! [`normalize`] turns such a string into a canonical key (no leading or
//! duplicate separators, no `.` components) and [`PathPrefix`] joins that key
//! onto a root directory.

use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Normalize a logical path.
///
/// Leading separators are stripped, `.` and empty components are dropped.
/// Backslashes are treated as separators. `..` components are rejected so an
/// adapter can never be steered outside of its root.
///
/// The empty path (or `/`) normalizes to `""`, which denotes the adapter root.
pub fn normalize(path: &str) -> Result<String> {
    let mut parts: Vec<&str> = Vec::new();

    for component in path.split(['/', '\\']) {
        match component {
            "" | "." => {}
            ".." => {
                return Err(Error::PermissionDenied(format!(
                    "parent dir components ('..') are not allowed: {path}"
                )));
            }
            c if parts.is_empty() && is_drive_prefix(c) => {
                return Err(Error::PermissionDenied(format!(
                    "path prefixes are not allowed: {path}"
                )));
            }
            c => parts.push(c),
        }
    }

    Ok(parts.join("/"))
}

/// A leading `C:` style component.
fn is_drive_prefix(component: &str) -> bool {
    let bytes = component.as_bytes();
    bytes.len() == 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Like [`normalize`], but the result must name something below the root.
pub fn normalize_entry(path: &str) -> Result<String> {
    let normalized = normalize(path)?;
    if normalized.is_empty() {
        return Err(Error::Generic(format!("path must not be empty: {path:?}")));
    }
    Ok(normalized)
}

/// Parent of a normalized path, `""` for entries directly under the root.
pub fn parent(normalized: &str) -> &str {
    match normalized.rfind('/') {
        Some(idx) => &normalized[..idx],
        None => "",
    }
}

/// A root directory that adapter-relative paths are resolved against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPrefix {
    root: PathBuf,
}

impl PathPrefix {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a logical path to a location under the root.
    pub fn apply(&self, path: &str) -> Result<PathBuf> {
        let normalized = normalize_entry(path)?;
        Ok(self.root.join(normalized))
    }
}
