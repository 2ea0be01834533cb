//! Registered chat groups and folder-name validation.
//!
//! A group's folder name is the key for every on-disk workspace path, so it is
//! validated before it is joined onto any root to prevent path traversal.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

/// Folder shared read-only by every non-main group.
pub const GLOBAL_FOLDER: &str = "global";

/// A chat/group known to the host. Owned by an external registry; read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredGroup {
    /// Display name
    pub name: String,
    /// Unique workspace key
    pub folder: String,
    /// Per-group timeout override in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl RegisteredGroup {
    pub fn new(name: impl Into<String>, folder: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            folder: folder.into(),
            timeout_ms: None,
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupFolderError {
    #[error("invalid group folder '{0}': expected 1-64 chars of [A-Za-z0-9_-], starting alphanumeric")]
    Malformed(String),
    #[error("group folder '{0}' is reserved")]
    Reserved(String),
    #[error("group path escapes its root: {0}")]
    EscapesRoot(String),
}

fn folder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("static folder pattern compiles")
    })
}

/// Check that `folder` is safe to use as a single path component.
pub fn validate_group_folder(folder: &str) -> Result<(), GroupFolderError> {
    if !folder_pattern().is_match(folder) {
        return Err(GroupFolderError::Malformed(folder.to_string()));
    }
    if folder.eq_ignore_ascii_case(GLOBAL_FOLDER) {
        return Err(GroupFolderError::Reserved(folder.to_string()));
    }
    Ok(())
}

/// Join a validated folder onto `root`, refusing anything that would leave it.
pub fn resolve_under_root(root: &Path, folder: &str) -> Result<PathBuf, GroupFolderError> {
    validate_group_folder(folder)?;
    let joined = root.join(folder);
    let escapes = joined
        .strip_prefix(root)
        .map(|rel| {
            rel.components()
                .any(|c| !matches!(c, Component::Normal(_)))
        })
        .unwrap_or(true);
    if escapes {
        return Err(GroupFolderError::EscapesRoot(joined.display().to_string()));
    }
    Ok(joined)
}

/// Folder name reduced to `[A-Za-z0-9-]`, for run identifiers.
pub fn sanitize_folder(folder: &str) -> String {
    folder
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}
