//! Archive validation
//!
//! Checks run before anything is written: every member name must be
//! relative and free of `..` segments, and the destination derived from the
//! archive's own manifest must stay inside the SDK root.

use std::path::{Component, Path, PathBuf};

use crate::error::{Result, SdkError};

/// Validates archive contents against an SDK root
#[derive(Debug, Clone)]
pub struct ArchiveGuard {
    root: PathBuf,
}

impl ArchiveGuard {
    pub fn new(root: &Path) -> Self {
        Self {
            root: normalize(root),
        }
    }

    /// Reject absolute member names and parent-directory traversal
    pub fn check_member(name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        let drive_prefix = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
        let traverses = name.split(['/', '\\']).any(|segment| segment == "..");
        let escapes = Path::new(name)
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::RootDir | Component::Prefix(_)));

        if name.starts_with('/') || name.starts_with('\\') || drive_prefix || traverses || escapes {
            return Err(SdkError::QuestionableFile(name.to_string()));
        }
        Ok(())
    }

    /// Check every member name, failing on the first offender
    pub fn check_members<'a, I>(names: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a String>,
    {
        names.into_iter().try_for_each(|name| Self::check_member(name))
    }

    /// Resolve the directory for `version`, which must be a direct child of the root
    pub fn destination(&self, version: &str) -> Result<PathBuf> {
        let candidate = normalize(&self.root.join(version));
        if candidate.parent() != Some(self.root.as_path()) {
            return Err(SdkError::SuspiciousVersion(version.to_string()));
        }
        Ok(candidate)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Lexically resolve `.` and `..` without touching the filesystem
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
