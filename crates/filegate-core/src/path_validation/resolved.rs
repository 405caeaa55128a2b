use crate::error::{GateError, Result};
use std::fmt;
use std::fs::{self, File, Metadata};
use std::io;
use std::path::{Path, PathBuf};

/// A canonical path that was inside an allowed root when it was resolved.
///
/// Only [`super::PathContainment`] constructs these. The value carries no
/// guarantee past the moment of resolution: the filesystem may change
/// before the caller uses it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedPath {
    path: PathBuf,
    root: PathBuf,
}

impl ResolvedPath {
    pub(crate) fn new(path: PathBuf, root: PathBuf) -> Self {
        Self { path, root }
    }

    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The allowed root this path was found under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn into_path_buf(self) -> PathBuf {
        self.path
    }

    /// Path below the root, safe to echo back to the requester.
    pub fn relative_to_root(&self) -> &Path {
        self.path.strip_prefix(&self.root).unwrap_or(Path::new(""))
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Open for reading without following a symlink at the final component,
    /// and verify the opened handle is the same file that was stat'd.
    ///
    /// A leaf swapped for a symlink or replaced between stat and open yields
    /// `AccessDenied`; a missing or unreadable file yields `Io`.
    pub fn open_read(&self) -> Result<File> {
        let shown = self.relative_to_root().display().to_string();
        let before = fs::symlink_metadata(&self.path)
            .map_err(|e| GateError::io(format!("cannot stat {}: {}", shown, e)))?;
        if before.file_type().is_symlink() {
            return Err(GateError::access_denied(
                "path was replaced by a symbolic link",
            ));
        }
        let file = open_no_follow(&self.path).map_err(|e| {
            if is_symlink_refusal(&e) {
                GateError::access_denied("path was replaced by a symbolic link")
            } else {
                GateError::io(format!("cannot open {}: {}", shown, e))
            }
        })?;
        let after = file
            .metadata()
            .map_err(|e| GateError::io(format!("cannot stat {}: {}", shown, e)))?;
        if !same_file(&before, &after) {
            return Err(GateError::access_denied(
                "file changed between check and open",
            ));
        }
        Ok(file)
    }
}

impl AsRef<Path> for ResolvedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl fmt::Display for ResolvedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

#[cfg(unix)]
fn open_no_follow(path: &Path) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NOFOLLOW)
        .open(path)
}

#[cfg(not(unix))]
fn open_no_follow(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(unix)]
fn is_symlink_refusal(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::ELOOP)
}

#[cfg(not(unix))]
fn is_symlink_refusal(_e: &io::Error) -> bool {
    false
}

#[cfg(unix)]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    use std::os::unix::fs::MetadataExt;
    a.dev() == b.dev() && a.ino() == b.ino()
}

#[cfg(not(unix))]
fn same_file(a: &Metadata, b: &Metadata) -> bool {
    a.file_type() == b.file_type() && a.len() == b.len()
}
