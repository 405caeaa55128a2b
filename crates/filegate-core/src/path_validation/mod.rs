//! Path containment.
//!
//! Every filesystem-touching operation resolves its requested path here
//! before any I/O. A request is sanitized, lexically normalized, joined onto
//! the base directory, symlink-resolved, and finally proven to sit inside
//! one of the allowed roots. Anything else is `AccessDenied`; there is no
//! best-effort result.
//!
//! Containment holds at resolution time only. Use
//! [`ResolvedPath::open_read`] for the final read so the open itself refuses
//! to follow a symlink planted after the check.

mod resolved;
mod sanitize;

#[cfg(test)]
mod fuzz;
#[cfg(test)]
mod tests;

pub use resolved::ResolvedPath;
pub use sanitize::{normalize_lexical, sanitize_request, MAX_PATH_LEN};

use crate::config::GateConfig;
use crate::error::{GateError, Result};
use std::io;
use std::path::{Path, PathBuf};

/// Allowed roots plus the base directory relative requests are joined onto.
///
/// Roots are canonicalized once at construction and never change afterwards.
#[derive(Debug, Clone)]
pub struct PathContainment {
    roots: Vec<PathBuf>,
    base: PathBuf,
}

impl PathContainment {
    /// Build from root directories. Each root must exist; relative requests
    /// resolve against the current working directory.
    pub fn new<I, P>(roots: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let roots = roots
            .into_iter()
            .map(|r| canonical_root(r.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        if roots.is_empty() {
            return Err(GateError::io("no allowed roots configured"));
        }
        let base = std::env::current_dir()
            .and_then(|d| d.canonicalize())
            .unwrap_or_else(|_| roots[0].clone());
        Ok(Self { roots, base })
    }

    pub fn from_config(config: &GateConfig) -> Result<Self> {
        let containment = Self::new(&config.allowed_roots)?;
        match &config.base_dir {
            Some(base) => containment.with_base(base),
            None => Ok(containment),
        }
    }

    /// Join relative requests onto `base` instead of the cwd.
    pub fn with_base(mut self, base: impl AsRef<Path>) -> Result<Self> {
        self.base = canonical_root(base.as_ref())?;
        Ok(self)
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Resolve `requested` to a canonical path inside one of the roots.
    pub fn resolve(&self, requested: &str) -> Result<ResolvedPath> {
        let sanitized = sanitize_request(requested).map_err(|reason| deny(requested, reason))?;
        let normalized = normalize_lexical(&sanitized);
        let absolute = if normalized.is_absolute() {
            normalized
        } else {
            self.base.join(normalized)
        };

        let canonical = canonicalize_target(&absolute).map_err(|reason| deny(requested, reason))?;

        match self.containing_root(&canonical) {
            Some(root) => {
                tracing::debug!(requested = %requested, resolved = %canonical.display(), "path resolved");
                Ok(ResolvedPath::new(canonical, root.to_path_buf()))
            }
            None => {
                tracing::debug!(requested = %requested, resolved = %canonical.display(), "resolved outside roots");
                Err(deny(requested, "path escapes allowed roots"))
            }
        }
    }

    /// First root that contains `canonical`, if any.
    pub fn containing_root(&self, canonical: &Path) -> Option<&Path> {
        self.roots
            .iter()
            .find(|root| is_within(root, canonical))
            .map(PathBuf::as_path)
    }
}

/// One-shot form of [`PathContainment::resolve`].
///
/// Every failure is `AccessDenied`, including an empty or unusable root
/// list; use [`PathContainment::new`] to tell configuration errors apart.
pub fn resolve_path<P: AsRef<Path>>(requested: &str, roots: &[P]) -> Result<ResolvedPath> {
    let containment = PathContainment::new(roots).map_err(|e| {
        tracing::warn!(error = %e, "allowed roots unusable");
        deny(requested, "no usable allowed root")
    })?;
    containment.resolve(requested)
}

fn deny(requested: &str, reason: &str) -> GateError {
    tracing::warn!(requested = %requested.escape_debug(), reason = %reason, "Security: access denied");
    GateError::access_denied(reason)
}

fn canonical_root(root: &Path) -> Result<PathBuf> {
    let canonical = root
        .canonicalize()
        .map_err(|e| GateError::io(format!("allowed root {} unavailable: {}", root.display(), e)))?;
    if !canonical.is_dir() {
        return Err(GateError::io(format!(
            "allowed root {} is not a directory",
            root.display()
        )));
    }
    Ok(canonical)
}

/// Canonicalize an absolute path. A missing leaf is allowed when its parent
/// directory exists; any deeper gap fails closed.
fn canonicalize_target(absolute: &Path) -> std::result::Result<PathBuf, &'static str> {
    match absolute.canonicalize() {
        Ok(p) => Ok(p),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if absolute.symlink_metadata().is_ok() {
                return Err("dangling symbolic link");
            }
            let (Some(parent), Some(name)) = (absolute.parent(), absolute.file_name()) else {
                return Err("path cannot be resolved");
            };
            let parent = parent
                .canonicalize()
                .map_err(|_| "parent directory does not exist")?;
            if !parent.is_dir() {
                return Err("parent is not a directory");
            }
            Ok(parent.join(name))
        }
        Err(_) => Err("path cannot be resolved"),
    }
}

/// Textual containment with a separator boundary: `/allowed` contains
/// `/allowed` and `/allowed/x` but not `/allowed-evil`.
pub fn is_within(root: &Path, candidate: &Path) -> bool {
    let root = root.as_os_str().as_encoded_bytes();
    let candidate = candidate.as_os_str().as_encoded_bytes();
    if candidate == root {
        return true;
    }
    let mut end = root.len();
    while end > 0 && is_separator_byte(root[end - 1]) {
        end -= 1;
    }
    let prefix = &root[..end];
    candidate.starts_with(prefix)
        && candidate
            .get(prefix.len())
            .is_some_and(|b| is_separator_byte(*b))
}

fn is_separator_byte(b: u8) -> bool {
    b == b'/' || (cfg!(windows) && b == b'\\')
}
