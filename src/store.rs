//! Directory-scoped file stores.
//!
//! The service keeps two flat directories: a staging store for uploads that
//! only live for the duration of one conversion, and a result store whose
//! files are served for download. Both are a [`FileStore`]; the filename is
//! the only metadata.
//!
//! Every name that reaches a store is validated against [`NAME_PATTERN`],
//! which admits exactly one path component with no separators, no leading
//! dot and no `..`. Download requests and original filenames both pass
//! through here, so this is where hostile names are stopped.

use crate::error::DocConvertError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Accepted store names: `stem` or `stem.ext`, ASCII word characters and dashes only.
pub const NAME_PATTERN: &str = r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9]+)?$";

static NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(NAME_PATTERN).unwrap());

/// Check that `name` is a single safe path component.
pub fn validate_name(name: &str) -> Result<(), DocConvertError> {
    if name.len() <= 255 && NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(DocConvertError::InvalidFileName {
            name: name.to_string(),
        })
    }
}

/// A flat directory of files.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// The directory is not touched until first use.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root directory if it does not exist yet.
    pub async fn ensure_root(&self) -> Result<(), DocConvertError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| DocConvertError::storage(&self.root, e))
    }

    /// Path of `name` inside the store. Does not check existence.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, DocConvertError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Write `bytes` as `name`, replacing any existing file.
    pub async fn put(&self, bytes: &[u8], name: &str) -> Result<PathBuf, DocConvertError> {
        let path = self.resolve(name)?;
        self.ensure_root().await?;
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| DocConvertError::storage(&path, e))?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(path)
    }

    /// Write `bytes` as `name` and return a guard that removes the file again.
    pub async fn stage(&self, bytes: &[u8], name: &str) -> Result<StagedFile, DocConvertError> {
        let path = self.put(bytes, name).await?;
        Ok(StagedFile {
            path,
            removed: false,
        })
    }

    /// Remove a file from the store. Removing a file that does not exist is not an error.
    pub async fn delete(&self, path: &Path) -> Result<(), DocConvertError> {
        if !self.contains(path) {
            return Err(DocConvertError::InvalidFileName {
                name: path.display().to_string(),
            });
        }
        remove_if_exists(path)
            .await
            .map_err(|e| DocConvertError::storage(path, e))
    }

    /// Whether `name` exists as a regular file in the store.
    pub async fn exists(&self, name: &str) -> Result<bool, DocConvertError> {
        let path = self.resolve(name)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(DocConvertError::storage(path, e)),
        }
    }

    fn contains(&self, path: &Path) -> bool {
        path.parent() == Some(self.root.as_path())
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| validate_name(n).is_ok())
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// An input file owned by one conversion attempt.
///
/// Call [`StagedFile::remove`] when the attempt ends. If the guard is dropped
/// without that (panic, cancelled future), the file is removed synchronously
/// in `Drop`.
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    removed: bool,
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file. Failures are logged, never returned: by the
    /// time this runs the conversion outcome is already decided.
    pub async fn remove(mut self) {
        self.removed = true;
        if let Err(e) = remove_if_exists(&self.path).await {
            warn!("Failed to remove staged input {}: {}", self.path.display(), e);
        } else {
            debug!("Removed staged input {}", self.path.display());
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed staged input {} on drop", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove staged input {}: {}", self.path.display(), e),
        }
    }
}
