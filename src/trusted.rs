//! Trusted schema directory
//!
//! The operator-supplied directory holding the approved local copies of
//! the regulator's schemas. Construction verifies that it exists and is a
//! directory; the stored path is canonical so containment checks cannot be
//! fooled by `..` segments or symlinks.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::locations;

/// A verified directory of approved schema files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedSchemaDirectory {
    root: PathBuf,
}

impl TrustedSchemaDirectory {
    /// Verify and canonicalise `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_dir() {
            return Err(Error::NotADirectory(path.to_path_buf()));
        }
        let root = path.canonicalize().map_err(|e| Error::UnreadableSource {
            label: "Schema directory".to_string(),
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Ok(Self { root })
    }

    /// Canonical directory path
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Path of a file name inside the directory
    pub fn join(&self, file_name: &str) -> PathBuf {
        self.root.join(file_name)
    }

    /// Canonical `file://` URI for a file name inside the directory
    pub fn file_uri(&self, file_name: &str) -> String {
        let path = self.join(file_name);
        locations::file_uri(&path).unwrap_or_else(|| path.to_string_lossy().to_string())
    }

    /// Whether a path canonicalises to a location inside the directory
    ///
    /// Paths that cannot be canonicalised (for example missing files) are
    /// not contained.
    pub fn contains(&self, path: &Path) -> bool {
        match path.canonicalize() {
            Ok(canonical) => canonical.starts_with(&self.root),
            Err(_) => false,
        }
    }
}
