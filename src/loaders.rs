//! Resource loading utilities
//!
//! Loads schemas and submissions into owned [`Document`] trees through the
//! hardened parser configuration, converting I/O and syntax failures into
//! typed errors.

use std::fs;
use std::path::PathBuf;

use crate::config::ParserConfig;
use crate::documents::Document;
use crate::error::{Error, Result};

/// Where to load a document from
#[derive(Debug, Clone)]
pub enum Source {
    /// File system path
    Path(PathBuf),
    /// In-memory bytes
    Bytes(Vec<u8>),
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&std::path::Path> for Source {
    fn from(path: &std::path::Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for Source {
    fn from(bytes: Vec<u8>) -> Self {
        Source::Bytes(bytes)
    }
}

/// Load a document from `source` under `config`
///
/// `label` names the input in error messages ("Main XSD", "Submission").
/// No partial tree is ever returned.
pub fn load(source: impl Into<Source>, config: &ParserConfig, label: &str) -> Result<Document> {
    match source.into() {
        Source::Path(path) => {
            let metadata = fs::metadata(&path).map_err(|e| unreadable(label, &path, e))?;
            config
                .limits()
                .check_xml_size(metadata.len() as usize)
                .map_err(|e| Error::malformed(label, e.to_string()))?;

            let bytes = fs::read(&path).map_err(|e| unreadable(label, &path, e))?;
            tracing::debug!(label, path = %path.display(), bytes = bytes.len(), "loading document");
            Document::parse(&bytes, config, label)
        }
        Source::Bytes(bytes) => Document::parse(&bytes, config, label),
    }
}

fn unreadable(label: &str, path: &std::path::Path, err: std::io::Error) -> Error {
    Error::UnreadableSource {
        label: label.to_string(),
        path: path.to_path_buf(),
        detail: err.to_string(),
    }
}
