//! Schema location handling
//!
//! A `schemaLocation` value is untrusted text. It may be a URI, a POSIX
//! path or a Windows path. This module extracts file names from it,
//! builds canonical `file://` URIs, and classifies a location as local or
//! remote without ever dereferencing it.

use std::path::{Path, PathBuf};
use url::Url;

/// A classified schema location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// Local file system path (from a `file:` URI or a plain path)
    Path(PathBuf),
    /// Non-file URL (http, https, ftp, urn, ...); never fetched
    Remote(Url),
}

impl Location {
    /// Classify a location string relative to `base_dir`
    pub fn classify(location: &str, base_dir: &Path) -> Option<Self> {
        let location = location.trim();
        if location.is_empty() {
            return None;
        }

        if let Some(path) = windows_drive_path(location) {
            return Some(Location::Path(path));
        }

        if let Ok(url) = Url::parse(location) {
            if url.scheme() == "file" {
                return url.to_file_path().ok().map(Location::Path);
            }
            return Some(Location::Remote(url));
        }

        let normalized = location.replace('\\', "/");
        let path = Path::new(&normalized);
        if path.is_absolute() {
            Some(Location::Path(path.to_path_buf()))
        } else {
            Some(Location::Path(base_dir.join(path)))
        }
    }

    /// Check if this is a remote location (URL)
    pub fn is_remote(&self) -> bool {
        matches!(self, Location::Remote(_))
    }

    /// Get the location as a string
    pub fn as_str(&self) -> String {
        match self {
            Location::Path(p) => p.to_string_lossy().to_string(),
            Location::Remote(u) => u.to_string(),
        }
    }
}

/// `C:\...` or `C:/...` parses as a URL with scheme `c`; treat it as a path
fn windows_drive_path(location: &str) -> Option<PathBuf> {
    let bytes = location.as_bytes();
    if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/')
    {
        Some(PathBuf::from(location))
    } else {
        None
    }
}

/// Extract the final path segment of a location string
///
/// Works for URIs, POSIX paths and Windows paths alike. Query strings
/// and fragments are dropped. Returns `None` when the location ends in a
/// separator or has no segment.
pub fn file_name_of(location: &str) -> Option<&str> {
    let location = location.trim();
    let location = location.split(['?', '#']).next().unwrap_or(location);
    let segment = location.rsplit(['/', '\\']).next()?;
    if segment.is_empty() || segment == "." || segment == ".." {
        None
    } else {
        Some(segment)
    }
}

/// Build a `file://` URI for an absolute path
pub fn file_uri(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(|u| u.to_string())
}
