//! Trust policy for schema locations
//!
//! A single deny-list marker identifies the regulator's externally hosted
//! common-types location. The matching rule lives in [`matches_marker`]
//! and is shared by the rewriter, the post-rewrite verifier and the
//! operator path preflight.

use std::path::Path;

/// Path segment of the regulator's versioned common-types distribution
pub const FORBIDDEN_MARKER: &str = "/CommonTypes/v14/";

/// Check whether `value` contains `marker`
///
/// Matching is a case-sensitive substring test against the marker in both
/// its forward-slash form and its backslash form. The marker is given in
/// forward-slash form.
pub fn matches_marker(value: &str, marker: &str) -> bool {
    if marker.is_empty() {
        return false;
    }
    if value.contains(marker) {
        return true;
    }
    let backslashed = marker.replace('/', "\\");
    value.contains(&backslashed)
}

/// Deny-list policy evaluated for every schema location and operator path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationPolicy {
    marker: String,
}

impl LocationPolicy {
    /// Policy for the regulator's v14 common-types distribution
    pub fn regulator_default() -> Self {
        Self::with_marker(FORBIDDEN_MARKER)
    }

    /// Policy for an arbitrary marker (forward-slash form)
    pub fn with_marker(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into().replace('\\', "/"),
        }
    }

    /// The marker in forward-slash form
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Whether a schema location must be redirected to the trusted directory
    pub fn is_forbidden(&self, location: &str) -> bool {
        matches_marker(location, &self.marker)
    }

    /// Whether an operator-supplied path is rejected outright
    pub fn is_forbidden_path(&self, path: &Path) -> bool {
        self.is_forbidden(&path.to_string_lossy())
    }
}

impl Default for LocationPolicy {
    fn default() -> Self {
        Self::regulator_default()
    }
}
