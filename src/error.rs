//! Error types for fsa029-validate
//!
//! Every stage of the pipeline fails fast with one of these variants.
//! A document that fails validation is not an error: it is reported as
//! [`ValidationOutcome::NonConformant`](crate::validate::ValidationOutcome).

use std::path::PathBuf;
use thiserror::Error;

use crate::diagnostics::Diagnostic;

/// Result type alias using the crate [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum Error {
    /// The source could not be read (missing, permission, I/O fault)
    #[error("Cannot read {label} at {}: {detail}", path.display())]
    UnreadableSource {
        /// Human label of the input ("Main XSD", "Submission", ...)
        label: String,
        /// Path that failed to read
        path: PathBuf,
        /// Underlying I/O message
        detail: String,
    },

    /// The bytes are not well-formed XML under the hardened configuration
    #[error("{label} is not well-formed XML: {detail}")]
    MalformedXml {
        /// Human label of the input
        label: String,
        /// Parser message
        detail: String,
        /// 1-based line of the failure, when known
        line: Option<u32>,
        /// 1-based column of the failure, when known
        column: Option<u32>,
    },

    /// A forbidden schema location survived the rewrite pass
    #[error("'{remaining_pattern}' still present after rewrite (schemaLocation '{location}')")]
    RewriteIncomplete {
        /// The marker that was still found
        remaining_pattern: String,
        /// The offending schemaLocation value
        location: String,
    },

    /// The schema engine rejected the rewritten schema
    #[error("Schema compilation failed ({} issue(s))", .diagnostics.len())]
    SchemaCompilation {
        /// Every issue reported during compilation, in order
        diagnostics: Vec<Diagnostic>,
    },

    /// An operator-supplied path contains the forbidden marker
    #[error("File locations must not contain '{marker}': {}", path.display())]
    ForbiddenPath {
        /// The rejected path
        path: PathBuf,
        /// The marker found in it
        marker: String,
    },

    /// The trusted schema directory is not a directory
    #[error("Not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    /// A required input file does not exist
    #[error("Missing: {}", .0.display())]
    MissingFile(PathBuf),

    /// A processing limit was exceeded
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    /// The in-memory tree could not be serialized
    #[error("serialization error: {0}")]
    Serialize(String),
}

impl Error {
    /// Build a [`Error::MalformedXml`] without position information
    pub fn malformed(label: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::MalformedXml {
            label: label.into(),
            detail: detail.into(),
            line: None,
            column: None,
        }
    }

    /// Diagnostics carried by the error, if any
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            Error::SchemaCompilation { diagnostics } => diagnostics,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_source_display() {
        let err = Error::UnreadableSource {
            label: "Submission".to_string(),
            path: PathBuf::from("/tmp/missing.xml"),
            detail: "No such file or directory".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("Cannot read Submission"));
        assert!(msg.contains("/tmp/missing.xml"));
        assert!(msg.contains("No such file or directory"));
    }

    #[test]
    fn test_compilation_error_counts_issues() {
        let err = Error::SchemaCompilation {
            diagnostics: vec![
                Diagnostic::new(Some(3), Some(5), "first"),
                Diagnostic::new(Some(9), Some(1), "second"),
            ],
        };

        assert_eq!(err.to_string(), "Schema compilation failed (2 issue(s))");
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    fn test_rewrite_incomplete_names_pattern() {
        let err = Error::RewriteIncomplete {
            remaining_pattern: "/CommonTypes/v14/".to_string(),
            location: "../CommonTypes/v14/CommonTypes-Schema.xsd".to_string(),
        };
        assert!(err.to_string().starts_with("'/CommonTypes/v14/' still present after rewrite"));
        assert!(err.diagnostics().is_empty());
    }
}
