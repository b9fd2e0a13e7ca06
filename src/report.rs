//! Run reports
//!
//! Renders the result of [`pipeline::run`](crate::pipeline::run) as the
//! operator-facing text report or as JSON.

use serde::Serialize;
use std::fmt;

use crate::diagnostics::Diagnostic;
use crate::error::{Error, Result};
use crate::validate::ValidationOutcome;

/// Output format of a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object
    Json,
}

/// Serializable summary of one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report<'a> {
    /// `conformant`, `non_conformant` or `error`
    pub outcome: &'static str,
    /// Error message for operational failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Validation or compilation diagnostics
    pub diagnostics: &'a [Diagnostic],
}

impl<'a> Report<'a> {
    /// Summarize a run result
    pub fn new(result: &'a Result<ValidationOutcome>) -> Self {
        match result {
            Ok(ValidationOutcome::Conformant) => Self {
                outcome: "conformant",
                error: None,
                diagnostics: &[],
            },
            Ok(ValidationOutcome::NonConformant(diagnostics)) => Self {
                outcome: "non_conformant",
                error: None,
                diagnostics,
            },
            Err(err) => Self {
                outcome: "error",
                error: Some(err.to_string()),
                diagnostics: err.diagnostics(),
            },
        }
    }

    /// Render in the requested format
    pub fn render(&self, format: Format) -> Result<String> {
        match format {
            Format::Text => Ok(self.to_string()),
            Format::Json => {
                serde_json::to_string_pretty(self).map_err(|e| Error::Serialize(e.to_string()))
            }
        }
    }
}

fn write_diagnostics(f: &mut fmt::Formatter<'_>, diagnostics: &[Diagnostic]) -> fmt::Result {
    for (i, diagnostic) in diagnostics.iter().enumerate() {
        writeln!(f, "  {:>2}. {}", i + 1, diagnostic)?;
    }
    Ok(())
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.outcome, &self.error) {
            ("conformant", _) => writeln!(f, "[OK] Submission conforms to the FSA029 schema."),
            (_, Some(error)) if self.diagnostics.is_empty() => writeln!(f, "[Error] {}", error),
            (_, Some(error)) => {
                writeln!(f, "[Error] {}:", error)?;
                write_diagnostics(f, self.diagnostics)
            }
            (_, None) => {
                writeln!(f, "[Error] Issues:")?;
                write_diagnostics(f, self.diagnostics)
            }
        }
    }
}
