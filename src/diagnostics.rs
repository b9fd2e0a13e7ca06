//! Structured diagnostics
//!
//! Parsing, compilation and validation all report problems as
//! [`Diagnostic`] values. Sequences of diagnostics are kept in the order
//! they were produced and are never truncated.

use serde::Serialize;
use std::fmt;

/// A 1-based position in an XML source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct TextPosition {
    /// Line number, starting at 1
    pub line: u32,
    /// Column number, starting at 1
    pub column: u32,
}

impl TextPosition {
    /// Create a new position
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// One reported issue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Line of the offending node, when known
    pub line: Option<u32>,
    /// Column of the offending node, when known
    pub column: Option<u32>,
    /// Human readable message
    pub message: String,
    /// File or label the position refers to, when it is not the main input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic
    pub fn new(line: Option<u32>, column: Option<u32>, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
            source: None,
        }
    }

    /// Create a diagnostic anchored at a source position
    pub fn at(position: TextPosition, message: impl Into<String>) -> Self {
        Self::new(Some(position.line), Some(position.column), message)
    }

    /// Create a diagnostic without position
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(None, None, message)
    }

    /// Attach the source label
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

fn fmt_coord(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |v| v.to_string())
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}, Col {}: {}",
            fmt_coord(self.line),
            fmt_coord(self.column),
            self.message
        )?;
        if let Some(ref source) = self.source {
            write!(f, " ({})", source)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_position() {
        let diag = Diagnostic::at(TextPosition::new(12, 4), "Element 'a': bad");
        assert_eq!(diag.to_string(), "Line 12, Col 4: Element 'a': bad");
    }

    #[test]
    fn test_display_unknown_position_and_source() {
        let diag = Diagnostic::unpositioned("missing").with_source("CommonTypes-Schema.xsd");
        assert_eq!(diag.to_string(), "Line ?, Col ?: missing (CommonTypes-Schema.xsd)");
    }

    #[test]
    fn test_serialize_skips_empty_source() {
        let diag = Diagnostic::new(Some(1), None, "x");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["line"], 1);
        assert!(json["column"].is_null());
        assert!(json.get("source").is_none());
    }
}
