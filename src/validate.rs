//! Submission validation
//!
//! Applies a compiled schema to a loaded submission. Non-conformance is an
//! outcome, not an error.

use serde::Serialize;

use crate::diagnostics::Diagnostic;
use crate::documents::Document;
use crate::validators::XsdSchema;

/// Result of validating one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "diagnostics", rename_all = "snake_case")]
pub enum ValidationOutcome {
    /// The document satisfies the schema
    Conformant,
    /// Every violation, in document order
    NonConformant(Vec<Diagnostic>),
}

impl ValidationOutcome {
    /// Whether the document satisfied the schema
    pub fn is_conformant(&self) -> bool {
        matches!(self, ValidationOutcome::Conformant)
    }

    /// The violations; empty when conformant
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            ValidationOutcome::Conformant => &[],
            ValidationOutcome::NonConformant(diagnostics) => diagnostics,
        }
    }
}

impl From<Vec<Diagnostic>> for ValidationOutcome {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        if diagnostics.is_empty() {
            ValidationOutcome::Conformant
        } else {
            ValidationOutcome::NonConformant(diagnostics)
        }
    }
}

/// Validate `document` against `schema`
///
/// Neither input is modified. Diagnostics are not deduplicated.
pub fn validate(schema: &XsdSchema, document: &Document) -> ValidationOutcome {
    let outcome = ValidationOutcome::from(schema.validate(document));
    tracing::info!(
        conformant = outcome.is_conformant(),
        diagnostics = outcome.diagnostics().len(),
        "validated submission"
    );
    outcome
}
