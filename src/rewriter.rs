//! In-memory schema location rewriting
//!
//! The regulator's schemas reference their common types at the location
//! they are hosted at. The official files must not be edited, so the
//! references are redirected in the parsed tree to the approved local
//! copies before compilation. [`verify`] then re-walks the rewritten tree
//! as an independent check that nothing forbidden survived.

use crate::documents::{Document, Element};
use crate::error::{Error, Result};
use crate::locations::file_name_of;
use crate::policy::LocationPolicy;
use crate::trusted::TrustedSchemaDirectory;

/// Local names of XSD elements that pull in other schema documents
pub const REFERENCE_ELEMENTS: &[&str] = &["import", "include", "redefine"];

/// Name of the attribute carrying the location hint
pub const SCHEMA_LOCATION: &str = "schemaLocation";

/// Kind of cross-schema reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// `xs:import`
    Import,
    /// `xs:include`
    Include,
    /// `xs:redefine`
    Redefine,
}

impl ReferenceKind {
    /// Classify an element, if it is a cross-schema reference
    pub fn of(element: &Element) -> Option<Self> {
        if element.is_xsd("import") {
            Some(Self::Import)
        } else if element.is_xsd("include") {
            Some(Self::Include)
        } else if element.is_xsd("redefine") {
            Some(Self::Redefine)
        } else {
            None
        }
    }
}

/// Read-only view of a cross-schema reference node
#[derive(Debug, Clone, Copy)]
pub struct SchemaReference<'a> {
    /// Which construct this is
    pub kind: ReferenceKind,
    /// The underlying element
    pub element: &'a Element,
}

impl<'a> SchemaReference<'a> {
    /// The `schemaLocation` attribute, if present
    pub fn location(&self) -> Option<&'a str> {
        self.element.get_attribute(SCHEMA_LOCATION)
    }
}

/// Every cross-schema reference in the tree, at any depth, in document order
pub fn schema_references(root: &Element) -> Vec<SchemaReference<'_>> {
    root.descendants()
        .filter_map(|element| {
            ReferenceKind::of(element).map(|kind| SchemaReference { kind, element })
        })
        .collect()
}

/// One redirected location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    /// Location before the rewrite
    pub from: String,
    /// Location after the rewrite
    pub to: String,
}

/// Audit record of a rewrite pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewriteReport {
    /// Reference nodes visited
    pub references: usize,
    /// Nodes skipped for lacking a location
    pub skipped: usize,
    /// Redirected locations in document order
    pub redirects: Vec<Redirect>,
}

/// Redirect forbidden references to the trusted directory, then verify
///
/// The tree is mutated in place and handed back. The completeness check
/// runs over the rewritten tree; a surviving forbidden location fails with
/// [`Error::RewriteIncomplete`].
pub fn rewrite(
    mut tree: Document,
    trusted: &TrustedSchemaDirectory,
    policy: &LocationPolicy,
) -> Result<Document> {
    let report = rewrite_locations(&mut tree, trusted, policy);
    tracing::info!(
        references = report.references,
        redirected = report.redirects.len(),
        "rewrote schema references in memory"
    );
    verify(&tree, policy)?;
    Ok(tree)
}

/// The rewrite pass alone, returning its audit record
pub fn rewrite_locations(
    tree: &mut Document,
    trusted: &TrustedSchemaDirectory,
    policy: &LocationPolicy,
) -> RewriteReport {
    let mut report = RewriteReport::default();

    tree.root_mut().walk_mut(&mut |element| {
        if ReferenceKind::of(element).is_none() {
            return;
        }
        report.references += 1;

        let location = match element.get_attribute(SCHEMA_LOCATION) {
            Some(loc) if !loc.trim().is_empty() => loc.to_string(),
            _ => {
                report.skipped += 1;
                return;
            }
        };
        if !policy.is_forbidden(&location) {
            return;
        }
        let Some(file_name) = file_name_of(&location) else {
            // No file name to redirect to; verify() reports it
            tracing::warn!(location = %location, "forbidden schema location has no file name");
            return;
        };

        let local = trusted.file_uri(file_name);
        tracing::debug!(from = %location, to = %local, "redirecting schema location");
        element.set_attribute(SCHEMA_LOCATION, local.clone());
        report.redirects.push(Redirect {
            from: location,
            to: local,
        });
    });

    report
}

/// Assert that no reference in the tree still matches the forbidden marker
pub fn verify(tree: &Document, policy: &LocationPolicy) -> Result<()> {
    for reference in schema_references(tree.root()) {
        let location = reference.location().unwrap_or("");
        if policy.is_forbidden(location) {
            return Err(Error::RewriteIncomplete {
                remaining_pattern: policy.marker().to_string(),
                location: location.to_string(),
            });
        }
    }
    Ok(())
}
