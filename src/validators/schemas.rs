//! XML Schema validators
//!
//! [`XsdSchema`] is the compiled, immutable result of building a set of
//! schema documents. It owns the component arena and name tables and is
//! shared read-only by any number of validations.

use std::fmt;

use crate::diagnostics::Diagnostic;
use crate::documents::Document;
use crate::namespaces::QName;

use super::builders::build_schema;
use super::document_validation::validate_document;
use super::globals::{GlobalMaps, SchemaComponents};
use super::parsing::SchemaDocument;

/// A compiled XML Schema
#[derive(Debug, Clone)]
pub struct XsdSchema {
    components: SchemaComponents,
    globals: GlobalMaps,
    target_namespace: Option<String>,
    sources: Vec<String>,
}

impl XsdSchema {
    /// Build a schema from collected documents, root document first
    ///
    /// Fails with every diagnostic found when any component is invalid.
    pub fn from_documents(documents: &[SchemaDocument]) -> Result<Self, Vec<Diagnostic>> {
        let output = build_schema(documents);
        if !output.diagnostics.is_empty() {
            return Err(output.diagnostics);
        }
        tracing::debug!(
            documents = documents.len(),
            types = output.components.types.len(),
            elements = output.globals.elements.len(),
            "built schema components"
        );
        Ok(Self {
            components: output.components,
            globals: output.globals,
            target_namespace: documents.first().and_then(|d| d.target_namespace.clone()),
            sources: documents.iter().map(|d| d.location.clone()).collect(),
        })
    }

    /// Target namespace of the root document
    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    /// Labels of the documents the schema was built from
    pub fn sources(&self) -> &[String] {
        &self.sources
    }

    /// Names of the global element declarations, sorted
    pub fn global_elements(&self) -> Vec<&QName> {
        let mut names: Vec<&QName> = self
            .globals
            .elements
            .keys()
            .filter(|name| !name.is_xsd())
            .collect();
        names.sort();
        names
    }

    /// Whether a global type of this name exists, built-ins included
    pub fn has_type(&self, name: &QName) -> bool {
        self.globals.types.contains_key(name)
    }

    /// Validate a document; an empty result means it is valid
    pub fn validate(&self, document: &Document) -> Vec<Diagnostic> {
        validate_document(&self.components, &self.globals, document)
    }

    /// Check if a document is valid
    pub fn is_valid(&self, document: &Document) -> bool {
        self.validate(document).is_empty()
    }
}

impl fmt::Display for XsdSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "XsdSchema(namespace={}, documents={})",
            self.target_namespace.as_deref().unwrap_or(""),
            self.sources.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn documents(src: &str) -> Vec<SchemaDocument> {
        let root = Document::from_string(src).unwrap().root;
        vec![SchemaDocument::new(root, "main.xsd".into(), PathBuf::from("."), None)]
    }

    const SCHEMA: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           xmlns="urn:returns" targetNamespace="urn:returns" elementFormDefault="qualified">
  <xs:element name="Return">
    <xs:complexType>
      <xs:sequence>
        <xs:element name="Firm" type="xs:string"/>
      </xs:sequence>
    </xs:complexType>
  </xs:element>
</xs:schema>"#;

    #[test]
    fn test_schema_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<XsdSchema>();
    }

    #[test]
    fn test_build_and_validate() {
        let schema = XsdSchema::from_documents(&documents(SCHEMA)).unwrap();
        assert_eq!(schema.target_namespace(), Some("urn:returns"));
        assert_eq!(schema.sources(), &["main.xsd".to_string()]);
        assert_eq!(
            schema.global_elements(),
            vec![&QName::namespaced("urn:returns", "Return")]
        );
        assert!(schema.has_type(&QName::xsd("decimal")));
        assert_eq!(schema.to_string(), "XsdSchema(namespace=urn:returns, documents=1)");

        let valid = Document::from_string(r#"<Return xmlns="urn:returns"><Firm>Acme</Firm></Return>"#).unwrap();
        assert!(schema.is_valid(&valid));

        let invalid = Document::from_string(r#"<Return xmlns="urn:returns"/>"#).unwrap();
        let diagnostics = schema.validate(&invalid);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].message,
            "Element '{urn:returns}Return': Missing child element(s). Expected is ( {urn:returns}Firm )."
        );
    }

    #[test]
    fn test_build_failure_reports_diagnostics() {
        let broken = SCHEMA.replace("xs:string", "xs:strung");
        let diagnostics = XsdSchema::from_documents(&documents(&broken)).unwrap_err();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].source.as_deref(), Some("main.xsd"));
        assert!(diagnostics[0].message.contains("does not resolve to a(n) type definition"));
    }
}
