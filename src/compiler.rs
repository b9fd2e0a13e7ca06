//! Schema compilation
//!
//! The rewritten root schema is laundered before it reaches the schema
//! engine: the tree is serialized and parsed again under the same hardened
//! configuration, and only the fresh copy is compiled. Whatever the rewrite
//! left behind in memory (mutated attributes, stale positions) never feeds
//! compilation directly.

use crate::config::{ParserConfig, MAIN_SCHEMA_FILE};
use crate::documents::Document;
use crate::error::{Error, Result};
use crate::loaders;
use crate::serializer;
use crate::trusted::TrustedSchemaDirectory;
use crate::validators::{SchemaCollector, XsdSchema};

/// Compiles a rewritten root schema against the trusted directory
#[derive(Debug, Clone, Copy)]
pub struct SchemaCompiler<'a> {
    config: &'a ParserConfig,
    trusted: &'a TrustedSchemaDirectory,
}

impl<'a> SchemaCompiler<'a> {
    /// Create a compiler resolving references inside `trusted`
    pub fn new(config: &'a ParserConfig, trusted: &'a TrustedSchemaDirectory) -> Self {
        Self { config, trusted }
    }

    /// Serialize, re-parse and compile `tree`
    ///
    /// Every issue found while collecting and building the schema documents
    /// is returned in one [`Error::SchemaCompilation`].
    pub fn compile(&self, tree: Document) -> Result<XsdSchema> {
        let bytes = serializer::to_bytes(&tree)?;
        drop(tree);
        let reparsed = loaders::load(bytes, self.config, MAIN_SCHEMA_FILE)?;

        let (documents, mut diagnostics) =
            SchemaCollector::new(self.config, self.trusted).collect(reparsed, MAIN_SCHEMA_FILE);
        if !documents.is_empty() {
            match XsdSchema::from_documents(&documents) {
                Ok(schema) if diagnostics.is_empty() => {
                    tracing::info!(documents = documents.len(), "compiled schema");
                    return Ok(schema);
                }
                Ok(_) => {}
                Err(build) => diagnostics.extend(build),
            }
        }

        tracing::info!(issues = diagnostics.len(), "schema compilation failed");
        Err(Error::SchemaCompilation { diagnostics })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const COMMON: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema"
           targetNamespace="urn:common" elementFormDefault="qualified">
  <xs:simpleType name="Amount">
    <xs:restriction base="xs:decimal"><xs:fractionDigits value="2"/></xs:restriction>
  </xs:simpleType>
</xs:schema>"#;

    fn main_schema(location: &str, amount_type: &str) -> String {
        format!(
            r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:ct="urn:common"
           targetNamespace="urn:main" elementFormDefault="qualified">
  <xs:import namespace="urn:common" schemaLocation="{location}"/>
  <xs:element name="Total" type="{amount_type}"/>
</xs:schema>"#
        )
    }

    fn setup() -> (TempDir, TrustedSchemaDirectory) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("CommonTypes-Schema.xsd"), COMMON).unwrap();
        let trusted = TrustedSchemaDirectory::open(dir.path()).unwrap();
        (dir, trusted)
    }

    fn tree(src: &str) -> Document {
        loaders::load(src.as_bytes().to_vec(), &ParserConfig::hardened(), "Main XSD").unwrap()
    }

    #[test]
    fn test_compile_with_import() {
        let (_dir, trusted) = setup();
        let config = ParserConfig::hardened();
        let location = trusted.file_uri("CommonTypes-Schema.xsd");
        let schema = SchemaCompiler::new(&config, &trusted)
            .compile(tree(&main_schema(&location, "ct:Amount")))
            .unwrap();
        assert_eq!(schema.target_namespace(), Some("urn:main"));
        assert_eq!(schema.sources().len(), 2);

        let ok = Document::from_string(r#"<Total xmlns="urn:main">12.50</Total>"#).unwrap();
        assert!(schema.is_valid(&ok));
        let bad = Document::from_string(r#"<Total xmlns="urn:main">12.505</Total>"#).unwrap();
        assert!(!schema.is_valid(&bad));
    }

    #[test]
    fn test_malformed_type_definition() {
        let (_dir, trusted) = setup();
        let config = ParserConfig::hardened();
        let err = SchemaCompiler::new(&config, &trusted)
            .compile(tree(&main_schema("CommonTypes-Schema.xsd", "ct:Missing")))
            .unwrap_err();
        let diagnostics = err.diagnostics();
        assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
        assert_eq!(diagnostics[0].line, Some(4));
        assert_eq!(diagnostics[0].source.as_deref(), Some(MAIN_SCHEMA_FILE));
        assert!(diagnostics[0].message.contains("'{urn:common}Missing'"));
    }

    #[test]
    fn test_remote_import_is_refused() {
        let (_dir, trusted) = setup();
        let config = ParserConfig::hardened();
        let err = SchemaCompiler::new(&config, &trusted)
            .compile(tree(&main_schema("https://example.org/CommonTypes/v14/CommonTypes-Schema.xsd", "ct:Amount")))
            .unwrap_err();
        assert!(matches!(err, Error::SchemaCompilation { .. }));
        assert!(err
            .diagnostics()
            .iter()
            .any(|d| d.message.contains("network access is disabled")));
    }
}
