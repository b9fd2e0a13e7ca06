//! XSD Document Collection
//!
//! Gathers every schema document a compilation needs, starting from the
//! root schema tree and following `import`, `include` and `redefine`
//! references with a worklist. Resolution never leaves the trusted schema
//! directory and never touches the network: remote locations and paths
//! that escape the directory become diagnostics, not loads.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use crate::config::ParserConfig;
use crate::diagnostics::Diagnostic;
use crate::documents::{Document, Element};
use crate::error::Error;
use crate::loaders;
use crate::locations::Location;
use crate::namespaces::{XML_NAMESPACE, XSD_NAMESPACE};
use crate::trusted::TrustedSchemaDirectory;

use super::complex_types::DerivationFlags;

/// XSD element local names
pub(crate) mod xsd_elements {
    pub const SCHEMA: &str = "schema";
    pub const ELEMENT: &str = "element";
    pub const COMPLEX_TYPE: &str = "complexType";
    pub const SIMPLE_TYPE: &str = "simpleType";
    pub const ATTRIBUTE: &str = "attribute";
    pub const ATTRIBUTE_GROUP: &str = "attributeGroup";
    pub const GROUP: &str = "group";
    pub const SEQUENCE: &str = "sequence";
    pub const CHOICE: &str = "choice";
    pub const ALL: &str = "all";
    pub const ANNOTATION: &str = "annotation";
    pub const IMPORT: &str = "import";
    pub const INCLUDE: &str = "include";
    pub const REDEFINE: &str = "redefine";
    pub const NOTATION: &str = "notation";
    pub const RESTRICTION: &str = "restriction";
    pub const EXTENSION: &str = "extension";
    pub const LIST: &str = "list";
    pub const UNION: &str = "union";
    pub const COMPLEX_CONTENT: &str = "complexContent";
    pub const SIMPLE_CONTENT: &str = "simpleContent";
    pub const ANY: &str = "any";
    pub const ANY_ATTRIBUTE: &str = "anyAttribute";
    pub const UNIQUE: &str = "unique";
    pub const KEY: &str = "key";
    pub const KEYREF: &str = "keyref";
    pub const SELECTOR: &str = "selector";
    pub const FIELD: &str = "field";
}

/// Form default for local declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormDefault {
    /// Local names are in the target namespace
    Qualified,
    /// Local names have no namespace
    #[default]
    Unqualified,
}

impl FormDefault {
    /// Parse a `form`, `elementFormDefault` or `attributeFormDefault` value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qualified" => Some(Self::Qualified),
            "unqualified" => Some(Self::Unqualified),
            _ => None,
        }
    }

    /// Whether local names take the target namespace
    pub fn is_qualified(&self) -> bool {
        matches!(self, Self::Qualified)
    }
}

/// One schema document taking part in a compilation
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    /// Label used as the source of diagnostics
    pub location: String,
    /// Directory relative references resolve against
    pub base_dir: PathBuf,
    /// The `xs:schema` element
    pub root: Element,
    /// Effective target namespace
    pub target_namespace: Option<String>,
    /// Included without a target namespace into one that has one
    pub chameleon: bool,
    /// elementFormDefault
    pub element_form: FormDefault,
    /// attributeFormDefault
    pub attribute_form: FormDefault,
    /// blockDefault
    pub block_default: DerivationFlags,
    /// finalDefault
    pub final_default: DerivationFlags,
}

impl SchemaDocument {
    pub(crate) fn new(root: Element, location: String, base_dir: PathBuf, inherited_namespace: Option<String>) -> Self {
        let declared = root.get_attribute("targetNamespace").map(str::to_string);
        let chameleon = declared.is_none() && inherited_namespace.is_some();
        let target_namespace = declared.or(inherited_namespace);
        let form = |name: &str| {
            root.get_attribute(name)
                .and_then(FormDefault::parse)
                .unwrap_or_default()
        };
        let element_form = form("elementFormDefault");
        let attribute_form = form("attributeFormDefault");
        let flags = |name: &str| {
            root.get_attribute(name)
                .map(DerivationFlags::from_attr)
                .unwrap_or_default()
        };
        let block_default = flags("blockDefault");
        let final_default = flags("finalDefault");

        Self {
            location,
            base_dir,
            root,
            target_namespace,
            chameleon,
            element_form,
            attribute_form,
            block_default,
            final_default,
        }
    }

    /// Diagnostic positioned at `element` within this document
    pub fn diagnostic(&self, element: &Element, message: impl Into<String>) -> Diagnostic {
        Diagnostic::at(element.position, message).with_source(self.location.clone())
    }

    /// Top-level XSD children, skipping annotations
    pub fn components(&self) -> impl Iterator<Item = &Element> {
        self.root
            .child_elements()
            .filter(|e| e.namespace() == Some(XSD_NAMESPACE) && e.local_name() != xsd_elements::ANNOTATION)
    }
}

/// Why a document was pulled in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    Import,
    Include,
    Redefine,
}

/// Pending schema work item for the worklist
struct PendingSchemaWork {
    /// Canonical path of the schema file
    path: PathBuf,
    /// Namespace an include or redefine inherits
    parent_namespace: Option<String>,
    /// Index of the referencing document
    referrer: usize,
    /// The referencing element, for positions
    reference: Element,
    /// Namespace an import expects
    expected_namespace: Option<Option<String>>,
}

/// Collects the documents of one compilation
pub struct SchemaCollector<'a> {
    config: &'a ParserConfig,
    trusted: &'a TrustedSchemaDirectory,
    documents: Vec<SchemaDocument>,
    loaded: HashSet<(PathBuf, Option<String>)>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> SchemaCollector<'a> {
    /// Create a collector resolving inside `trusted`
    pub fn new(config: &'a ParserConfig, trusted: &'a TrustedSchemaDirectory) -> Self {
        Self {
            config,
            trusted,
            documents: Vec::new(),
            loaded: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Collect the root document and everything it references
    ///
    /// The root counts as living in the trusted directory. Documents come
    /// back in discovery order, root first.
    pub fn collect(mut self, root: Document, location: &str) -> (Vec<SchemaDocument>, Vec<Diagnostic>) {
        let root = root.root;
        if !root.is_xsd(xsd_elements::SCHEMA) {
            self.diagnostics.push(
                Diagnostic::at(
                    root.position,
                    format!(
                        "Element '{}': The document is not a schema document because the root element is not a schema.",
                        root.qname
                    ),
                )
                .with_source(location),
            );
            return (self.documents, self.diagnostics);
        }

        let base_dir = self.trusted.path().to_path_buf();
        let root_path = base_dir.join(location);
        let root_path = root_path.canonicalize().unwrap_or(root_path);
        self.documents
            .push(SchemaDocument::new(root, location.to_string(), base_dir, None));
        // The root was parsed from memory but still occupies its file
        self.loaded
            .insert((root_path, self.documents[0].target_namespace.clone()));

        let mut pending: VecDeque<PendingSchemaWork> = VecDeque::new();
        self.queue_references(0, &mut pending);

        while let Some(work) = pending.pop_front() {
            let key = (work.path.clone(), work.parent_namespace.clone());
            if !self.loaded.insert(key) {
                continue;
            }
            if let Err(e) = self.config.limits().check_schema_documents(self.documents.len() + 1) {
                let diag = self.documents[work.referrer].diagnostic(&work.reference, e.to_string());
                self.diagnostics.push(diag);
                break;
            }

            let Some(index) = self.load(&work) else {
                continue;
            };
            self.queue_references(index, &mut pending);
        }

        tracing::debug!(documents = self.documents.len(), "collected schema documents");
        (self.documents, self.diagnostics)
    }

    fn queue_references(&mut self, index: usize, pending: &mut VecDeque<PendingSchemaWork>) {
        let references: Vec<(ReferenceKind, Element)> = self.documents[index]
            .components()
            .filter_map(|e| {
                let kind = match e.local_name() {
                    xsd_elements::IMPORT => ReferenceKind::Import,
                    xsd_elements::INCLUDE => ReferenceKind::Include,
                    xsd_elements::REDEFINE => ReferenceKind::Redefine,
                    _ => return None,
                };
                Some((kind, e.clone()))
            })
            .collect();

        for (kind, reference) in references {
            let document = &self.documents[index];
            let mut expected_namespace = None;
            let parent_namespace = match kind {
                ReferenceKind::Import => {
                    let namespace = reference.get_attribute("namespace").map(str::to_string);
                    if namespace == document.target_namespace {
                        let diag = document.diagnostic(
                            &reference,
                            format!(
                                "Element '{}': The value of the attribute 'namespace' must not match the target namespace '{}' of the importing schema.",
                                reference.qname,
                                namespace.as_deref().unwrap_or("")
                            ),
                        );
                        self.diagnostics.push(diag);
                        continue;
                    }
                    if namespace.as_deref() == Some(XML_NAMESPACE) {
                        // Built in
                        continue;
                    }
                    expected_namespace = Some(namespace.clone());
                    namespace
                }
                ReferenceKind::Include | ReferenceKind::Redefine => document.target_namespace.clone(),
            };

            let Some(location) = reference.get_attribute("schemaLocation").map(str::to_string) else {
                if kind != ReferenceKind::Import {
                    let diag = document.diagnostic(
                        &reference,
                        format!("Element '{}': The attribute 'schemaLocation' is required but missing.", reference.qname),
                    );
                    self.diagnostics.push(diag);
                }
                continue;
            };

            match self.resolve(index, &reference, &location) {
                Some(path) => pending.push_back(PendingSchemaWork {
                    path,
                    parent_namespace,
                    referrer: index,
                    reference,
                    expected_namespace,
                }),
                None => continue,
            }
        }
    }

    /// Resolve a schemaLocation to a canonical path inside the trusted directory
    fn resolve(&mut self, index: usize, reference: &Element, location: &str) -> Option<PathBuf> {
        let document = &self.documents[index];
        let fail = |detail: String| {
            document.diagnostic(
                reference,
                format!(
                    "Element '{}': Failed to load the document '{}' for inclusion: {}.",
                    reference.qname, location, detail
                ),
            )
        };

        let path = match Location::classify(location, &document.base_dir) {
            None => {
                let diag = fail("empty schema location".to_string());
                self.diagnostics.push(diag);
                return None;
            }
            Some(Location::Remote(url)) => {
                tracing::warn!(location = %url, "refusing remote schema location");
                let diag = fail(format!("network access is disabled, refusing '{}'", url.scheme()));
                self.diagnostics.push(diag);
                return None;
            }
            Some(Location::Path(path)) => path,
        };

        if !path.exists() {
            let diag = fail("no such file".to_string());
            self.diagnostics.push(diag);
            return None;
        }
        if !self.trusted.contains(&path) {
            tracing::warn!(path = %path.display(), "refusing schema outside the trusted directory");
            let diag = fail(format!(
                "'{}' is outside the trusted schema directory '{}'",
                path.display(),
                self.trusted.path().display()
            ));
            self.diagnostics.push(diag);
            return None;
        }
        path.canonicalize().ok()
    }

    fn load(&mut self, work: &PendingSchemaWork) -> Option<usize> {
        let label = label_for(&work.path);
        let referrer = &self.documents[work.referrer];
        let document = match loaders::load(work.path.as_path(), self.config, &label) {
            Ok(doc) => doc,
            Err(Error::MalformedXml { detail, line, column, .. }) => {
                self.diagnostics
                    .push(Diagnostic::new(line, column, detail).with_source(label));
                return None;
            }
            Err(e) => {
                let diag = referrer.diagnostic(&work.reference, e.to_string());
                self.diagnostics.push(diag);
                return None;
            }
        };

        if !document.root().is_xsd(xsd_elements::SCHEMA) {
            let diag = Diagnostic::at(
                document.root().position,
                format!(
                    "Element '{}': The document is not a schema document because the root element is not a schema.",
                    document.root().qname
                ),
            )
            .with_source(label);
            self.diagnostics.push(diag);
            return None;
        }

        let declared = document.root().get_attribute("targetNamespace").map(str::to_string);
        match &work.expected_namespace {
            Some(expected) if declared != *expected => {
                let diag = referrer.diagnostic(
                    &work.reference,
                    format!(
                        "Element '{}': The target namespace '{}' of the imported schema '{}' differs from '{}', which is the value of the attribute 'namespace'.",
                        work.reference.qname,
                        declared.as_deref().unwrap_or(""),
                        label,
                        expected.as_deref().unwrap_or("")
                    ),
                );
                self.diagnostics.push(diag);
                return None;
            }
            None if declared.is_some() && declared != work.parent_namespace => {
                let diag = referrer.diagnostic(
                    &work.reference,
                    format!(
                        "Element '{}': The target namespace '{}' of the included/redefined schema '{}' differs from '{}', which is the target namespace of the including/redefining schema.",
                        work.reference.qname,
                        declared.as_deref().unwrap_or(""),
                        label,
                        work.parent_namespace.as_deref().unwrap_or("")
                    ),
                );
                self.diagnostics.push(diag);
                return None;
            }
            _ => {}
        }

        let inherited = if work.expected_namespace.is_some() {
            None
        } else {
            work.parent_namespace.clone()
        };
        let base_dir = work
            .path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.trusted.path().to_path_buf());
        tracing::debug!(path = %work.path.display(), "loaded referenced schema");
        self.documents
            .push(SchemaDocument::new(document.root, label, base_dir, inherited));
        Some(self.documents.len() - 1)
    }
}

fn label_for(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const XS: &str = r#"xmlns:xs="http://www.w3.org/2001/XMLSchema""#;

    fn setup(files: &[(&str, String)]) -> (tempfile::TempDir, TrustedSchemaDirectory) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        let trusted = TrustedSchemaDirectory::open(dir.path()).unwrap();
        (dir, trusted)
    }

    fn collect(trusted: &TrustedSchemaDirectory, root: &str) -> (Vec<SchemaDocument>, Vec<Diagnostic>) {
        let config = ParserConfig::hardened();
        let doc = Document::from_string(root).unwrap();
        SchemaCollector::new(&config, trusted).collect(doc, "Main.xsd")
    }

    #[test]
    fn test_import_and_include() {
        let (_dir, trusted) = setup(&[
            ("Types.xsd", format!(r#"<xs:schema {XS} targetNamespace="urn:types"/>"#)),
            ("Part.xsd", format!(r#"<xs:schema {XS}/>"#)),
        ]);
        let root = format!(
            r#"<xs:schema {XS} targetNamespace="urn:main">
  <xs:import namespace="urn:types" schemaLocation="Types.xsd"/>
  <xs:include schemaLocation="Part.xsd"/>
</xs:schema>"#
        );
        let (docs, diags) = collect(&trusted, &root);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[1].target_namespace.as_deref(), Some("urn:types"));
        assert!(!docs[1].chameleon);
        assert_eq!(docs[2].target_namespace.as_deref(), Some("urn:main"));
        assert!(docs[2].chameleon);
    }

    #[test]
    fn test_cycles_load_once() {
        let (_dir, trusted) = setup(&[
            ("A.xsd", format!(r#"<xs:schema {XS}><xs:include schemaLocation="B.xsd"/></xs:schema>"#)),
            ("B.xsd", format!(r#"<xs:schema {XS}><xs:include schemaLocation="A.xsd"/></xs:schema>"#)),
        ]);
        let root = format!(r#"<xs:schema {XS}><xs:include schemaLocation="A.xsd"/></xs:schema>"#);
        let (docs, diags) = collect(&trusted, &root);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(docs.len(), 3);
    }

    #[test]
    fn test_root_file_is_not_loaded_twice() {
        let root = format!(
            r#"<xs:schema {XS}><xs:include schemaLocation="Main.xsd"/><xs:element name="r"/></xs:schema>"#
        );
        let (_dir, trusted) = setup(&[("Main.xsd", root.clone())]);
        let (docs, diags) = collect(&trusted, &root);
        assert!(diags.is_empty(), "{diags:?}");
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn test_remote_location_refused() {
        let (_dir, trusted) = setup(&[]);
        let root = format!(
            r#"<xs:schema {XS}>
  <xs:import namespace="urn:x" schemaLocation="https://example.org/x.xsd"/>
</xs:schema>"#
        );
        let (docs, diags) = collect(&trusted, &root);
        assert_eq!(docs.len(), 1);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("network access is disabled"));
        assert_eq!(diags[0].line, Some(2));
    }

    #[test]
    fn test_escape_from_trusted_directory() {
        let outer = tempfile::tempdir().unwrap();
        let inner = outer.path().join("schemas");
        fs::create_dir(&inner).unwrap();
        fs::write(outer.path().join("Evil.xsd"), format!(r#"<xs:schema {XS}/>"#)).unwrap();
        let trusted = TrustedSchemaDirectory::open(&inner).unwrap();

        let root = format!(r#"<xs:schema {XS}><xs:include schemaLocation="../Evil.xsd"/></xs:schema>"#);
        let (docs, diags) = collect(&trusted, &root);
        assert_eq!(docs.len(), 1);
        assert!(diags[0].message.contains("outside the trusted schema directory"));
    }

    #[test]
    fn test_missing_and_malformed_references() {
        let (_dir, trusted) = setup(&[("Bad.xsd", "<xs:schema".to_string())]);
        let root = format!(
            r#"<xs:schema {XS}>
  <xs:include schemaLocation="Missing.xsd"/>
  <xs:include schemaLocation="Bad.xsd"/>
</xs:schema>"#
        );
        let (_, diags) = collect(&trusted, &root);
        assert_eq!(diags.len(), 2);
        assert!(diags[0].message.contains("no such file"));
        assert_eq!(diags[1].source.as_deref(), Some("Bad.xsd"));
    }

    #[test]
    fn test_import_namespace_mismatch() {
        let (_dir, trusted) = setup(&[("Types.xsd", format!(r#"<xs:schema {XS} targetNamespace="urn:other"/>"#))]);
        let root = format!(
            r#"<xs:schema {XS}><xs:import namespace="urn:types" schemaLocation="Types.xsd"/></xs:schema>"#
        );
        let (docs, diags) = collect(&trusted, &root);
        assert_eq!(docs.len(), 1);
        assert!(diags[0].message.contains("differs from 'urn:types'"));
    }

    #[test]
    fn test_non_schema_root() {
        let (_dir, trusted) = setup(&[]);
        let (docs, diags) = collect(&trusted, "<root/>");
        assert!(docs.is_empty());
        assert!(diags[0].message.contains("not a schema document"));
    }

    #[test]
    fn test_form_defaults() {
        let (_dir, trusted) = setup(&[]);
        let root = format!(r##"<xs:schema {XS} elementFormDefault="qualified" blockDefault="#all"/>"##);
        let (docs, _) = collect(&trusted, &root);
        assert!(docs[0].element_form.is_qualified());
        assert!(!docs[0].attribute_form.is_qualified());
        assert_eq!(docs[0].block_default, DerivationFlags::all());
    }
}
