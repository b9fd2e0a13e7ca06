//! XML document tree
//!
//! An owned, mutable element tree built from a hardened parse. Each
//! element keeps its namespace context and source position so schema
//! compilation can resolve QName-valued attributes and every diagnostic
//! can point back at a line and column.

use indexmap::IndexMap;

use crate::config::ParserConfig;
use crate::diagnostics::TextPosition;
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::namespaces::{NamespaceContext, QName, XSD_NAMESPACE};

/// A child node of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Child element
    Element(Element),
    /// Character data (CDATA sections are merged into text)
    Text(String),
}

/// A namespace declaration made on an element
///
/// `prefix` is `None` for the default namespace. An empty `uri` with no
/// prefix undeclares the default namespace (`xmlns=""`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceDeclaration {
    /// Declared prefix
    pub prefix: Option<String>,
    /// Bound namespace URI
    pub uri: String,
}

/// XML Element in the document tree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    /// Element qualified name
    pub qname: QName,
    /// Prefix used in the source, if any
    pub prefix: Option<String>,
    /// Element attributes in document order
    pub attributes: IndexMap<QName, String>,
    /// In-scope namespace bindings
    pub namespaces: NamespaceContext,
    /// Namespace declarations made on this element
    pub declarations: Vec<NamespaceDeclaration>,
    /// Child nodes in document order
    pub children: Vec<Node>,
    /// Position of the start tag
    pub position: TextPosition,
}

impl Element {
    /// Create a new element
    pub fn new(qname: QName) -> Self {
        Self {
            qname,
            prefix: None,
            attributes: IndexMap::new(),
            namespaces: NamespaceContext::new(),
            declarations: Vec::new(),
            children: Vec::new(),
            position: TextPosition::default(),
        }
    }

    /// Get the local name of the element
    pub fn local_name(&self) -> &str {
        &self.qname.local_name
    }

    /// Get the namespace of the element
    pub fn namespace(&self) -> Option<&str> {
        self.qname.namespace.as_deref()
    }

    /// Whether this is `xs:<local_name>`
    pub fn is_xsd(&self, local_name: &str) -> bool {
        self.namespace() == Some(XSD_NAMESPACE) && self.local_name() == local_name
    }

    /// Get an unqualified attribute value
    pub fn get_attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(qname, _)| qname.namespace.is_none() && qname.local_name == name)
            .map(|(_, value)| value.as_str())
    }

    /// Get an attribute value by qualified name
    pub fn get_attribute_qname(&self, qname: &QName) -> Option<&str> {
        self.attributes.get(qname).map(|s| s.as_str())
    }

    /// Set an unqualified attribute, keeping its position if it exists
    pub fn set_attribute(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(QName::local(name), value.into());
    }

    /// Add a child element
    pub fn add_child(&mut self, child: Element) {
        self.children.push(Node::Element(child));
    }

    /// Append text content
    pub fn add_text(&mut self, text: impl Into<String>) {
        self.children.push(Node::Text(text.into()));
    }

    /// Iterate over child elements
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Iterate mutably over child elements
    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Whether the element has element children
    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// Concatenated direct text content
    pub fn text(&self) -> String {
        let mut out = String::new();
        for node in &self.children {
            if let Node::Text(t) = node {
                out.push_str(t);
            }
        }
        out
    }

    /// Whether any direct text content is not whitespace
    pub fn has_significant_text(&self) -> bool {
        self.children.iter().any(|node| match node {
            Node::Text(t) => !t.trim().is_empty(),
            Node::Element(_) => false,
        })
    }

    /// Find child elements by local name
    pub fn find_children(&self, local_name: &str) -> Vec<&Element> {
        self.child_elements()
            .filter(|e| e.local_name() == local_name)
            .collect()
    }

    /// Pre-order iterator over this element and all descendant elements
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Visit this element and all descendant elements mutably, pre-order
    pub fn walk_mut<F: FnMut(&mut Element)>(&mut self, f: &mut F) {
        f(self);
        for child in self.child_elements_mut() {
            child.walk_mut(f);
        }
    }
}

/// Pre-order element iterator, see [`Element::descendants`]
#[derive(Debug)]
pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.stack.pop()?;
        let children: Vec<&Element> = current.child_elements().collect();
        self.stack.extend(children.into_iter().rev());
        Some(current)
    }
}

/// XML Document representation
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Root element of the document
    pub root: Element,
}

impl Document {
    /// Wrap a root element
    pub fn new(root: Element) -> Self {
        Self { root }
    }

    /// Parse an XML document from a string with the hardened configuration
    pub fn from_string(xml: &str) -> Result<Self> {
        Self::parse(xml.as_bytes(), &ParserConfig::hardened(), "document")
    }

    /// Parse an XML document from bytes
    ///
    /// Document type declarations are refused unless `config` enables DTD
    /// loading (the hardened configuration never does), so only the
    /// predefined entities and character references are ever expanded.
    pub fn parse(xml: &[u8], config: &ParserConfig, label: &str) -> Result<Self> {
        let limits = config.limits();
        limits
            .check_xml_size(xml.len())
            .map_err(|e| Error::malformed(label, e.to_string()))?;

        let text = std::str::from_utf8(xml)
            .map_err(|e| Error::malformed(label, format!("document is not valid UTF-8: {}", e)))?;
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);

        let mut options = roxmltree::ParsingOptions::default();
        options.allow_dtd = config.dtd_loading_enabled();
        options.nodes_limit = limits.max_nodes;

        let doc = roxmltree::Document::parse_with_options(text, options).map_err(|e| {
            let pos = e.pos();
            let mut detail = e.to_string();
            if matches!(e, roxmltree::Error::DtdDetected) {
                detail.push_str(": document type declarations are refused, even ones without entities");
            }
            Error::MalformedXml {
                label: label.to_string(),
                detail,
                line: Some(pos.row),
                column: Some(pos.col),
            }
        })?;

        let builder = TreeBuilder {
            doc: &doc,
            input: text,
            limits,
        };
        let root = builder
            .build(doc.root_element(), &NamespaceContext::new(), 1)
            .map_err(|e| match e {
                Error::LimitExceeded(detail) => Error::malformed(label, detail),
                other => other,
            })?;

        Ok(Document { root })
    }

    /// Get the root element
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Get the root element mutably
    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    /// Serialize to UTF-8 bytes with an XML declaration
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        crate::serializer::to_bytes(self)
    }
}

/// Converts a roxmltree document into the owned tree
struct TreeBuilder<'a, 'input> {
    doc: &'a roxmltree::Document<'input>,
    input: &'input str,
    limits: &'a Limits,
}

impl<'a, 'input> TreeBuilder<'a, 'input> {
    fn build(
        &self,
        node: roxmltree::Node<'a, 'input>,
        parent_ns: &NamespaceContext,
        depth: usize,
    ) -> Result<Element> {
        self.limits.check_xml_depth(depth)?;

        let tag = node.tag_name();
        let mut element = Element::new(QName::new(namespace_uri(tag.namespace()), tag.name()));
        let start = node.range().start;
        let pos = self.doc.text_pos_at(start);
        element.position = TextPosition::new(pos.row, pos.col);
        element.prefix = self.source_prefix(start);

        let mut namespaces = NamespaceContext::new();
        let mut has_default = false;
        for ns in node.namespaces() {
            match ns.name() {
                Some("xml") => {}
                Some(prefix) => namespaces.add_prefix(prefix, ns.uri()),
                None => {
                    has_default = true;
                    namespaces.set_default_namespace(namespace_uri(Some(ns.uri())).map(str::to_string));
                }
            }
        }
        if !has_default {
            namespaces.set_default_namespace(None);
        }
        element.declarations = declarations_between(parent_ns, &namespaces);
        element.namespaces = namespaces;

        let mut count = 0;
        for attr in node.attributes() {
            count += 1;
            element
                .attributes
                .insert(QName::new(namespace_uri(attr.namespace()), attr.name()), attr.value().to_string());
        }
        self.limits.check_attributes(count)?;

        for child in node.children() {
            if child.is_element() {
                let built = self.build(child, &element.namespaces, depth + 1)?;
                element.add_child(built);
            } else if child.is_text() {
                if let Some(text) = child.text() {
                    element.add_text(text);
                }
            }
        }

        Ok(element)
    }

    /// Read the prefix of the start tag at `start` from the raw input
    fn source_prefix(&self, start: usize) -> Option<String> {
        let raw = self.input.get(start..)?.strip_prefix('<')?;
        let end = raw
            .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
            .unwrap_or(raw.len());
        raw[..end]
            .split_once(':')
            .map(|(prefix, _)| prefix.to_string())
    }
}

/// `xmlns=""` undeclares the default namespace: no namespace, not an empty one
fn namespace_uri(uri: Option<&str>) -> Option<&str> {
    uri.filter(|uri| !uri.is_empty())
}

/// Compute the declarations an element must carry given its parent's scope
fn declarations_between(
    parent: &NamespaceContext,
    current: &NamespaceContext,
) -> Vec<NamespaceDeclaration> {
    let mut out = Vec::new();
    if parent.get_default_namespace() != current.get_default_namespace() {
        out.push(NamespaceDeclaration {
            prefix: None,
            uri: current.get_default_namespace().unwrap_or("").to_string(),
        });
    }
    for (prefix, uri) in current.iter() {
        if parent.get_namespace(prefix) != Some(uri.as_str()) {
            out.push(NamespaceDeclaration {
                prefix: Some(prefix.clone()),
                uri: uri.clone(),
            });
        }
    }
    out
}
