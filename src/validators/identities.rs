//! XSD Identity Constraints
//!
//! This module implements identity constraints for XML Schema:
//! - xs:unique - Ensures values are unique within scope
//! - xs:key - Like unique, but all field values must be present
//! - xs:keyref - References a key/unique constraint (foreign key)
//!
//! Selectors and fields use the restricted XPath subset XSD 1.0 defines:
//! unions of relative child paths, optionally starting with `.//`, with a
//! final attribute step allowed in fields.

use crate::documents::Element;
use crate::namespaces::{NamespaceContext, QName};

use super::globals::ConstraintId;

/// A tuple of field values forming a composite key
pub type FieldTuple = Vec<String>;

/// Kind of identity constraint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityKind {
    /// xs:unique
    Unique,
    /// xs:key
    Key,
    /// xs:keyref, with the referenced key once resolved
    KeyRef {
        /// Name in the `refer` attribute
        refer: QName,
        /// Resolved key or unique constraint
        resolved: Option<ConstraintId>,
    },
}

impl IdentityKind {
    /// Label used in messages
    pub fn label(&self) -> &'static str {
        match self {
            IdentityKind::Unique => "unique",
            IdentityKind::Key => "key",
            IdentityKind::KeyRef { .. } => "keyref",
        }
    }
}

/// A name test in a path step
#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    /// `*`
    Any,
    /// `prefix:*`
    Namespace(Option<String>),
    /// A QName
    Name(QName),
}

impl NameTest {
    fn matches(&self, name: &QName) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Namespace(ns) => name.namespace == *ns,
            NameTest::Name(q) => q == name,
        }
    }
}

/// One `|`-separated alternative
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathExpr {
    descendant: bool,
    steps: Vec<Option<NameTest>>,
    attribute: Option<NameTest>,
}

/// A parsed selector or field expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityPath {
    source: String,
    alternatives: Vec<PathExpr>,
}

/// A value reached by a field
#[derive(Debug, Clone)]
pub enum FieldNode<'a> {
    /// An element, valued by its text
    Element(&'a Element),
    /// An attribute value
    Attribute(&'a str),
}

impl FieldNode<'_> {
    /// Whitespace-collapsed string value
    pub fn value(&self) -> String {
        let raw = match self {
            FieldNode::Element(e) => e.text(),
            FieldNode::Attribute(v) => v.to_string(),
        };
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl IdentityPath {
    /// Parse an expression; `allow_attribute` is set for fields
    pub fn parse(source: &str, namespaces: &NamespaceContext, allow_attribute: bool) -> Result<Self, String> {
        let invalid = |detail: &str| format!("The XPath expression '{}' is invalid: {}.", source, detail);
        let mut alternatives = Vec::new();

        for alternative in source.split('|') {
            let mut text = alternative.trim();
            if text.is_empty() {
                return Err(invalid("empty path"));
            }
            let mut descendant = false;
            if let Some(rest) = text.strip_prefix(".//") {
                descendant = true;
                text = rest;
            }

            let mut steps = Vec::new();
            let mut attribute = None;
            let parts: Vec<&str> = text.split('/').map(str::trim).collect();
            for (i, part) in parts.iter().enumerate() {
                let last = i + 1 == parts.len();
                let attr = part
                    .strip_prefix('@')
                    .or_else(|| part.strip_prefix("attribute::"));
                if let Some(name) = attr {
                    if !allow_attribute || !last {
                        return Err(invalid("attribute steps are only allowed at the end of a field"));
                    }
                    attribute = Some(name_test(name.trim(), namespaces).map_err(|d| invalid(&d))?);
                } else if *part == "." {
                    steps.push(None);
                } else {
                    let name = part.strip_prefix("child::").unwrap_or(part);
                    if name.is_empty() || name.contains("//") {
                        return Err(invalid("unsupported step"));
                    }
                    steps.push(Some(name_test(name, namespaces).map_err(|d| invalid(&d))?));
                }
            }
            alternatives.push(PathExpr {
                descendant,
                steps,
                attribute,
            });
        }

        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// The expression as written
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Elements reached from `context`, in document order
    pub fn select<'a>(&self, context: &'a Element) -> Vec<&'a Element> {
        let mut out: Vec<&'a Element> = Vec::new();
        for alternative in &self.alternatives {
            if alternative.attribute.is_some() {
                continue;
            }
            for element in alternative.elements(context) {
                if !out.iter().any(|e| std::ptr::eq(*e, element)) {
                    out.push(element);
                }
            }
        }
        out
    }

    /// Nodes a field reaches from a selected element
    pub fn evaluate<'a>(&self, context: &'a Element) -> Vec<FieldNode<'a>> {
        let mut out = Vec::new();
        for alternative in &self.alternatives {
            let elements = alternative.elements(context);
            match &alternative.attribute {
                None => out.extend(elements.into_iter().map(FieldNode::Element)),
                Some(test) => {
                    for element in elements {
                        for (name, value) in &element.attributes {
                            if test.matches(name) {
                                out.push(FieldNode::Attribute(value.as_str()));
                            }
                        }
                    }
                }
            }
        }
        out
    }
}

impl PathExpr {
    fn elements<'a>(&self, context: &'a Element) -> Vec<&'a Element> {
        let mut current: Vec<&'a Element> = if self.descendant {
            context.descendants().collect()
        } else {
            vec![context]
        };
        for step in &self.steps {
            current = match step {
                None => current,
                Some(test) => current
                    .into_iter()
                    .flat_map(|e| e.child_elements().filter(move |c| test.matches(&c.qname)))
                    .collect(),
            };
        }
        current
    }
}

fn name_test(text: &str, namespaces: &NamespaceContext) -> Result<NameTest, String> {
    if text == "*" {
        return Ok(NameTest::Any);
    }
    match text.split_once(':') {
        Some((prefix, "*")) => namespaces
            .get_namespace(prefix)
            .map(|ns| NameTest::Namespace(Some(ns.to_string())))
            .ok_or_else(|| format!("unknown prefix '{}'", prefix)),
        Some((_, local)) if !crate::names::is_valid_ncname(local) => {
            Err(format!("'{}' is not a name test", text))
        }
        Some((prefix, local)) => namespaces
            .get_namespace(prefix)
            .map(|ns| NameTest::Name(QName::namespaced(ns, local)))
            .ok_or_else(|| format!("unknown prefix '{}'", prefix)),
        None if crate::names::is_valid_ncname(text) => Ok(NameTest::Name(QName::local(text))),
        None => Err(format!("'{}' is not a name test", text)),
    }
}

/// An identity constraint
#[derive(Debug, Clone)]
pub struct XsdIdentity {
    /// Constraint name
    pub name: QName,
    /// unique, key or keyref
    pub kind: IdentityKind,
    /// Selects the elements the constraint applies to
    pub selector: IdentityPath,
    /// Values forming each key-sequence
    pub fields: Vec<IdentityPath>,
}

/// Format a key-sequence for messages: `['a', 'b']`
pub fn format_key(key: &FieldTuple) -> String {
    let parts: Vec<String> = key.iter().map(|v| format!("'{}'", v)).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;

    fn ns() -> NamespaceContext {
        let mut ns = NamespaceContext::new();
        ns.add_prefix("t", "urn:t");
        ns
    }

    const DOC: &str = r#"<t:root xmlns:t="urn:t">
  <t:item id="1"><t:code>A</t:code></t:item>
  <t:item id="2"><t:code> B </t:code></t:item>
  <t:group><t:item id="3"/></t:group>
</t:root>"#;

    #[test]
    fn test_child_selector() {
        let doc = Document::from_string(DOC).unwrap();
        let path = IdentityPath::parse("t:item", &ns(), false).unwrap();
        assert_eq!(path.select(doc.root()).len(), 2);
    }

    #[test]
    fn test_descendant_selector() {
        let doc = Document::from_string(DOC).unwrap();
        let path = IdentityPath::parse(".//t:item", &ns(), false).unwrap();
        assert_eq!(path.select(doc.root()).len(), 3);
        let union = IdentityPath::parse("t:item | t:group/t:item", &ns(), false).unwrap();
        assert_eq!(union.select(doc.root()).len(), 3);
    }

    #[test]
    fn test_fields() {
        let doc = Document::from_string(DOC).unwrap();
        let items = IdentityPath::parse("t:item", &ns(), false).unwrap();
        let selected = items.select(doc.root());

        let id = IdentityPath::parse("@id", &ns(), true).unwrap();
        let values: Vec<String> = id.evaluate(selected[0]).iter().map(|n| n.value()).collect();
        assert_eq!(values, vec!["1".to_string()]);

        let code = IdentityPath::parse("t:code", &ns(), true).unwrap();
        let values: Vec<String> = code.evaluate(selected[1]).iter().map(|n| n.value()).collect();
        assert_eq!(values, vec!["B".to_string()]);
    }

    #[test]
    fn test_invalid_paths() {
        assert!(IdentityPath::parse("@id", &ns(), false).is_err());
        assert!(IdentityPath::parse("x:item", &ns(), false).is_err());
        assert!(IdentityPath::parse("@id/t:code", &ns(), true).is_err());
        assert!(IdentityPath::parse("", &ns(), false).is_err());
        assert!(IdentityPath::parse("t:item[1]", &ns(), false).is_err());
    }

    #[test]
    fn test_wildcard_steps() {
        let doc = Document::from_string(DOC).unwrap();
        let any = IdentityPath::parse("*", &ns(), false).unwrap();
        assert_eq!(any.select(doc.root()).len(), 3);
        let in_ns = IdentityPath::parse("t:*", &ns(), false).unwrap();
        assert_eq!(in_ns.select(doc.root()).len(), 3);
    }

    #[test]
    fn test_format_key() {
        assert_eq!(format_key(&vec!["a".into(), "b".into()]), "['a', 'b']");
    }
}
