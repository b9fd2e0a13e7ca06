//! Deterministic XML serialization
//!
//! Writes a [`Document`] back to UTF-8 bytes with an XML declaration.
//! Namespace declarations are emitted where the source made them, so a
//! re-parse produces the same names, namespaces and attribute order.

use std::borrow::Cow;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::escape::escape;
use quick_xml::Writer;

use crate::documents::{Document, Element, Node};
use crate::error::{Error, Result};
use crate::namespaces::NamespaceContext;

/// Serialize a document to UTF-8 bytes
pub fn to_bytes(doc: &Document) -> Result<Vec<u8>> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(|e| Error::Serialize(e.to_string()))?;
    writer
        .write_event(Event::Text(BytesText::new("\n")))
        .map_err(|e| Error::Serialize(e.to_string()))?;
    write_element(&mut writer, &doc.root)?;
    Ok(writer.into_inner())
}

fn qualified(prefix: Option<&str>, local: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}:{}", p, local),
        _ => local.to_string(),
    }
}

/// Pick the prefix to write for an element name
fn element_prefix<'a>(element: &'a Element, scope: &'a NamespaceContext) -> Option<&'a str> {
    let namespace = element.namespace()?;
    if let Some(ref prefix) = element.prefix {
        if scope.get_namespace(prefix) == Some(namespace) {
            return Some(prefix.as_str());
        }
    }
    if scope.get_default_namespace() == Some(namespace) {
        return None;
    }
    scope.prefix_for(namespace)
}

/// Escape an attribute value so a re-parse yields the same characters
///
/// Attribute-value normalisation would turn literal tab, newline and
/// carriage return into spaces, so those are written as character
/// references.
fn escape_attribute(value: &str) -> String {
    escape(value)
        .replace('\t', "&#9;")
        .replace('\n', "&#10;")
        .replace('\r', "&#13;")
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &Element) -> Result<()> {
    let scope = &element.namespaces;
    let name = qualified(element_prefix(element, scope), element.local_name());
    let mut start = BytesStart::new(name.clone());

    for decl in &element.declarations {
        let key = match decl.prefix {
            Some(ref p) => format!("xmlns:{}", p),
            None => "xmlns".to_string(),
        };
        push_attribute(&mut start, &key, &decl.uri);
    }

    for (qname, value) in &element.attributes {
        let prefix = qname
            .namespace
            .as_deref()
            .and_then(|ns| scope.prefix_for(ns));
        let key = qualified(prefix, &qname.local_name);
        push_attribute(&mut start, &key, value);
    }

    if element.children.is_empty() {
        return writer
            .write_event(Event::Empty(start))
            .map_err(|e| Error::Serialize(e.to_string()));
    }

    writer
        .write_event(Event::Start(start))
        .map_err(|e| Error::Serialize(e.to_string()))?;
    for node in &element.children {
        match node {
            Node::Element(child) => write_element(writer, child)?,
            Node::Text(text) => writer
                .write_event(Event::Text(BytesText::new(text)))
                .map_err(|e| Error::Serialize(e.to_string()))?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(|e| Error::Serialize(e.to_string()))
}

fn push_attribute(start: &mut BytesStart<'_>, key: &str, value: &str) {
    let escaped = escape_attribute(value);
    start.push_attribute(Attribute {
        key: quick_xml::name::QName(key.as_bytes()),
        value: Cow::Owned(escaped.into_bytes()),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn round_trip(xml: &str) -> (Document, Document, String) {
        let original = Document::from_string(xml).unwrap();
        let bytes = to_bytes(&original).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let reparsed = Document::from_string(&text).unwrap();
        (original, reparsed, text)
    }

    #[test]
    fn test_declaration_is_written() {
        let (_, _, text) = round_trip("<root/>");
        assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(text.contains("<root/>"));
    }

    #[test]
    fn test_namespaces_survive() {
        let xml = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:ct="urn:ct"><xs:import namespace="urn:ct" schemaLocation="a.xsd"/></xs:schema>"#;
        let (original, reparsed, text) = round_trip(xml);
        assert!(text.contains("xmlns:xs=\"http://www.w3.org/2001/XMLSchema\""));
        assert!(text.contains("<xs:import "));
        assert_eq!(original.root.qname, reparsed.root.qname);
        assert_eq!(original.root.namespaces, reparsed.root.namespaces);
    }

    #[test]
    fn test_special_characters_are_escaped() {
        let xml = "<root a=\"x &amp; &lt;y&gt; &quot;q&quot; &#10;n\">1 &lt; 2 &amp; 3</root>";
        let (original, reparsed, _) = round_trip(xml);
        assert_eq!(original.root.get_attribute("a"), Some("x & <y> \"q\" \nn"));
        assert_eq!(original.root.attributes, reparsed.root.attributes);
        assert_eq!(reparsed.root.text(), "1 < 2 & 3");
    }

    #[test]
    fn test_default_namespace_undeclaration() {
        let xml = r#"<root xmlns="urn:a"><inner xmlns=""><leaf/></inner></root>"#;
        let (_, reparsed, _) = round_trip(xml);
        let inner = reparsed.root.child_elements().next().unwrap();
        assert_eq!(inner.namespace(), None);
        assert_eq!(inner.child_elements().next().unwrap().namespace(), None);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let doc = Document::from_string(r#"<r z="1" a="2"><c>t</c></r>"#).unwrap();
        assert_eq!(to_bytes(&doc).unwrap(), to_bytes(&doc).unwrap());
    }

    #[test]
    fn test_prefixed_attribute() {
        let xml = r#"<r xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:nil="true"/>"#;
        let (_, _, text) = round_trip(xml);
        assert!(text.contains("xsi:nil=\"true\""));
    }
}
