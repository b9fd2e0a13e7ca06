//! XML Validation Infrastructure
//!
//! Per-run state of an instance validation: collected diagnostics, the ID
//! table with pending IDREFs, and the elements that carry identity
//! constraints. Document-wide checks run once the tree walk is done.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::Diagnostic;
use crate::documents::Element;

use super::globals::{ConstraintId, ElementId, SchemaComponents};
use super::identities::{format_key, FieldTuple, IdentityKind, XsdIdentity};

/// An element validated against a declaration that has identity constraints
///
/// `start..end` is the pre-order index range of the element's subtree, used
/// to find the key tables a keyref may see.
#[derive(Debug, Clone, Copy)]
pub struct Binding<'d> {
    /// Instance element
    pub element: &'d Element,
    /// Declaration it was validated against
    pub decl: ElementId,
    /// Pre-order index of the element
    pub start: usize,
    /// One past the last index of its subtree
    pub end: usize,
}

/// Validation context for handling the validation process
#[derive(Debug, Default)]
pub struct ValidationContext<'d> {
    /// Collected validation errors
    pub diagnostics: Vec<Diagnostic>,
    /// Identity constraint scopes, in document order
    pub bindings: Vec<Binding<'d>>,
    ids: HashSet<String>,
    idrefs: Vec<(&'d Element, Option<String>, String)>,
    counter: usize,
}

impl<'d> ValidationContext<'d> {
    /// Create a new validation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a problem with an element
    pub fn element_error(&mut self, element: &Element, message: impl AsRef<str>) {
        self.diagnostics.push(Diagnostic::at(
            element.position,
            format!("Element '{}': {}", element.qname, message.as_ref()),
        ));
    }

    /// Report a problem with an attribute of an element
    pub fn attribute_error(&mut self, element: &Element, attribute: &str, message: impl AsRef<str>) {
        self.diagnostics.push(Diagnostic::at(
            element.position,
            format!(
                "Element '{}', attribute '{}': {}",
                element.qname,
                attribute,
                message.as_ref()
            ),
        ));
    }

    /// Pre-order index for the next visited element
    pub fn next_index(&mut self) -> usize {
        let index = self.counter;
        self.counter += 1;
        index
    }

    /// Index the next visited element would get
    pub fn position(&self) -> usize {
        self.counter
    }

    /// Register an ID value; `attribute` is None for element content
    pub fn add_id(&mut self, element: &'d Element, attribute: Option<&str>, value: &str) {
        let value = value.trim();
        if !self.ids.insert(value.to_string()) {
            let message = format!("Duplicate ID value '{}'.", value);
            match attribute {
                Some(attribute) => self.attribute_error(element, attribute, message),
                None => self.element_error(element, message),
            }
        }
    }

    /// Remember an IDREF value for the end-of-document check
    pub fn add_idref(&mut self, element: &'d Element, attribute: Option<&str>, value: &str) {
        self.idrefs
            .push((element, attribute.map(str::to_string), value.trim().to_string()));
    }

    /// Report IDREFs that name no ID of the document
    pub fn check_idrefs(&mut self) {
        for (element, attribute, value) in std::mem::take(&mut self.idrefs) {
            if self.ids.contains(&value) {
                continue;
            }
            let message = format!("No ID matching the IDREF value '{}'.", value);
            match attribute {
                Some(attribute) => self.attribute_error(element, &attribute, message),
                None => self.element_error(element, message),
            }
        }
    }

    /// Evaluate unique, key and keyref constraints over the recorded bindings
    pub fn check_identities(&mut self, components: &SchemaComponents) {
        let bindings = std::mem::take(&mut self.bindings);
        let mut tables: HashMap<(usize, ConstraintId), Vec<FieldTuple>> = HashMap::new();
        let mut keyrefs: Vec<(usize, ConstraintId, Vec<(&'d Element, FieldTuple)>)> = Vec::new();

        for (index, binding) in bindings.iter().enumerate() {
            for id in &components.element(binding.decl).identities {
                let identity = components.identity(*id);
                let rows = self.key_sequences(binding.element, identity);
                match identity.kind {
                    IdentityKind::KeyRef { .. } => keyrefs.push((index, *id, rows)),
                    _ => {
                        let mut table: Vec<FieldTuple> = Vec::new();
                        for (node, key) in rows {
                            if table.contains(&key) {
                                self.element_error(
                                    node,
                                    format!(
                                        "Duplicate key-sequence {} in {} identity-constraint '{}'.",
                                        format_key(&key),
                                        identity.kind.label(),
                                        identity.name
                                    ),
                                );
                            } else {
                                table.push(key);
                            }
                        }
                        tables.insert((index, *id), table);
                    }
                }
            }
        }

        for (index, id, rows) in keyrefs {
            let identity = components.identity(id);
            let IdentityKind::KeyRef {
                resolved: Some(target),
                ..
            } = identity.kind
            else {
                continue;
            };
            let scope = bindings[index];
            let visible: Vec<&FieldTuple> = tables
                .iter()
                .filter(|((owner, constraint), _)| {
                    let owner = bindings[*owner];
                    *constraint == target && owner.start >= scope.start && owner.end <= scope.end
                })
                .flat_map(|(_, table)| table.iter())
                .collect();
            for (node, key) in rows {
                if !visible.contains(&&key) {
                    self.element_error(
                        node,
                        format!(
                            "No match found for key-sequence {} of keyref '{}'.",
                            format_key(&key),
                            identity.name
                        ),
                    );
                }
            }
        }
    }

    /// Key-sequences of the nodes a constraint selects under `scope`
    ///
    /// Nodes with a missing field are left out; for a key that is an error.
    fn key_sequences(&mut self, scope: &'d Element, identity: &XsdIdentity) -> Vec<(&'d Element, FieldTuple)> {
        let mut rows = Vec::new();
        for node in identity.selector.select(scope) {
            let mut key = Vec::with_capacity(identity.fields.len());
            for field in &identity.fields {
                let values = field.evaluate(node);
                match values.as_slice() {
                    [value] => key.push(value.value()),
                    [] => break,
                    _ => {
                        self.element_error(
                            node,
                            format!(
                                "The XPath '{}' of a field of {} identity-constraint '{}' evaluates to a node-set with more than one member.",
                                field.source(),
                                identity.kind.label(),
                                identity.name
                            ),
                        );
                        break;
                    }
                }
            }
            if key.len() == identity.fields.len() {
                rows.push((node, key));
            } else if identity.kind == IdentityKind::Key {
                self.element_error(
                    node,
                    format!(
                        "Not all fields of key identity-constraint '{}' evaluate to a node.",
                        identity.name
                    ),
                );
            }
        }
        rows
    }

    /// Diagnostics in document order
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.diagnostics;
        diagnostics.sort_by_key(|d| (d.line.unwrap_or(0), d.column.unwrap_or(0)));
        diagnostics
    }
}
