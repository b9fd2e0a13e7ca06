//! Document Validation
//!
//! Walks an instance document against the component arena. Each element is
//! matched against its declaration, its type (possibly overridden by
//! `xsi:type`), its attribute uses and its content model. ID/IDREF and
//! identity constraint checks run after the walk.

use crate::diagnostics::Diagnostic;
use crate::documents::{Document, Element};
use crate::namespaces::{QName, XSI_NAMESPACE};

use super::attributes::AttributeUses;
use super::builtins::AtomicValue;
use super::complex_types::{is_derived_from, ComplexContent, XsdComplexType};
use super::elements::XsdElement;
use super::globals::{ElementId, GlobalMaps, SchemaComponents, TypeId, XsdType};
use super::models::{expected_clause, Matched, ModelVisitor};
use super::simple_types::{self, IdRole};
use super::validation::{Binding, ValidationContext};
use super::wildcards::ProcessContents;

/// Validate a document, returning every diagnostic in document order
pub fn validate_document(components: &SchemaComponents, globals: &GlobalMaps, document: &Document) -> Vec<Diagnostic> {
    let mut validator = DocumentValidator {
        components,
        globals,
        context: ValidationContext::new(),
    };
    let root = &document.root;
    match globals.elements.get(&root.qname) {
        Some(decl) => validator.validate_element(root, *decl),
        None => validator
            .context
            .element_error(root, "No matching global declaration available for the validation root."),
    }
    validator.context.check_idrefs();
    validator.context.check_identities(components);
    validator.context.into_diagnostics()
}

struct DocumentValidator<'s, 'd> {
    components: &'s SchemaComponents,
    globals: &'s GlobalMaps,
    context: ValidationContext<'d>,
}

impl<'s, 'd> DocumentValidator<'s, 'd> {
    fn validate_element(&mut self, element: &'d Element, decl_id: ElementId) {
        let start = self.context.next_index();
        let components = self.components;
        let decl = components.element(decl_id);

        if decl.is_abstract {
            self.context
                .element_error(element, "The element declaration is abstract.");
        }

        let type_id = self.effective_type(element, decl);
        if let XsdType::Complex(ct) = components.type_def(type_id) {
            if ct.is_abstract {
                self.context
                    .element_error(element, "The type definition is abstract.");
            }
        }

        if self.is_nilled(element, decl) {
            self.check_attributes(element, type_id);
        } else {
            self.validate_content(element, type_id, Some(decl));
        }

        if !decl.identities.is_empty() {
            self.context.bindings.push(Binding {
                element,
                decl: decl_id,
                start,
                end: self.context.position(),
            });
        }
    }

    /// The declared type, or the one named by a valid `xsi:type`
    fn effective_type(&mut self, element: &'d Element, decl: &XsdElement) -> TypeId {
        let Some(name) = self.xsi_type(element) else {
            return decl.type_id;
        };
        let components = self.components;
        let mut blocked = decl.block;
        if let Some(ct) = components.type_def(decl.type_id).as_complex() {
            blocked = blocked.union_with(&ct.block);
        }
        if is_derived_from(components, name, decl.type_id, blocked) {
            name
        } else {
            self.context.attribute_error(
                element,
                "{http://www.w3.org/2001/XMLSchema-instance}type",
                format!(
                    "The type definition '{}', specified by xsi:type, is blocked or not validly derived from the type definition of the element declaration.",
                    components.type_label(name)
                ),
            );
            decl.type_id
        }
    }

    /// Resolve `xsi:type`, reporting names that do not resolve
    fn xsi_type(&mut self, element: &'d Element) -> Option<TypeId> {
        let raw = element.get_attribute_qname(&QName::namespaced(XSI_NAMESPACE, "type"))?;
        let attribute = "{http://www.w3.org/2001/XMLSchema-instance}type";
        let Ok(name) = element.namespaces.resolve(raw) else {
            self.context.attribute_error(
                element,
                attribute,
                format!("The QName value '{}' has no corresponding namespace declaration in scope.", raw.trim()),
            );
            return None;
        };
        match self.globals.types.get(&name).copied() {
            Some(id) => Some(id),
            None => {
                self.context.attribute_error(
                    element,
                    attribute,
                    format!("The QName value '{}' of the xsi:type attribute does not resolve to a type definition.", name),
                );
                None
            }
        }
    }

    /// Whether `xsi:nil="true"` applies; reports misuse
    fn is_nilled(&mut self, element: &'d Element, decl: &XsdElement) -> bool {
        let Some(raw) = element.get_attribute_qname(&QName::namespaced(XSI_NAMESPACE, "nil")) else {
            return false;
        };
        let attribute = "{http://www.w3.org/2001/XMLSchema-instance}nil";
        let nil = match raw.trim() {
            "true" | "1" => true,
            "false" | "0" => false,
            other => {
                self.context.attribute_error(
                    element,
                    attribute,
                    format!("'{}' is not a valid value of the atomic type 'xs:boolean'.", other),
                );
                return false;
            }
        };
        if !decl.nillable {
            self.context
                .element_error(element, "The element is not 'nillable'.");
            return false;
        }
        if nil && (element.has_element_children() || !element.text().is_empty()) {
            self.context.element_error(
                element,
                "The element cannot have character or element children because xsi:nil is 'true'.",
            );
        }
        if nil && decl.fixed.is_some() {
            self.context.element_error(
                element,
                "The element cannot have a fixed value constraint because xsi:nil is 'true'.",
            );
        }
        nil
    }

    fn validate_content(&mut self, element: &'d Element, type_id: TypeId, decl: Option<&XsdElement>) {
        let components = self.components;
        match components.type_def(type_id) {
            XsdType::Simple(_) => {
                self.check_attributes(element, type_id);
                if element.has_element_children() {
                    self.context.element_error(
                        element,
                        "Element content is not allowed, because the type definition is simple.",
                    );
                    return;
                }
                self.check_simple_value(element, type_id, decl);
            }
            XsdType::Complex(ct) => {
                self.check_attributes(element, type_id);
                self.check_complex_content(element, ct, decl);
            }
        }
    }

    fn check_complex_content(&mut self, element: &'d Element, ct: &'s XsdComplexType, decl: Option<&XsdElement>) {
        match &ct.content {
            ComplexContent::Empty => {
                if element.has_element_children() {
                    self.context.element_error(
                        element,
                        "Element content is not allowed, because the content type is empty.",
                    );
                } else if !element.text().is_empty() {
                    self.context.element_error(
                        element,
                        "Character content is not allowed, because the content type is empty.",
                    );
                }
            }
            ComplexContent::Simple(st) => {
                if element.has_element_children() {
                    self.context.element_error(
                        element,
                        "Element content is not allowed, because the content type is a simple type definition.",
                    );
                    return;
                }
                self.check_simple_value(element, *st, decl);
            }
            ComplexContent::Model { model, mixed } => {
                if !mixed && element.has_significant_text() {
                    self.context.element_error(
                        element,
                        "Character content other than whitespace is not allowed because the content type is 'element-only'.",
                    );
                }
                if *mixed && !element.has_element_children() {
                    if let Some(fixed) = decl.and_then(|d| d.fixed.as_deref()) {
                        let text = element.text();
                        if !text.is_empty() && text != fixed {
                            self.context.element_error(
                                element,
                                format!("The value '{}' does not match the fixed value constraint '{}'.", text, fixed),
                            );
                        }
                    }
                }

                let globals = self.globals;
                let mut visitor = ModelVisitor::new(model, self.components, &globals.substitutes);
                for child in element.child_elements() {
                    match visitor.advance(&child.qname) {
                        Ok(Matched::Element(id)) => self.validate_element(child, id),
                        Ok(Matched::Wildcard(process_contents)) => self.validate_wildcard_match(child, process_contents),
                        Err(expected) => {
                            self.context.element_error(
                                child,
                                format!("This element is not expected.{}", expected_clause(&expected)),
                            );
                            return;
                        }
                    }
                }
                if let Err(expected) = visitor.finish() {
                    self.context.element_error(
                        element,
                        format!("Missing child element(s).{}", expected_clause(&expected)),
                    );
                }
            }
        }
    }

    fn validate_wildcard_match(&mut self, element: &'d Element, process_contents: ProcessContents) {
        match process_contents {
            ProcessContents::Skip => {}
            ProcessContents::Lax => self.validate_lax(element),
            ProcessContents::Strict => match self.globals.elements.get(&element.qname).copied() {
                Some(decl) => self.validate_element(element, decl),
                None => match self.xsi_type(element) {
                    Some(type_id) => {
                        self.context.next_index();
                        self.validate_content(element, type_id, None);
                    }
                    None => self.context.element_error(
                        element,
                        "No matching global element declaration available, but demanded by the strict wildcard.",
                    ),
                },
            },
        }
    }

    /// Validate what has a declaration and descend through what has not
    fn validate_lax(&mut self, element: &'d Element) {
        if let Some(decl) = self.globals.elements.get(&element.qname).copied() {
            self.validate_element(element, decl);
            return;
        }
        self.context.next_index();
        if let Some(type_id) = self.xsi_type(element) {
            self.validate_content(element, type_id, None);
            return;
        }
        for (name, value) in &element.attributes {
            if let Some(id) = self.globals.attributes.get(name).copied() {
                let type_id = self.components.attribute(id).type_id;
                self.check_attribute_value(element, name, value, type_id, None);
            }
        }
        for child in element.child_elements() {
            self.validate_lax(child);
        }
    }

    fn check_attributes(&mut self, element: &'d Element, type_id: TypeId) {
        let components = self.components;
        let uses: Option<&'s AttributeUses> = components.type_def(type_id).as_complex().map(|ct| &ct.attributes);

        for (name, value) in &element.attributes {
            if name.namespace.as_deref() == Some(XSI_NAMESPACE)
                && matches!(
                    name.local_name.as_str(),
                    "type" | "nil" | "schemaLocation" | "noNamespaceSchemaLocation"
                )
            {
                continue;
            }
            let Some(uses) = uses else {
                self.context
                    .attribute_error(element, &name.to_string(), "The attribute is not allowed.");
                continue;
            };
            if let Some(attribute_use) = uses.get(name) {
                let decl = components.attribute(attribute_use.attribute);
                let fixed = attribute_use.fixed.as_deref().or(decl.fixed.as_deref());
                self.check_attribute_value(element, name, value, decl.type_id, fixed);
                continue;
            }
            match &uses.wildcard {
                Some(wildcard) if wildcard.is_namespace_allowed(name.namespace.as_deref()) => {
                    match (wildcard.process_contents, self.globals.attributes.get(name).copied()) {
                        (ProcessContents::Skip, _) => {}
                        (_, Some(id)) => {
                            let decl = components.attribute(id);
                            self.check_attribute_value(element, name, value, decl.type_id, decl.fixed.as_deref());
                        }
                        (ProcessContents::Strict, None) => self.context.attribute_error(
                            element,
                            &name.to_string(),
                            "No matching global attribute declaration available, but demanded by the strict wildcard.",
                        ),
                        (ProcessContents::Lax, None) => {}
                    }
                }
                _ => self
                    .context
                    .attribute_error(element, &name.to_string(), "The attribute is not allowed."),
            }
        }

        if let Some(uses) = uses {
            for (name, _) in uses.required() {
                if element.get_attribute_qname(name).is_none() {
                    self.context.element_error(
                        element,
                        format!("The attribute '{}' is required but missing.", name),
                    );
                }
            }
        }
    }

    fn check_attribute_value(
        &mut self,
        element: &'d Element,
        name: &QName,
        value: &str,
        type_id: TypeId,
        fixed: Option<&str>,
    ) {
        let label = name.to_string();
        let components = self.components;
        match simple_types::validate_value(components, type_id, value, &element.namespaces) {
            Ok(parsed) => {
                if let Some(fixed) = fixed {
                    if !fixed_matches(components, type_id, &parsed, value, fixed, element) {
                        self.context.attribute_error(
                            element,
                            &label,
                            format!("The value '{}' does not match the fixed value constraint '{}'.", value, fixed),
                        );
                    }
                }
                self.record_ids(element, Some(&label), type_id, value);
            }
            Err(message) => self.context.attribute_error(element, &label, message),
        }
    }

    /// Validate the character content of an element with a simple type
    fn check_simple_value(&mut self, element: &'d Element, type_id: TypeId, decl: Option<&XsdElement>) {
        let text = element.text();
        let value = match decl.and_then(|d| d.value_constraint()) {
            Some(constraint) if text.is_empty() => constraint.to_string(),
            _ => text,
        };
        let components = self.components;
        match simple_types::validate_value(components, type_id, &value, &element.namespaces) {
            Ok(parsed) => {
                if let Some(fixed) = decl.and_then(|d| d.fixed.as_deref()) {
                    if !fixed_matches(components, type_id, &parsed, &value, fixed, element) {
                        self.context.element_error(
                            element,
                            format!("The value '{}' does not match the fixed value constraint '{}'.", value, fixed),
                        );
                    }
                }
                self.record_ids(element, None, type_id, &value);
            }
            Err(message) => self.context.element_error(element, message),
        }
    }

    fn record_ids(&mut self, element: &'d Element, attribute: Option<&str>, type_id: TypeId, value: &str) {
        match simple_types::id_role(self.components, type_id) {
            IdRole::Id => self.context.add_id(element, attribute, value),
            IdRole::IdRef => self.context.add_idref(element, attribute, value),
            IdRole::IdRefs => {
                for token in value.split_whitespace() {
                    self.context.add_idref(element, attribute, token);
                }
            }
            IdRole::None => {}
        }
    }
}

/// Compare an actual value with a fixed constraint in the value space
fn fixed_matches(
    components: &SchemaComponents,
    type_id: TypeId,
    actual: &AtomicValue,
    raw: &str,
    fixed: &str,
    element: &Element,
) -> bool {
    match (actual, simple_types::validate_value(components, type_id, fixed, &element.namespaces)) {
        (AtomicValue::List(_), _) | (_, Err(_)) => {
            let white_space = simple_types::white_space(components, type_id);
            white_space.normalize(raw) == white_space.normalize(fixed)
        }
        (actual, Ok(expected)) => actual.same_value(&expected),
    }
}
