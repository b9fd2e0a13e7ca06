//! XSD Schema Builder
//!
//! Turns collected schema documents into the component arena in three
//! passes:
//!
//! 1. register every global name (redefinitions replace the original name
//!    and keep the original component reachable for self-references)
//! 2. build declaration bodies, resolving QName references
//! 3. finalize what depends on other components: effective content and
//!    attribute uses of complex types, substitution groups, keyref targets
//!    and value constraints
//!
//! Problems never abort a pass. Each one becomes a [`Diagnostic`] and the
//! offending reference falls back to a neutral component, so a single run
//! reports every issue.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::Diagnostic;
use crate::documents::Element;
use crate::names::is_valid_ncname;
use crate::namespaces::{QName, XML_NAMESPACE, XSD_NAMESPACE};

use super::attributes::{AttributeUse, AttributeUseMode, AttributeUses, XsdAttribute, XsdAttributeGroup};
use super::builtins::{BuiltinType, FacetClass};
use super::complex_types::{is_derived_from, ComplexContent, DerivationFlags, DerivationMethod, XsdComplexType};
use super::elements::XsdElement;
use super::facets::{Bound, EnumValue, Facets, WhiteSpace};
use super::globals::{
    builtin_type_id, AttributeGroupId, AttributeId, ConstraintId, ElementId, GlobalMaps, GroupId,
    SchemaComponents, TypeId, XsdType, ANY_SIMPLE_TYPE, ANY_TYPE,
};
use super::groups::{GroupParticle, ModelType, ParticleTerm, XsdGroup};
use super::identities::{IdentityKind, IdentityPath, XsdIdentity};
use super::models::{ContentModel, ModelExpr};
use super::parsing::{xsd_elements as xs, FormDefault, SchemaDocument};
use super::particles::{parse_occurs, Occurs};
use super::patterns::XsdPattern;
use super::simple_types::{self, SimpleVariety, XsdSimpleType};
use super::wildcards::{NamespaceConstraint, ProcessContents, XsdWildcard};

/// Output of a build: the arena, its name tables and every issue found
#[derive(Debug)]
pub struct BuildOutput {
    /// Components
    pub components: SchemaComponents,
    /// Global names
    pub globals: GlobalMaps,
    /// Issues in document order
    pub diagnostics: Vec<Diagnostic>,
}

/// Build the components of a set of schema documents
pub fn build_schema(documents: &[SchemaDocument]) -> BuildOutput {
    let mut builder = SchemaBuilder::new(documents);
    builder.register_xml_namespace();
    builder.register();
    builder.register_redefinitions();
    builder.build_bodies();
    builder.finalize();
    builder.into_output()
}

/// A schema element with the document it belongs to
#[derive(Debug, Clone, Copy)]
struct Pending<'a> {
    doc: usize,
    element: &'a Element,
}

impl<'a> Pending<'a> {
    fn with(self, element: &'a Element) -> Self {
        Self {
            doc: self.doc,
            element,
        }
    }

    fn children(self) -> impl Iterator<Item = Pending<'a>> {
        self.element
            .child_elements()
            .filter(|e| e.namespace() == Some(XSD_NAMESPACE) && e.local_name() != xs::ANNOTATION)
            .map(move |e| self.with(e))
    }

    fn child(self, names: &[&str]) -> Option<Pending<'a>> {
        self.children().find(|c| names.contains(&c.element.local_name()))
    }

    fn name(self) -> &'a str {
        self.element.local_name()
    }

    fn attr(self, name: &str) -> Option<&'a str> {
        self.element.get_attribute(name)
    }
}

/// Component a redefinition's self-reference resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Original {
    Type(TypeId),
    Group(GroupId),
    AttributeGroup(AttributeGroupId),
}

/// How a complex type's content was declared, before its base is merged in
#[derive(Debug, Clone)]
enum DraftContent<'a> {
    /// complexContent, or the shorthand form
    Complex {
        particle: Option<GroupParticle>,
        mixed: bool,
    },
    /// simpleContent extension
    SimpleExtension,
    /// simpleContent restriction; facets are read once the base content is known
    SimpleRestriction {
        restriction: Pending<'a>,
        inline: Option<TypeId>,
    },
}

#[derive(Debug, Clone)]
struct ComplexDraft<'a> {
    at: Pending<'a>,
    base: TypeId,
    derivation: DerivationMethod,
    content: DraftContent<'a>,
    attributes: AttributeUses,
    attribute_groups: Vec<AttributeGroupId>,
}

/// Which declaration a value constraint belongs to
#[derive(Debug, Clone, Copy)]
enum ConstraintTarget {
    Element(ElementId),
    Attribute(AttributeId),
}

#[derive(Debug, Clone)]
struct ValueCheck<'a> {
    at: Pending<'a>,
    target: ConstraintTarget,
    attribute: &'static str,
    value: String,
}

const FACETS: &[&str] = &[
    "length",
    "minLength",
    "maxLength",
    "pattern",
    "enumeration",
    "whiteSpace",
    "maxInclusive",
    "maxExclusive",
    "minInclusive",
    "minExclusive",
    "totalDigits",
    "fractionDigits",
];

const PARTICLES: &[&str] = &[xs::GROUP, xs::ALL, xs::CHOICE, xs::SEQUENCE];

struct SchemaBuilder<'a> {
    documents: &'a [SchemaDocument],
    components: SchemaComponents,
    globals: GlobalMaps,
    diagnostics: Vec<(usize, Diagnostic)>,

    pending_types: HashMap<TypeId, Pending<'a>>,
    building: HashSet<TypeId>,
    drafts: HashMap<TypeId, ComplexDraft<'a>>,
    complex_order: Vec<TypeId>,
    finalizing: HashSet<TypeId>,
    effective_particles: HashMap<TypeId, Option<GroupParticle>>,

    element_work: Vec<(ElementId, Pending<'a>)>,
    attribute_work: Vec<(AttributeId, Pending<'a>)>,
    group_work: Vec<(GroupId, Pending<'a>)>,
    attribute_group_work: Vec<(AttributeGroupId, Pending<'a>)>,
    identity_work: Vec<(ConstraintId, Pending<'a>)>,
    value_checks: Vec<ValueCheck<'a>>,
    inherit_type: HashSet<ElementId>,

    originals: HashMap<Original, Original>,
    redefining: Vec<Option<(QName, Original)>>,
    flattened: HashSet<AttributeGroupId>,
}

impl<'a> SchemaBuilder<'a> {
    fn new(documents: &'a [SchemaDocument]) -> Self {
        Self {
            documents,
            components: SchemaComponents::with_builtins(),
            globals: GlobalMaps::with_builtins(),
            diagnostics: Vec::new(),
            pending_types: HashMap::new(),
            building: HashSet::new(),
            drafts: HashMap::new(),
            complex_order: Vec::new(),
            finalizing: HashSet::new(),
            effective_particles: HashMap::new(),
            element_work: Vec::new(),
            attribute_work: Vec::new(),
            group_work: Vec::new(),
            attribute_group_work: Vec::new(),
            identity_work: Vec::new(),
            value_checks: Vec::new(),
            inherit_type: HashSet::new(),
            originals: HashMap::new(),
            redefining: Vec::new(),
            flattened: HashSet::new(),
        }
    }

    fn into_output(self) -> BuildOutput {
        let mut diagnostics = self.diagnostics;
        diagnostics.sort_by_key(|(doc, d)| (*doc, d.line.unwrap_or(0), d.column.unwrap_or(0)));
        BuildOutput {
            components: self.components,
            globals: self.globals,
            diagnostics: diagnostics.into_iter().map(|(_, d)| d).collect(),
        }
    }

    // -------------------------------------------------------------------------
    // Diagnostics
    // -------------------------------------------------------------------------

    fn doc(&self, at: Pending<'a>) -> &'a SchemaDocument {
        let documents: &'a [SchemaDocument] = self.documents;
        &documents[at.doc]
    }

    fn error(&mut self, at: Pending<'a>, message: impl AsRef<str>) {
        let diag = self
            .doc(at)
            .diagnostic(at.element, format!("Element '{}': {}", at.element.qname, message.as_ref()));
        self.diagnostics.push((at.doc, diag));
    }

    fn attr_error(&mut self, at: Pending<'a>, attr: &str, message: impl AsRef<str>) {
        let diag = self.doc(at).diagnostic(
            at.element,
            format!("Element '{}', attribute '{}': {}", at.element.qname, attr, message.as_ref()),
        );
        self.diagnostics.push((at.doc, diag));
    }

    fn unresolved(&mut self, at: Pending<'a>, attr: &str, name: &QName, kind: &str) {
        self.attr_error(
            at,
            attr,
            format!("The QName value '{}' does not resolve to a(n) {}.", name, kind),
        );
    }

    // -------------------------------------------------------------------------
    // Attribute helpers
    // -------------------------------------------------------------------------

    fn required_attr(&mut self, at: Pending<'a>, name: &str) -> Option<&'a str> {
        let value = at.attr(name);
        if value.is_none() {
            self.error(at, format!("The attribute '{}' is required but missing.", name));
        }
        value
    }

    fn flag(&mut self, at: Pending<'a>, name: &str) -> bool {
        match at.attr(name).map(str::trim) {
            None => false,
            Some("true") | Some("1") => true,
            Some("false") | Some("0") => false,
            Some(other) => {
                self.attr_error(
                    at,
                    name,
                    format!("'{}' is not a valid value of the atomic type 'xs:boolean'.", other),
                );
                false
            }
        }
    }

    /// Resolve a QName-valued attribute in the element's namespace scope
    fn qname_attr(&mut self, at: Pending<'a>, attr: &str) -> Option<QName> {
        let raw = at.attr(attr)?;
        match at.element.namespaces.resolve(raw) {
            Ok(mut name) => {
                let doc = self.doc(at);
                if name.namespace.is_none() && doc.chameleon {
                    name.namespace = doc.target_namespace.clone();
                }
                Some(name)
            }
            Err(_) => {
                self.attr_error(
                    at,
                    attr,
                    format!("The QName value '{}' has no corresponding namespace declaration in scope.", raw.trim()),
                );
                None
            }
        }
    }

    /// Name of a global component, in the document's target namespace
    fn global_name(&mut self, at: Pending<'a>) -> Option<QName> {
        let name = self.required_attr(at, "name")?;
        if !is_valid_ncname(name) {
            self.attr_error(at, "name", format!("'{}' is not a valid value of the atomic type 'xs:NCName'.", name));
            return None;
        }
        Some(QName::new(self.doc(at).target_namespace.clone(), name))
    }

    /// Name of a local element or attribute declaration
    fn local_name(&mut self, at: Pending<'a>, default_form: FormDefault) -> Option<QName> {
        let name = self.required_attr(at, "name")?;
        if !is_valid_ncname(name) {
            self.attr_error(at, "name", format!("'{}' is not a valid value of the atomic type 'xs:NCName'.", name));
            return None;
        }
        let form = match at.attr("form") {
            Some(value) => FormDefault::parse(value).unwrap_or_else(|| {
                self.attr_error(at, "form", format!("'{}' is not a valid value of the local atomic type.", value));
                default_form
            }),
            None => default_form,
        };
        let namespace = if form.is_qualified() {
            self.doc(at).target_namespace.clone()
        } else {
            None
        };
        Some(QName::new(namespace, name))
    }

    fn derivation_flags(&mut self, at: Pending<'a>, name: &str, default: DerivationFlags) -> DerivationFlags {
        match at.attr(name) {
            Some(value) => DerivationFlags::from_attr(value),
            None => default,
        }
    }

    // -------------------------------------------------------------------------
    // Pass 1: registration
    // -------------------------------------------------------------------------

    fn register_xml_namespace(&mut self) {
        let attributes = [
            ("lang", BuiltinType::String),
            ("space", BuiltinType::NCName),
            ("base", BuiltinType::AnyUri),
            ("id", BuiltinType::Id),
        ];
        for (local, builtin) in attributes {
            let name = QName::namespaced(XML_NAMESPACE, local);
            let id = self
                .components
                .add_attribute(XsdAttribute::new(name.clone(), builtin_type_id(builtin)));
            self.globals.attributes.insert(name, id);
        }
    }

    fn register(&mut self) {
        let documents = self.documents;
        for (index, document) in documents.iter().enumerate() {
            for element in document.components() {
                let at = Pending { doc: index, element };
                match at.name() {
                    xs::IMPORT | xs::INCLUDE | xs::REDEFINE => {}
                    xs::NOTATION => {
                        if let Some(name) = self.global_name(at) {
                            self.globals.notations.insert(name);
                        }
                    }
                    _ => {
                        if let Some((_, Some(_))) = self.register_component(at) {
                            let name = at.attr("name").unwrap_or_default();
                            let message = format!("A global {} '{}' does already exist.", kind_label(at.name()), name);
                            self.error(at, message);
                        }
                    }
                }
            }
        }
    }

    /// Register one global component
    ///
    /// Returns the new component and the one previously registered under
    /// the same name, for the kinds a redefinition may replace.
    fn register_component(&mut self, at: Pending<'a>) -> Option<(Original, Option<Original>)> {
        let name = self.global_name(at)?;
        match at.name() {
            xs::SIMPLE_TYPE | xs::COMPLEX_TYPE => {
                let placeholder = if at.name() == xs::SIMPLE_TYPE {
                    XsdType::Simple(XsdSimpleType::restriction(Some(name.clone()), ANY_SIMPLE_TYPE, Facets::default()))
                } else {
                    XsdType::Complex(XsdComplexType::new(Some(name.clone())))
                };
                let id = self.components.add_type(placeholder);
                self.pending_types.insert(id, at);
                let displaced = self.globals.types.insert(name, id).map(Original::Type);
                Some((Original::Type(id), displaced))
            }
            xs::GROUP => {
                let id = self
                    .components
                    .add_group(XsdGroup::named(name.clone(), ModelType::Sequence));
                self.group_work.push((id, at));
                let displaced = self.globals.groups.insert(name, id).map(Original::Group);
                Some((Original::Group(id), displaced))
            }
            xs::ATTRIBUTE_GROUP => {
                let id = self
                    .components
                    .add_attribute_group(XsdAttributeGroup::new(name.clone()));
                self.attribute_group_work.push((id, at));
                let displaced = self
                    .globals
                    .attribute_groups
                    .insert(name, id)
                    .map(Original::AttributeGroup);
                Some((Original::AttributeGroup(id), displaced))
            }
            xs::ELEMENT => {
                let mut decl = XsdElement::new(name.clone(), ANY_TYPE);
                decl.is_global = true;
                let id = self.components.add_element(decl);
                self.element_work.push((id, at));
                if self.globals.elements.insert(name.clone(), id).is_some() {
                    self.error(at, format!("A global element declaration '{}' does already exist.", name));
                }
                None
            }
            xs::ATTRIBUTE => {
                let id = self
                    .components
                    .add_attribute(XsdAttribute::new(name.clone(), ANY_SIMPLE_TYPE));
                self.attribute_work.push((id, at));
                if self.globals.attributes.insert(name.clone(), id).is_some() {
                    self.error(at, format!("A global attribute declaration '{}' does already exist.", name));
                }
                None
            }
            _ => {
                self.error(at, "This element is not expected.");
                None
            }
        }
    }

    fn register_redefinitions(&mut self) {
        let documents = self.documents;
        for (index, document) in documents.iter().enumerate() {
            for element in document.components().filter(|e| e.local_name() == xs::REDEFINE) {
                let redefine = Pending { doc: index, element };
                for at in redefine.children() {
                    if !matches!(at.name(), xs::SIMPLE_TYPE | xs::COMPLEX_TYPE | xs::GROUP | xs::ATTRIBUTE_GROUP) {
                        self.error(at, "This element is not expected.");
                        continue;
                    }
                    match self.register_component(at) {
                        Some((replacement, Some(original))) => {
                            self.originals.insert(replacement, original);
                        }
                        Some((_, None)) => {
                            let name = at.attr("name").unwrap_or_default();
                            let message = format!(
                                "The redefined component '{}' could not be found in the redefined schema.",
                                name
                            );
                            self.error(at, message);
                        }
                        None => {}
                    }
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Pass 2: bodies
    // -------------------------------------------------------------------------

    fn build_bodies(&mut self) {
        let mut ids: Vec<TypeId> = self.pending_types.keys().copied().collect();
        ids.sort();
        for id in ids {
            self.ensure_type(id);
        }

        for i in 0..self.element_work.len() {
            let (id, at) = self.element_work[i];
            let mut decl = self.components.element(id).clone();
            self.fill_element(at, id, &mut decl, true);
            self.components.elements[id.index()] = decl;
        }

        for i in 0..self.attribute_work.len() {
            let (id, at) = self.attribute_work[i];
            let mut decl = self.components.attribute(id).clone();
            self.fill_attribute(at, id, &mut decl);
            self.components.attributes[id.index()] = decl;
        }

        for i in 0..self.group_work.len() {
            let (id, at) = self.group_work[i];
            self.enter(Original::Group(id), self.components.group(id).name.clone());
            let group = match at.child(&[xs::SEQUENCE, xs::CHOICE, xs::ALL]) {
                Some(compositor) => self.parse_compositor(compositor),
                None => {
                    self.error(at, "The content is not valid. Expected is (annotation?, (all | choice | sequence)).");
                    XsdGroup::new(ModelType::Sequence)
                }
            };
            self.redefining.pop();
            let slot = &mut self.components.groups[id.index()];
            slot.model = group.model;
            slot.particles = group.particles;
        }

        for i in 0..self.attribute_group_work.len() {
            let (id, at) = self.attribute_group_work[i];
            self.enter(
                Original::AttributeGroup(id),
                Some(self.components.attribute_group(id).name.clone()),
            );
            let (uses, refs) = self.parse_attribute_uses(at);
            self.redefining.pop();
            let slot = &mut self.components.attribute_groups[id.index()];
            slot.uses = uses;
            slot.group_refs = refs;
        }
    }

    fn enter(&mut self, component: Original, name: Option<QName>) {
        let frame = match (self.originals.get(&component), name) {
            (Some(original), Some(name)) => Some((name, *original)),
            _ => None,
        };
        self.redefining.push(frame);
    }

    /// The original component when `name` is the one being redefined
    fn self_reference(&self, name: &QName) -> Option<Original> {
        match self.redefining.last() {
            Some(Some((redefined, original))) if redefined == name => Some(*original),
            _ => None,
        }
    }

    /// Build a global type body if it has not been built yet
    fn ensure_type(&mut self, id: TypeId) {
        let Some(at) = self.pending_types.remove(&id) else {
            return;
        };
        let name = self.components.type_def(id).name().cloned();
        self.enter(Original::Type(id), name.clone());
        if at.name() == xs::SIMPLE_TYPE {
            self.building.insert(id);
            let st = self.build_simple_type(at, name);
            self.building.remove(&id);
            *self.components.type_def_mut(id) = XsdType::Simple(st);
        } else {
            self.parse_complex_type(at, id);
        }
        self.redefining.pop();
    }

    /// Resolve a type reference, building simple types on demand
    fn resolve_type(&mut self, at: Pending<'a>, attr: &str) -> Option<TypeId> {
        let name = self.qname_attr(at, attr)?;
        if attr == "base" {
            if let Some(Original::Type(original)) = self.self_reference(&name) {
                return Some(original);
            }
        }
        match self.globals.types.get(&name).copied() {
            Some(id) => Some(id),
            None => {
                self.unresolved(at, attr, &name, "type definition");
                None
            }
        }
    }

    /// Whether a type is (or will be built as) a simple type
    fn is_simple(&self, id: TypeId) -> bool {
        match self.pending_types.get(&id) {
            Some(at) => at.name() == xs::SIMPLE_TYPE,
            None => self.components.type_def(id).as_simple().is_some(),
        }
    }

    /// A simple type usable as a base, item or member
    fn simple_dependency(&mut self, at: Pending<'a>, attr: &str, id: TypeId) -> TypeId {
        if self.building.contains(&id) {
            self.attr_error(
                at,
                attr,
                format!("The type definition '{}' circularly references itself.", self.components.type_label(id)),
            );
            return ANY_SIMPLE_TYPE;
        }
        if !self.is_simple(id) {
            self.attr_error(
                at,
                attr,
                format!("The type definition '{}' is not a simple type definition.", self.components.type_label(id)),
            );
            return ANY_SIMPLE_TYPE;
        }
        self.ensure_type(id);
        id
    }

    fn anonymous_simple_type(&mut self, at: Pending<'a>) -> TypeId {
        self.redefining.push(None);
        let st = self.build_simple_type(at, None);
        self.redefining.pop();
        self.components.add_type(XsdType::Simple(st))
    }

    fn anonymous_complex_type(&mut self, at: Pending<'a>) -> TypeId {
        let id = self.components.add_type(XsdType::Complex(XsdComplexType::new(None)));
        self.redefining.push(None);
        self.parse_complex_type(at, id);
        self.redefining.pop();
        id
    }

    /// Type given by `attr` or an inline simpleType child
    fn simple_type_ref(&mut self, at: Pending<'a>, attr: &str) -> Option<TypeId> {
        let inline = at.child(&[xs::SIMPLE_TYPE]);
        match (at.attr(attr), inline) {
            (Some(_), Some(inline)) => {
                self.error(inline, format!("The attribute '{}' and the <simpleType> child are mutually exclusive.", attr));
                let id = self.resolve_type(at, attr)?;
                Some(self.simple_dependency(at, attr, id))
            }
            (Some(_), None) => {
                let id = self.resolve_type(at, attr)?;
                Some(self.simple_dependency(at, attr, id))
            }
            (None, Some(inline)) => Some(self.anonymous_simple_type(inline)),
            (None, None) => None,
        }
    }

    // -------------------------------------------------------------------------
    // Simple types
    // -------------------------------------------------------------------------

    fn build_simple_type(&mut self, at: Pending<'a>, name: Option<QName>) -> XsdSimpleType {
        let final_default = self.doc(at).final_default;
        let mut st = XsdSimpleType::restriction(name, ANY_SIMPLE_TYPE, Facets::default());
        st.final_ = self.derivation_flags(at, "final", final_default);

        let Some(derivation) = at.child(&[xs::RESTRICTION, xs::LIST, xs::UNION]) else {
            self.error(at, "The content is not valid. Expected is (annotation?, (restriction | list | union)).");
            return st;
        };

        match derivation.name() {
            xs::RESTRICTION => {
                let base = match self.simple_type_ref(derivation, "base") {
                    Some(base) => base,
                    None => {
                        if derivation.attr("base").is_none() {
                            self.error(derivation, "The attribute 'base' or a <simpleType> child is required.");
                        }
                        ANY_SIMPLE_TYPE
                    }
                };
                self.check_final(derivation, base, |f| f.restriction, "restriction");
                st.facets = self.parse_facets(derivation, base).0;
                st.variety = SimpleVariety::Restriction(base);
            }
            xs::LIST => {
                let item = self.simple_type_ref(derivation, "itemType").unwrap_or_else(|| {
                    if derivation.attr("itemType").is_none() {
                        self.error(derivation, "The attribute 'itemType' or a <simpleType> child is required.");
                    }
                    builtin_type_id(BuiltinType::String)
                });
                self.check_final(derivation, item, |f| f.list, "list");
                st.variety = SimpleVariety::List(item);
            }
            _ => {
                let mut members = Vec::new();
                if let Some(list) = derivation.attr("memberTypes") {
                    for token in list.split_whitespace() {
                        let Ok(mut name) = derivation.element.namespaces.resolve(token) else {
                            self.attr_error(
                                derivation,
                                "memberTypes",
                                format!("The QName value '{}' has no corresponding namespace declaration in scope.", token),
                            );
                            continue;
                        };
                        if name.namespace.is_none() && self.doc(at).chameleon {
                            name.namespace = self.doc(at).target_namespace.clone();
                        }
                        match self.globals.types.get(&name).copied() {
                            Some(id) => {
                                let id = self.simple_dependency(derivation, "memberTypes", id);
                                members.push(id);
                            }
                            None => self.unresolved(derivation, "memberTypes", &name, "type definition"),
                        }
                    }
                }
                for inline in derivation.children().filter(|c| c.name() == xs::SIMPLE_TYPE) {
                    members.push(self.anonymous_simple_type(inline));
                }
                if members.is_empty() {
                    self.error(derivation, "The union has no member types.");
                }
                for member in members.clone() {
                    self.check_final(derivation, member, |f| f.union, "union");
                }
                st.variety = SimpleVariety::Union(members);
            }
        }
        st
    }

    fn check_final(
        &mut self,
        at: Pending<'a>,
        base: TypeId,
        forbidden: impl Fn(&DerivationFlags) -> bool,
        method: &str,
    ) {
        let final_ = match self.components.type_def(base) {
            XsdType::Simple(st) => st.final_,
            XsdType::Complex(ct) => ct.final_,
        };
        if forbidden(&final_) {
            self.error(
                at,
                format!(
                    "The type definition '{}' does not allow derivation by {}.",
                    self.components.type_label(base),
                    method
                ),
            );
        }
    }

    /// Parse the facet children of a restriction of `base`
    ///
    /// Returns the facets and how many facet elements were present.
    fn parse_facets(&mut self, at: Pending<'a>, base: TypeId) -> (Facets, usize) {
        let mut facets = Facets::default();
        let mut count = 0;
        let family = facet_family(&self.components, base);
        let base_white_space = simple_types::white_space(&self.components, base);

        for facet in at.children() {
            let name = facet.name();
            if matches!(name, xs::SIMPLE_TYPE | xs::ATTRIBUTE | xs::ATTRIBUTE_GROUP | xs::ANY_ATTRIBUTE) {
                continue;
            }
            if !FACETS.contains(&name) {
                self.error(facet, "This element is not expected.");
                continue;
            }
            count += 1;
            if !family.admits(name) {
                self.error(
                    facet,
                    format!(
                        "The facet '{}' is not allowed on types derived from the type '{}'.",
                        name,
                        self.components.type_label(base)
                    ),
                );
                continue;
            }
            let Some(value) = self.required_attr(facet, "value") else {
                continue;
            };

            match name {
                "length" | "minLength" | "maxLength" => match value.trim().parse::<usize>() {
                    Ok(n) => match name {
                        "length" => facets.length = Some(n),
                        "minLength" => facets.min_length = Some(n),
                        _ => facets.max_length = Some(n),
                    },
                    Err(_) => self.invalid_facet(facet, value, "xs:nonNegativeInteger"),
                },
                "totalDigits" | "fractionDigits" => match value.trim().parse::<u32>() {
                    Ok(0) if name == "totalDigits" => self.invalid_facet(facet, value, "xs:positiveInteger"),
                    Ok(n) if name == "totalDigits" => facets.total_digits = Some(n),
                    Ok(n) => facets.fraction_digits = Some(n),
                    Err(_) => self.invalid_facet(facet, value, "xs:nonNegativeInteger"),
                },
                "pattern" => match XsdPattern::new(value) {
                    Ok(pattern) => facets.patterns.push(pattern),
                    Err(detail) => self.error(
                        facet,
                        format!(
                            "The value '{}' of the facet 'pattern' is not a valid regular expression: {}",
                            value, detail
                        ),
                    ),
                },
                "whiteSpace" => match WhiteSpace::parse(value.trim()) {
                    Some(ws) if ws < base_white_space => self.error(
                        facet,
                        format!("The value '{}' of the facet 'whiteSpace' is less restrictive than the base type's.", value),
                    ),
                    Some(ws) => facets.white_space = Some(ws),
                    None => self.invalid_facet(facet, value, "local atomic type"),
                },
                "enumeration" => {
                    let lexical = base_white_space.normalize(value);
                    let parsed = simple_types::validate_value(&self.components, base, value, &facet.element.namespaces);
                    if let Err(detail) = &parsed {
                        self.error(
                            facet,
                            format!("The value '{}' of the facet 'enumeration' is not valid for the base type: {}", value, detail),
                        );
                    }
                    facets.enumeration.push(EnumValue {
                        lexical,
                        value: parsed.ok(),
                    });
                }
                _ => match simple_types::validate_value(&self.components, base, value, &facet.element.namespaces) {
                    Ok(parsed) => {
                        let bound = Some(Bound {
                            lexical: value.trim().to_string(),
                            value: parsed,
                        });
                        match name {
                            "minInclusive" => facets.min_inclusive = bound,
                            "maxInclusive" => facets.max_inclusive = bound,
                            "minExclusive" => facets.min_exclusive = bound,
                            _ => facets.max_exclusive = bound,
                        }
                    }
                    Err(detail) => self.error(
                        facet,
                        format!("The value '{}' of the facet '{}' is not valid for the base type: {}", value, name, detail),
                    ),
                },
            }
        }

        for message in facets.consistency_errors() {
            self.error(at, message);
        }
        (facets, count)
    }

    fn invalid_facet(&mut self, at: Pending<'a>, value: &str, type_name: &str) {
        let kind = if type_name.starts_with("xs:") {
            format!("atomic type '{}'", type_name)
        } else {
            type_name.to_string()
        };
        self.attr_error(at, "value", format!("'{}' is not a valid value of the {}.", value, kind));
    }

    // -------------------------------------------------------------------------
    // Complex types
    // -------------------------------------------------------------------------

    fn parse_complex_type(&mut self, at: Pending<'a>, id: TypeId) {
        let doc = self.doc(at);
        let is_abstract = self.flag(at, "abstract");
        let block = self.derivation_flags(at, "block", doc.block_default);
        let final_ = self.derivation_flags(at, "final", doc.final_default);
        if let XsdType::Complex(ct) = self.components.type_def_mut(id) {
            ct.is_abstract = is_abstract;
            ct.block = block;
            ct.final_ = final_;
        }
        let mixed = self.flag(at, "mixed");

        let mut draft = ComplexDraft {
            at,
            base: ANY_TYPE,
            derivation: DerivationMethod::Restriction,
            content: DraftContent::Complex { particle: None, mixed },
            attributes: AttributeUses::default(),
            attribute_groups: Vec::new(),
        };

        if let Some(simple) = at.child(&[xs::SIMPLE_CONTENT]) {
            match simple.child(&[xs::RESTRICTION, xs::EXTENSION]) {
                Some(derivation) => {
                    draft.base = self.resolve_base(derivation);
                    if derivation.name() == xs::EXTENSION {
                        draft.derivation = DerivationMethod::Extension;
                        draft.content = DraftContent::SimpleExtension;
                    } else {
                        let inline = derivation
                            .child(&[xs::SIMPLE_TYPE])
                            .map(|inline| self.anonymous_simple_type(inline));
                        draft.content = DraftContent::SimpleRestriction {
                            restriction: derivation,
                            inline,
                        };
                    }
                    let (uses, refs) = self.parse_attribute_uses(derivation);
                    draft.attributes = uses;
                    draft.attribute_groups = refs;
                }
                None => self.error(simple, "The content is not valid. Expected is (annotation?, (restriction | extension))."),
            }
        } else if let Some(complex) = at.child(&[xs::COMPLEX_CONTENT]) {
            let mixed = match complex.attr("mixed") {
                Some(_) => self.flag(complex, "mixed"),
                None => mixed,
            };
            match complex.child(&[xs::RESTRICTION, xs::EXTENSION]) {
                Some(derivation) => {
                    draft.base = self.resolve_base(derivation);
                    if derivation.name() == xs::EXTENSION {
                        draft.derivation = DerivationMethod::Extension;
                    }
                    let particle = derivation
                        .child(PARTICLES)
                        .and_then(|p| self.parse_particle(p));
                    draft.content = DraftContent::Complex { particle, mixed };
                    let (uses, refs) = self.parse_attribute_uses(derivation);
                    draft.attributes = uses;
                    draft.attribute_groups = refs;
                }
                None => self.error(complex, "The content is not valid. Expected is (annotation?, (restriction | extension))."),
            }
        } else {
            let particle = at.child(PARTICLES).and_then(|p| self.parse_particle(p));
            draft.content = DraftContent::Complex { particle, mixed };
            let (uses, refs) = self.parse_attribute_uses(at);
            draft.attributes = uses;
            draft.attribute_groups = refs;
        }

        self.drafts.insert(id, draft);
        self.complex_order.push(id);
    }

    fn resolve_base(&mut self, at: Pending<'a>) -> TypeId {
        if at.attr("base").is_none() {
            self.error(at, "The attribute 'base' is required but missing.");
            return ANY_TYPE;
        }
        self.resolve_type(at, "base").unwrap_or(ANY_TYPE)
    }

    // -------------------------------------------------------------------------
    // Particles
    // -------------------------------------------------------------------------

    fn parse_particle(&mut self, at: Pending<'a>) -> Option<GroupParticle> {
        let occurs = match parse_occurs(at.attr("minOccurs"), at.attr("maxOccurs")) {
            Ok(occurs) => occurs,
            Err(message) => {
                self.error(at, message);
                Occurs::once()
            }
        };
        let term = match at.name() {
            xs::SEQUENCE | xs::CHOICE | xs::ALL => ParticleTerm::Group(self.parse_compositor(at)),
            xs::GROUP => ParticleTerm::GroupRef(self.group_ref(at)?),
            xs::ELEMENT => ParticleTerm::Element(self.local_element(at)?),
            xs::ANY => ParticleTerm::Any(self.parse_wildcard(at)),
            _ => {
                self.error(at, "This element is not expected.");
                return None;
            }
        };
        Some(GroupParticle::new(term, occurs))
    }

    fn parse_compositor(&mut self, at: Pending<'a>) -> XsdGroup {
        let model = ModelType::from_tag(at.name()).unwrap_or(ModelType::Sequence);
        let mut group = XsdGroup::new(model);
        for child in at.children() {
            if model == ModelType::All && child.name() != xs::ELEMENT {
                self.error(child, "This element is not expected. Expected is ( element ).");
                continue;
            }
            if let Some(particle) = self.parse_particle(child) {
                group.add_particle(particle);
            }
        }
        group
    }

    fn group_ref(&mut self, at: Pending<'a>) -> Option<GroupId> {
        if at.attr("ref").is_none() {
            self.error(at, "The attribute 'ref' is required but missing.");
            return None;
        }
        let name = self.qname_attr(at, "ref")?;
        if let Some(Original::Group(original)) = self.self_reference(&name) {
            return Some(original);
        }
        let id = self.globals.groups.get(&name).copied();
        if id.is_none() {
            self.unresolved(at, "ref", &name, "model group definition");
        }
        id
    }

    fn parse_wildcard(&mut self, at: Pending<'a>) -> XsdWildcard {
        let target_namespace = self.doc(at).target_namespace.clone();
        let namespace = match at.attr("namespace") {
            Some(value) => NamespaceConstraint::from_namespace_attr(value, target_namespace.as_deref())
                .unwrap_or_else(|detail| {
                    self.attr_error(at, "namespace", detail);
                    NamespaceConstraint::Any
                }),
            None => NamespaceConstraint::Any,
        };
        let process_contents = match at.attr("processContents") {
            Some(value) => ProcessContents::parse(value.trim()).unwrap_or_else(|| {
                self.attr_error(
                    at,
                    "processContents",
                    format!("The value '{}' is not an element of the set {{'lax', 'skip', 'strict'}}.", value),
                );
                ProcessContents::Strict
            }),
            None => ProcessContents::Strict,
        };
        XsdWildcard::new(namespace, process_contents)
    }

    // -------------------------------------------------------------------------
    // Elements
    // -------------------------------------------------------------------------

    fn local_element(&mut self, at: Pending<'a>) -> Option<ElementId> {
        if at.attr("ref").is_some() {
            let name = self.qname_attr(at, "ref")?;
            let id = self.globals.elements.get(&name).copied();
            if id.is_none() {
                self.unresolved(at, "ref", &name, "element declaration");
            }
            return id;
        }
        let element_form = self.doc(at).element_form;
        let name = self.local_name(at, element_form)?;
        let id = self.components.add_element(XsdElement::new(name, ANY_TYPE));
        let mut decl = self.components.element(id).clone();
        self.fill_element(at, id, &mut decl, false);
        self.components.elements[id.index()] = decl;
        Some(id)
    }

    fn fill_element(&mut self, at: Pending<'a>, id: ElementId, decl: &mut XsdElement, global: bool) {
        let doc = self.doc(at);
        let inline = at.child(&[xs::SIMPLE_TYPE, xs::COMPLEX_TYPE]);
        decl.type_id = match (at.attr("type"), inline) {
            (Some(_), Some(inline)) => {
                self.error(inline, "The attribute 'type' and the <simpleType>/<complexType> child are mutually exclusive.");
                self.resolve_type(at, "type").unwrap_or(ANY_TYPE)
            }
            (Some(_), None) => self.resolve_type(at, "type").unwrap_or(ANY_TYPE),
            (None, Some(inline)) if inline.name() == xs::SIMPLE_TYPE => self.anonymous_simple_type(inline),
            (None, Some(inline)) => self.anonymous_complex_type(inline),
            (None, None) => {
                if global && at.attr("substitutionGroup").is_some() {
                    self.inherit_type.insert(id);
                }
                ANY_TYPE
            }
        };

        decl.nillable = self.flag(at, "nillable");
        decl.default = at.attr("default").map(str::to_string);
        decl.fixed = at.attr("fixed").map(str::to_string);
        if decl.default.is_some() && decl.fixed.is_some() {
            self.error(at, "The attributes 'default' and 'fixed' are mutually exclusive.");
        }
        for (attribute, value) in [("default", &decl.default), ("fixed", &decl.fixed)] {
            if let Some(value) = value {
                self.value_checks.push(ValueCheck {
                    at,
                    target: ConstraintTarget::Element(id),
                    attribute,
                    value: value.clone(),
                });
            }
        }
        decl.block = self.derivation_flags(at, "block", doc.block_default);

        if global {
            decl.is_abstract = self.flag(at, "abstract");
            decl.final_ = self.derivation_flags(at, "final", doc.final_default);
            if at.attr("substitutionGroup").is_some() {
                if let Some(head) = self.qname_attr(at, "substitutionGroup") {
                    match self.globals.elements.get(&head) {
                        Some(head) => decl.substitution_group = Some(*head),
                        None => self.unresolved(at, "substitutionGroup", &head, "element declaration"),
                    }
                }
            }
        } else {
            for attr in ["abstract", "final", "substitutionGroup"] {
                if at.attr(attr).is_some() {
                    self.attr_error(at, attr, "The attribute is not allowed on a local element declaration.");
                }
            }
        }

        for constraint in at.children().filter(|c| matches!(c.name(), xs::UNIQUE | xs::KEY | xs::KEYREF)) {
            if let Some(identity) = self.parse_identity(constraint) {
                decl.identities.push(identity);
            }
        }
    }

    fn parse_identity(&mut self, at: Pending<'a>) -> Option<ConstraintId> {
        let name = self.global_name(at)?;
        let kind = match at.name() {
            xs::UNIQUE => IdentityKind::Unique,
            xs::KEY => IdentityKind::Key,
            _ => {
                self.required_attr(at, "refer")?;
                IdentityKind::KeyRef {
                    refer: self.qname_attr(at, "refer")?,
                    resolved: None,
                }
            }
        };

        let Some(selector) = at.child(&[xs::SELECTOR]) else {
            self.error(at, "The content is not valid. Expected is (annotation?, (selector, field+)).");
            return None;
        };
        let selector = self.identity_path(selector, false)?;
        let mut fields = Vec::new();
        for field in at.children().filter(|c| c.name() == xs::FIELD) {
            fields.push(self.identity_path(field, true)?);
        }
        if fields.is_empty() {
            self.error(at, "The content is not valid. Expected is (annotation?, (selector, field+)).");
            return None;
        }

        let id = self.components.add_identity(XsdIdentity {
            name: name.clone(),
            kind,
            selector,
            fields,
        });
        if self.globals.identities.insert(name.clone(), id).is_some() {
            self.error(at, format!("A global identity-constraint definition '{}' does already exist.", name));
        }
        self.identity_work.push((id, at));
        Some(id)
    }

    fn identity_path(&mut self, at: Pending<'a>, field: bool) -> Option<IdentityPath> {
        let xpath = self.required_attr(at, "xpath")?;
        match IdentityPath::parse(xpath, &at.element.namespaces, field) {
            Ok(path) => Some(path),
            Err(message) => {
                self.attr_error(at, "xpath", message);
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Attributes
    // -------------------------------------------------------------------------

    fn fill_attribute(&mut self, at: Pending<'a>, id: AttributeId, decl: &mut XsdAttribute) {
        decl.type_id = self.simple_type_ref(at, "type").unwrap_or(ANY_SIMPLE_TYPE);
        decl.default = at.attr("default").map(str::to_string);
        decl.fixed = at.attr("fixed").map(str::to_string);
        if decl.default.is_some() && decl.fixed.is_some() {
            self.error(at, "The attributes 'default' and 'fixed' are mutually exclusive.");
        }
        for (attribute, value) in [("default", &decl.default), ("fixed", &decl.fixed)] {
            if let Some(value) = value {
                self.value_checks.push(ValueCheck {
                    at,
                    target: ConstraintTarget::Attribute(id),
                    attribute,
                    value: value.clone(),
                });
            }
        }
    }

    /// Attribute uses, attribute group references and anyAttribute under `at`
    fn parse_attribute_uses(&mut self, at: Pending<'a>) -> (AttributeUses, Vec<AttributeGroupId>) {
        let mut uses = AttributeUses::default();
        let mut refs = Vec::new();
        for child in at.children() {
            match child.name() {
                xs::ATTRIBUTE => {
                    if let Some((name, attribute_use)) = self.attribute_use(child) {
                        if uses.get(&name).is_some() {
                            self.error(child, format!("Duplicate attribute use '{}'.", name));
                        }
                        uses.insert(name, attribute_use);
                    }
                }
                xs::ATTRIBUTE_GROUP => {
                    if let Some(id) = self.attribute_group_ref(child) {
                        refs.push(id);
                    }
                }
                xs::ANY_ATTRIBUTE => uses.wildcard = Some(self.parse_wildcard(child)),
                _ => {}
            }
        }
        (uses, refs)
    }

    fn attribute_group_ref(&mut self, at: Pending<'a>) -> Option<AttributeGroupId> {
        self.required_attr(at, "ref")?;
        let name = self.qname_attr(at, "ref")?;
        if let Some(Original::AttributeGroup(original)) = self.self_reference(&name) {
            return Some(original);
        }
        let id = self.globals.attribute_groups.get(&name).copied();
        if id.is_none() {
            self.unresolved(at, "ref", &name, "attribute group definition");
        }
        id
    }

    fn attribute_use(&mut self, at: Pending<'a>) -> Option<(QName, AttributeUse)> {
        let mode = match at.attr("use") {
            Some(value) => AttributeUseMode::parse(value.trim()).unwrap_or_else(|| {
                self.attr_error(
                    at,
                    "use",
                    format!("The value '{}' is not an element of the set {{'optional', 'prohibited', 'required'}}.", value),
                );
                AttributeUseMode::Optional
            }),
            None => AttributeUseMode::Optional,
        };
        if mode != AttributeUseMode::Optional && at.attr("default").is_some() {
            self.error(at, "The value of the attribute 'use' must be 'optional' if the attribute 'default' is present.");
        }

        let (name, id) = if at.attr("ref").is_some() {
            let name = self.qname_attr(at, "ref")?;
            let Some(id) = self.globals.attributes.get(&name).copied() else {
                self.unresolved(at, "ref", &name, "attribute declaration");
                return None;
            };
            (name, id)
        } else {
            let attribute_form = self.doc(at).attribute_form;
            let name = self.local_name(at, attribute_form)?;
            if name.local_name == "xmlns" {
                self.attr_error(at, "name", "The value of the attribute must not match 'xmlns'.");
                return None;
            }
            let id = self
                .components
                .add_attribute(XsdAttribute::new(name.clone(), ANY_SIMPLE_TYPE));
            let mut decl = self.components.attribute(id).clone();
            self.fill_attribute(at, id, &mut decl);
            self.components.attributes[id.index()] = decl;
            (name, id)
        };

        let mut attribute_use = AttributeUse::new(id);
        attribute_use.mode = mode;
        if at.attr("ref").is_some() {
            attribute_use.default = at.attr("default").map(str::to_string);
            attribute_use.fixed = at.attr("fixed").map(str::to_string);
            for (attribute, value) in [("default", &attribute_use.default), ("fixed", &attribute_use.fixed)] {
                if let Some(value) = value {
                    self.value_checks.push(ValueCheck {
                        at,
                        target: ConstraintTarget::Attribute(id),
                        attribute,
                        value: value.clone(),
                    });
                }
            }
        }
        Some((name, attribute_use))
    }

    // -------------------------------------------------------------------------
    // Pass 3: finalization
    // -------------------------------------------------------------------------

    fn finalize(&mut self) {
        for i in 0..self.attribute_group_work.len() {
            let (id, _) = self.attribute_group_work[i];
            self.flatten_attribute_group(id, &mut Vec::new());
        }

        for id in self.complex_order.clone() {
            self.finalize_complex(id);
        }

        self.finalize_elements();
        self.finalize_identities();
        self.check_value_constraints();
    }

    fn flatten_attribute_group(&mut self, id: AttributeGroupId, stack: &mut Vec<AttributeGroupId>) -> AttributeUses {
        if self.flattened.contains(&id) {
            return self.components.attribute_group(id).uses.clone();
        }
        if stack.contains(&id) {
            let name = self.components.attribute_group(id).name.clone();
            if let Some((_, at)) = self.attribute_group_work.iter().find(|(g, _)| *g == id).copied() {
                self.error(at, format!("The attribute group '{}' references itself.", name));
            }
            return AttributeUses::default();
        }
        stack.push(id);
        let group = self.components.attribute_group(id).clone();
        let mut uses = group.uses;
        for reference in group.group_refs {
            let referenced = self.flatten_attribute_group(reference, stack);
            uses.merge_group(&referenced);
        }
        stack.pop();

        let slot = &mut self.components.attribute_groups[id.index()];
        slot.uses = uses.clone();
        slot.group_refs.clear();
        self.flattened.insert(id);
        uses
    }

    fn finalize_complex(&mut self, id: TypeId) {
        let Some(draft) = self.drafts.remove(&id) else {
            return;
        };
        self.finalizing.insert(id);
        let at = draft.at;

        let mut base = draft.base;
        if self.finalizing.contains(&base) {
            self.error(
                at,
                format!("The type definition '{}' circularly derives from itself.", self.components.type_label(base)),
            );
            base = ANY_TYPE;
        } else {
            self.finalize_complex(base);
        }

        let mut own = draft.attributes;
        for group in &draft.attribute_groups {
            let uses = self.flatten_attribute_group(*group, &mut Vec::new());
            own.merge_group(&uses);
        }

        let base_def = self.components.type_def(base).clone();
        let forbidden = match &base_def {
            XsdType::Simple(st) => st.final_,
            XsdType::Complex(ct) => ct.final_,
        };
        if base != ANY_TYPE && forbidden.is_blocked(draft.derivation) {
            self.error(
                at,
                format!(
                    "The type definition '{}' does not allow derivation by {}.",
                    self.components.type_label(base),
                    draft.derivation
                ),
            );
        }

        let attributes = match (&base_def, draft.derivation) {
            (XsdType::Complex(ct), DerivationMethod::Extension) => {
                let mut merged = ct.attributes.clone();
                merged.extend_with(&own);
                merged
            }
            (XsdType::Complex(ct), DerivationMethod::Restriction) => {
                let mut merged = ct.attributes.clone();
                merged.restrict_with(&own);
                merged
            }
            (XsdType::Simple(_), _) => own,
        };

        let content = match draft.content {
            DraftContent::Complex { particle, mixed } => {
                if base_def.as_simple().is_some() {
                    self.error(
                        at,
                        format!(
                            "The base type '{}' is a simple type; complexContent requires a complex base type.",
                            self.components.type_label(base)
                        ),
                    );
                }
                let (inherited, base_mixed) = match (&base_def, draft.derivation) {
                    (XsdType::Complex(ct), DerivationMethod::Extension) if base != ANY_TYPE => {
                        if ct.has_simple_content() {
                            self.error(
                                at,
                                format!(
                                    "The base type '{}' has simple content and cannot be extended with complexContent.",
                                    self.components.type_label(base)
                                ),
                            );
                        }
                        (self.effective_particles.get(&base).cloned().flatten(), ct.is_mixed())
                    }
                    _ => (None, false),
                };
                let effective = match (inherited, particle) {
                    (None, own) => own,
                    (Some(inherited), None) => Some(inherited),
                    (Some(inherited), Some(own)) => {
                        let mut group = XsdGroup::new(ModelType::Sequence);
                        group.add_particle(inherited);
                        group.add_particle(own);
                        Some(GroupParticle::new(ParticleTerm::Group(group), Occurs::once()))
                    }
                };
                let mixed = mixed || base_mixed;
                self.effective_particles.insert(id, effective.clone());
                self.model_content(at, effective, mixed)
            }
            DraftContent::SimpleExtension => match &base_def {
                XsdType::Simple(_) => ComplexContent::Simple(base),
                XsdType::Complex(ct) => match ct.content {
                    ComplexContent::Simple(st) => ComplexContent::Simple(st),
                    _ => {
                        self.error(
                            at,
                            format!(
                                "The base type '{}' must be a simple type or a complex type with simple content.",
                                self.components.type_label(base)
                            ),
                        );
                        ComplexContent::Empty
                    }
                },
            },
            DraftContent::SimpleRestriction { restriction, inline } => match base_def.as_complex().map(|ct| &ct.content) {
                Some(ComplexContent::Simple(st)) => {
                    let content_base = inline.unwrap_or(*st);
                    let (facets, count) = self.parse_facets(restriction, content_base);
                    if count == 0 {
                        ComplexContent::Simple(content_base)
                    } else {
                        let restricted = XsdSimpleType::restriction(None, content_base, facets);
                        ComplexContent::Simple(self.components.add_type(XsdType::Simple(restricted)))
                    }
                }
                _ => {
                    self.error(
                        at,
                        format!(
                            "The base type '{}' must be a complex type with simple content.",
                            self.components.type_label(base)
                        ),
                    );
                    ComplexContent::Empty
                }
            },
        };

        if let XsdType::Complex(ct) = self.components.type_def_mut(id) {
            ct.base = base;
            ct.derivation = draft.derivation;
            ct.attributes = attributes;
            ct.content = content;
        }
        self.finalizing.remove(&id);
    }

    fn model_content(&mut self, at: Pending<'a>, particle: Option<GroupParticle>, mixed: bool) -> ComplexContent {
        let model = match particle {
            Some(particle) => match ContentModel::compile(&particle, &self.components) {
                Ok(model) => model,
                Err(message) => {
                    self.error(at, message);
                    return ComplexContent::Empty;
                }
            },
            None => ContentModel {
                expr: ModelExpr::Empty,
                terms: Vec::new(),
            },
        };
        if model.expr == ModelExpr::Empty && !mixed {
            ComplexContent::Empty
        } else {
            ComplexContent::Model { model, mixed }
        }
    }

    fn finalize_elements(&mut self) {
        let inheriting: Vec<ElementId> = self
            .element_work
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| self.inherit_type.contains(id))
            .collect();
        for id in inheriting {
            let type_id = self.inherited_type(id);
            self.components.elements[id.index()].type_id = type_id;
        }

        for i in 0..self.element_work.len() {
            let (id, at) = self.element_work[i];
            let Some(head) = self.components.element(id).substitution_group else {
                continue;
            };

            let member = self.components.element(id);
            let head_decl = self.components.element(head);
            let blocked = DerivationFlags {
                substitution: false,
                ..head_decl.final_
            };
            if !is_derived_from(&self.components, member.type_id, head_decl.type_id, blocked) {
                let message = format!(
                    "The type definition of '{}' is not validly derived from the type definition of the substitution group head '{}'.",
                    member.name, head_decl.name
                );
                self.error(at, message);
            }

            let mut seen = vec![id];
            let mut current = Some(head);
            while let Some(head) = current {
                if seen.contains(&head) {
                    let name = self.components.element(id).name.clone();
                    self.error(at, format!("The substitution group of '{}' is circular.", name));
                    break;
                }
                seen.push(head);
                self.globals.substitutes.entry(head).or_default().push(id);
                current = self.components.element(head).substitution_group;
            }
        }
    }

    fn inherited_type(&self, id: ElementId) -> TypeId {
        let mut current = id;
        for _ in 0..self.components.elements.len() {
            let decl = self.components.element(current);
            if !self.inherit_type.contains(&current) {
                return decl.type_id;
            }
            match decl.substitution_group {
                Some(head) => current = head,
                None => break,
            }
        }
        ANY_TYPE
    }

    fn finalize_identities(&mut self) {
        for i in 0..self.identity_work.len() {
            let (id, at) = self.identity_work[i];
            let IdentityKind::KeyRef { refer, .. } = &self.components.identity(id).kind else {
                continue;
            };
            let refer = refer.clone();
            let Some(target) = self.globals.identities.get(&refer).copied() else {
                self.unresolved(at, "refer", &refer, "identity-constraint definition");
                continue;
            };
            let referenced = self.components.identity(target);
            if matches!(referenced.kind, IdentityKind::KeyRef { .. }) {
                self.attr_error(
                    at,
                    "refer",
                    format!("The keyref '{}' must refer to a key or unique constraint.", refer),
                );
                continue;
            }
            if referenced.fields.len() != self.components.identity(id).fields.len() {
                self.error(
                    at,
                    format!(
                        "The cardinality of the keyref differs from the cardinality of the referenced key/unique '{}'.",
                        refer
                    ),
                );
                continue;
            }
            if let IdentityKind::KeyRef { resolved, .. } = &mut self.components.identities[id.index()].kind {
                *resolved = Some(target);
            }
        }
    }

    fn check_value_constraints(&mut self) {
        for check in std::mem::take(&mut self.value_checks) {
            let type_id = match check.target {
                ConstraintTarget::Attribute(id) => Some(self.components.attribute(id).type_id),
                ConstraintTarget::Element(id) => {
                    let type_id = self.components.element(id).type_id;
                    match self.components.type_def(type_id) {
                        XsdType::Simple(_) => Some(type_id),
                        XsdType::Complex(ct) => match &ct.content {
                            ComplexContent::Simple(st) => Some(*st),
                            ComplexContent::Model { model, mixed: true } if model.is_emptiable() => None,
                            _ => {
                                self.error(
                                    check.at,
                                    format!(
                                        "The value constraint '{}' requires a simple type or mixed content with an emptiable particle.",
                                        check.value
                                    ),
                                );
                                continue;
                            }
                        },
                    }
                }
            };
            let Some(type_id) = type_id else {
                continue;
            };
            if simple_types::id_role(&self.components, type_id) == simple_types::IdRole::Id {
                self.attr_error(check.at, check.attribute, "A value constraint is not allowed on a type derived from xs:ID.");
                continue;
            }
            if let Err(message) =
                simple_types::validate_value(&self.components, type_id, &check.value, &check.at.element.namespaces)
            {
                self.attr_error(
                    check.at,
                    check.attribute,
                    format!("The value '{}' is not valid: {}", check.value, message),
                );
            }
        }
    }
}

fn kind_label(tag: &str) -> &'static str {
    match tag {
        xs::GROUP => "model group definition",
        xs::ATTRIBUTE_GROUP => "attribute group definition",
        _ => "type definition",
    }
}

/// Facets a base type admits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FacetFamily {
    Atomic(FacetClass),
    List,
    Union,
}

impl FacetFamily {
    fn admits(self, facet: &str) -> bool {
        const STRING: &[&str] = &["length", "minLength", "maxLength", "pattern", "enumeration", "whiteSpace"];
        const ORDERED: &[&str] = &[
            "pattern",
            "enumeration",
            "whiteSpace",
            "maxInclusive",
            "maxExclusive",
            "minInclusive",
            "minExclusive",
        ];
        match self {
            FacetFamily::Atomic(FacetClass::Lengthed | FacetClass::Any) | FacetFamily::List => STRING.contains(&facet),
            FacetFamily::Atomic(FacetClass::Boolean) => matches!(facet, "pattern" | "whiteSpace"),
            FacetFamily::Atomic(FacetClass::Ordered) => ORDERED.contains(&facet),
            FacetFamily::Atomic(FacetClass::Decimal) => {
                ORDERED.contains(&facet) || matches!(facet, "totalDigits" | "fractionDigits")
            }
            FacetFamily::Union => matches!(facet, "pattern" | "enumeration"),
        }
    }
}

fn facet_family(components: &SchemaComponents, base: TypeId) -> FacetFamily {
    if simple_types::is_union(components, base) {
        FacetFamily::Union
    } else if simple_types::list_item(components, base).is_some() {
        FacetFamily::List
    } else {
        match simple_types::builtin_root(components, base) {
            Some(builtin) if builtin.is_list() => FacetFamily::List,
            Some(builtin) => FacetFamily::Atomic(builtin.facet_class()),
            None => FacetFamily::Atomic(FacetClass::Any),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Document;
    use crate::validators::wildcards::NamespaceConstraint;
    use std::path::PathBuf;

    fn documents(sources: &[&str]) -> Vec<SchemaDocument> {
        sources
            .iter()
            .enumerate()
            .map(|(i, src)| {
                let root = Document::from_string(src).unwrap().root;
                let tns = root.get_attribute("targetNamespace").map(str::to_string);
                SchemaDocument {
                    location: format!("doc{}.xsd", i),
                    base_dir: PathBuf::from("."),
                    target_namespace: tns,
                    chameleon: false,
                    element_form: root
                        .get_attribute("elementFormDefault")
                        .and_then(FormDefault::parse)
                        .unwrap_or_default(),
                    attribute_form: FormDefault::Unqualified,
                    block_default: DerivationFlags::default(),
                    final_default: DerivationFlags::default(),
                    root,
                }
            })
            .collect()
    }

    fn build(sources: &[&str]) -> BuildOutput {
        build_schema(&documents(sources))
    }

    fn messages(output: &BuildOutput) -> Vec<String> {
        output.diagnostics.iter().map(|d| d.message.clone()).collect()
    }

    const HEAD: &str = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:t="urn:t" targetNamespace="urn:t" elementFormDefault="qualified">"#;

    fn schema(body: &str) -> String {
        format!("{}{}</xs:schema>", HEAD, body)
    }

    fn global_type(output: &BuildOutput, local: &str) -> TypeId {
        output.globals.types[&QName::namespaced("urn:t", local)]
    }

    #[test]
    fn test_simple_restriction_with_facets() {
        let src = schema(
            r#"<xs:simpleType name="Code">
  <xs:restriction base="xs:string">
    <xs:pattern value="[A-Z]{3}"/>
    <xs:maxLength value="3"/>
  </xs:restriction>
</xs:simpleType>"#,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));

        let code = global_type(&output, "Code");
        let st = output.components.type_def(code).as_simple().unwrap();
        assert_eq!(st.facets.max_length, Some(3));
        assert_eq!(st.facets.patterns.len(), 1);
        let ns = crate::namespaces::NamespaceContext::new();
        assert!(simple_types::validate_value(&output.components, code, "GBP", &ns).is_ok());
        assert!(simple_types::validate_value(&output.components, code, "gbp", &ns).is_err());
    }

    #[test]
    fn test_forward_base_reference() {
        let src = schema(
            r#"<xs:simpleType name="Small">
  <xs:restriction base="t:Amount"><xs:maxInclusive value="10"/></xs:restriction>
</xs:simpleType>
<xs:simpleType name="Amount">
  <xs:restriction base="xs:decimal"><xs:minInclusive value="0"/></xs:restriction>
</xs:simpleType>"#,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
        let small = global_type(&output, "Small");
        let ns = crate::namespaces::NamespaceContext::new();
        assert!(simple_types::validate_value(&output.components, small, "5", &ns).is_ok());
        assert!(simple_types::validate_value(&output.components, small, "11", &ns).is_err());
        assert!(simple_types::validate_value(&output.components, small, "-1", &ns).is_err());
    }

    #[test]
    fn test_unresolved_type_reference() {
        let src = schema(r#"<xs:element name="Root" type="t:Missing"/>"#);
        let output = build(&[&src]);
        assert_eq!(
            messages(&output),
            vec![
                "Element '{http://www.w3.org/2001/XMLSchema}element', attribute 'type': The QName value '{urn:t}Missing' does not resolve to a(n) type definition."
                    .to_string()
            ]
        );
        assert_eq!(output.diagnostics[0].line, Some(1));
        assert_eq!(output.diagnostics[0].source.as_deref(), Some("doc0.xsd"));
    }

    #[test]
    fn test_facet_not_admitted() {
        let src = schema(
            r#"<xs:simpleType name="Flag">
  <xs:restriction base="xs:boolean"><xs:maxLength value="1"/></xs:restriction>
</xs:simpleType>"#,
        );
        let output = build(&[&src]);
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0]
            .message
            .contains("The facet 'maxLength' is not allowed on types derived from the type 'xs:boolean'."));
    }

    #[test]
    fn test_invalid_pattern_and_bound() {
        let src = schema(
            r#"<xs:simpleType name="A">
  <xs:restriction base="xs:string"><xs:pattern value="[a-"/></xs:restriction>
</xs:simpleType>
<xs:simpleType name="B">
  <xs:restriction base="xs:int"><xs:maxInclusive value="ten"/></xs:restriction>
</xs:simpleType>"#,
        );
        let output = build(&[&src]);
        let messages = messages(&output);
        assert_eq!(messages.len(), 2, "{messages:?}");
        assert!(messages[0].contains("facet 'pattern'"));
        assert!(messages[1].contains("facet 'maxInclusive'"));
    }

    #[test]
    fn test_duplicate_global() {
        let src = schema(r#"<xs:element name="A"/><xs:element name="A"/>"#);
        let output = build(&[&src]);
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0].message.contains("does already exist"));
    }

    #[test]
    fn test_complex_extension_merges_content_and_attributes() {
        let src = schema(
            r#"<xs:complexType name="Base">
  <xs:sequence><xs:element name="A" type="xs:string"/></xs:sequence>
  <xs:attribute name="id" type="xs:string" use="required"/>
</xs:complexType>
<xs:complexType name="Derived">
  <xs:complexContent>
    <xs:extension base="t:Base">
      <xs:sequence><xs:element name="B" type="xs:string"/></xs:sequence>
      <xs:attribute name="extra" type="xs:int"/>
    </xs:extension>
  </xs:complexContent>
</xs:complexType>"#,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));

        let derived = global_type(&output, "Derived");
        let ct = output.components.type_def(derived).as_complex().unwrap();
        assert_eq!(ct.base, global_type(&output, "Base"));
        assert_eq!(ct.derivation, DerivationMethod::Extension);
        assert_eq!(ct.attributes.uses.len(), 2);
        assert_eq!(ct.attributes.required().count(), 1);
        match &ct.content {
            ComplexContent::Model { model, mixed } => {
                assert!(!mixed);
                assert_eq!(model.terms.len(), 2);
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_simple_content_restriction() {
        let src = schema(
            r#"<xs:complexType name="Money">
  <xs:simpleContent>
    <xs:extension base="xs:decimal"><xs:attribute name="ccy" type="xs:string"/></xs:extension>
  </xs:simpleContent>
</xs:complexType>
<xs:complexType name="SmallMoney">
  <xs:simpleContent>
    <xs:restriction base="t:Money"><xs:maxInclusive value="100"/></xs:restriction>
  </xs:simpleContent>
</xs:complexType>"#,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
        let small = global_type(&output, "SmallMoney");
        let ct = output.components.type_def(small).as_complex().unwrap();
        let ComplexContent::Simple(st) = ct.content else {
            panic!("expected simple content");
        };
        let ns = crate::namespaces::NamespaceContext::new();
        assert!(simple_types::validate_value(&output.components, st, "99.5", &ns).is_ok());
        assert!(simple_types::validate_value(&output.components, st, "101", &ns).is_err());
        assert!(ct.attributes.get(&QName::local("ccy")).is_some());
    }

    #[test]
    fn test_group_and_attribute_group_refs() {
        let src = schema(
            r###"<xs:group name="Pair">
  <xs:sequence><xs:element name="A"/><xs:element name="B"/></xs:sequence>
</xs:group>
<xs:attributeGroup name="Common">
  <xs:attribute name="lang" type="xs:language"/>
  <xs:anyAttribute namespace="##other" processContents="lax"/>
</xs:attributeGroup>
<xs:complexType name="T">
  <xs:group ref="t:Pair"/>
  <xs:attributeGroup ref="t:Common"/>
</xs:complexType>"###,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
        let ct = output
            .components
            .type_def(global_type(&output, "T"))
            .as_complex()
            .unwrap();
        assert!(ct.attributes.get(&QName::local("lang")).is_some());
        assert_eq!(
            ct.attributes.wildcard.as_ref().map(|w| w.namespace.clone()),
            Some(NamespaceConstraint::Other(Some("urn:t".to_string())))
        );
        assert!(matches!(ct.content, ComplexContent::Model { .. }));
    }

    #[test]
    fn test_circular_group() {
        let src = schema(
            r#"<xs:group name="Loop"><xs:sequence><xs:group ref="t:Loop"/></xs:sequence></xs:group>
<xs:complexType name="T"><xs:group ref="t:Loop"/></xs:complexType>"#,
        );
        let output = build(&[&src]);
        assert!(messages(&output).iter().any(|m| m.contains("Circular reference")));
    }

    #[test]
    fn test_circular_simple_types() {
        let src = schema(
            r#"<xs:simpleType name="A"><xs:restriction base="t:B"/></xs:simpleType>
<xs:simpleType name="B"><xs:restriction base="t:A"/></xs:simpleType>"#,
        );
        let output = build(&[&src]);
        assert!(messages(&output).iter().any(|m| m.contains("circularly references itself")));
    }

    #[test]
    fn test_substitution_groups() {
        let src = schema(
            r#"<xs:element name="Head" type="xs:string" abstract="true"/>
<xs:element name="Member" substitutionGroup="t:Head"/>
<xs:element name="Nested" substitutionGroup="t:Member"/>"#,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
        let head = output.globals.elements[&QName::namespaced("urn:t", "Head")];
        let member = output.globals.elements[&QName::namespaced("urn:t", "Member")];
        assert_eq!(output.globals.substitutes[&head].len(), 2);
        assert_eq!(
            output.components.element(member).type_id,
            builtin_type_id(BuiltinType::String)
        );
    }

    #[test]
    fn test_keyref_resolution() {
        let src = schema(
            r#"<xs:element name="Root">
  <xs:complexType><xs:sequence><xs:element name="Item" maxOccurs="unbounded"/></xs:sequence></xs:complexType>
  <xs:key name="ItemKey"><xs:selector xpath="t:Item"/><xs:field xpath="@id"/></xs:key>
  <xs:keyref name="ItemRef" refer="t:ItemKey"><xs:selector xpath="t:Item"/><xs:field xpath="@ref"/></xs:keyref>
  <xs:keyref name="Broken" refer="t:Nope"><xs:selector xpath="t:Item"/><xs:field xpath="@ref"/></xs:keyref>
</xs:element>"#,
        );
        let output = build(&[&src]);
        assert_eq!(output.diagnostics.len(), 1, "{:?}", messages(&output));
        let keyref = output.globals.identities[&QName::namespaced("urn:t", "ItemRef")];
        let key = output.globals.identities[&QName::namespaced("urn:t", "ItemKey")];
        match &output.components.identity(keyref).kind {
            IdentityKind::KeyRef { resolved, .. } => assert_eq!(*resolved, Some(key)),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_invalid_default_value() {
        let src = schema(r#"<xs:element name="N" type="xs:int" default="abc"/>"#);
        let output = build(&[&src]);
        assert_eq!(output.diagnostics.len(), 1);
        assert!(output.diagnostics[0]
            .message
            .contains("'abc' is not a valid value of the atomic type 'xs:int'."));
    }

    #[test]
    fn test_redefine_self_reference() {
        let original = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
<xs:complexType name="Person"><xs:sequence><xs:element name="Name"/></xs:sequence></xs:complexType>
</xs:schema>"#;
        let redefining = r#"<xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
<xs:redefine schemaLocation="original.xsd">
  <xs:complexType name="Person">
    <xs:complexContent>
      <xs:extension base="Person"><xs:sequence><xs:element name="Age"/></xs:sequence></xs:extension>
    </xs:complexContent>
  </xs:complexType>
</xs:redefine>
</xs:schema>"#;
        let output = build(&[redefining, original]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
        let person = output.globals.types[&QName::local("Person")];
        let ct = output.components.type_def(person).as_complex().unwrap();
        assert_ne!(ct.base, person);
        match &ct.content {
            ComplexContent::Model { model, .. } => assert_eq!(model.terms.len(), 2),
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_xml_namespace_attributes() {
        let src = schema(
            r#"<xs:complexType name="T"><xs:attribute ref="xml:lang"/></xs:complexType>"#,
        );
        let output = build(&[&src]);
        assert!(output.diagnostics.is_empty(), "{:?}", messages(&output));
    }
}
