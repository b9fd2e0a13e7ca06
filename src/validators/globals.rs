//! Global XSD declarations management
//!
//! Schema components live in one arena ([`SchemaComponents`]) and refer to
//! each other by typed index. Named global components are additionally
//! reachable through [`GlobalMaps`]. Built-in types occupy the first type
//! slots, so they resolve like any other global type.

use std::collections::{HashMap, HashSet};

use crate::namespaces::QName;

use super::attributes::{XsdAttribute, XsdAttributeGroup};
use super::builtins::BuiltinType;
use super::complex_types::XsdComplexType;
use super::elements::XsdElement;
use super::groups::XsdGroup;
use super::identities::XsdIdentity;
use super::simple_types::XsdSimpleType;

macro_rules! component_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) usize);

        impl $name {
            /// Arena index
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

component_id!(
    /// Index of a simple or complex type definition
    TypeId
);
component_id!(
    /// Index of an element declaration
    ElementId
);
component_id!(
    /// Index of an attribute declaration
    AttributeId
);
component_id!(
    /// Index of a named model group
    GroupId
);
component_id!(
    /// Index of an attribute group
    AttributeGroupId
);
component_id!(
    /// Index of an identity constraint
    ConstraintId
);

/// xs:anyType
pub const ANY_TYPE: TypeId = TypeId(0);
/// xs:anySimpleType
pub const ANY_SIMPLE_TYPE: TypeId = TypeId(1);

/// Arena slot of a built-in simple type
pub fn builtin_type_id(builtin: BuiltinType) -> TypeId {
    let position = BuiltinType::ALL
        .iter()
        .position(|b| *b == builtin)
        .unwrap_or(0);
    TypeId(position + 1)
}

/// A type definition
#[derive(Debug, Clone)]
pub enum XsdType {
    /// Simple type definition
    Simple(XsdSimpleType),
    /// Complex type definition
    Complex(XsdComplexType),
}

impl XsdType {
    /// Name of a global type
    pub fn name(&self) -> Option<&QName> {
        match self {
            XsdType::Simple(st) => st.name.as_ref(),
            XsdType::Complex(ct) => ct.name.as_ref(),
        }
    }

    /// The simple type definition, if this is one
    pub fn as_simple(&self) -> Option<&XsdSimpleType> {
        match self {
            XsdType::Simple(st) => Some(st),
            XsdType::Complex(_) => None,
        }
    }

    /// The complex type definition, if this is one
    pub fn as_complex(&self) -> Option<&XsdComplexType> {
        match self {
            XsdType::Complex(ct) => Some(ct),
            XsdType::Simple(_) => None,
        }
    }
}

/// Arena of every component of a compiled schema
#[derive(Debug, Clone)]
pub struct SchemaComponents {
    /// Type definitions
    pub types: Vec<XsdType>,
    /// Element declarations
    pub elements: Vec<XsdElement>,
    /// Attribute declarations
    pub attributes: Vec<XsdAttribute>,
    /// Named model groups
    pub groups: Vec<XsdGroup>,
    /// Attribute groups
    pub attribute_groups: Vec<XsdAttributeGroup>,
    /// Identity constraints
    pub identities: Vec<XsdIdentity>,
}

impl SchemaComponents {
    /// An arena holding only the built-in types
    pub fn with_builtins() -> Self {
        let mut types = Vec::with_capacity(BuiltinType::ALL.len() + 1);
        types.push(XsdType::Complex(XsdComplexType::any_type()));
        for builtin in BuiltinType::ALL {
            types.push(XsdType::Simple(XsdSimpleType::builtin(*builtin)));
        }
        Self {
            types,
            elements: Vec::new(),
            attributes: Vec::new(),
            groups: Vec::new(),
            attribute_groups: Vec::new(),
            identities: Vec::new(),
        }
    }

    /// Type definition by id
    pub fn type_def(&self, id: TypeId) -> &XsdType {
        &self.types[id.0]
    }

    /// Mutable type definition by id
    pub fn type_def_mut(&mut self, id: TypeId) -> &mut XsdType {
        &mut self.types[id.0]
    }

    /// Element declaration by id
    pub fn element(&self, id: ElementId) -> &XsdElement {
        &self.elements[id.0]
    }

    /// Attribute declaration by id
    pub fn attribute(&self, id: AttributeId) -> &XsdAttribute {
        &self.attributes[id.0]
    }

    /// Named model group by id
    pub fn group(&self, id: GroupId) -> &XsdGroup {
        &self.groups[id.0]
    }

    /// Attribute group by id
    pub fn attribute_group(&self, id: AttributeGroupId) -> &XsdAttributeGroup {
        &self.attribute_groups[id.0]
    }

    /// Identity constraint by id
    pub fn identity(&self, id: ConstraintId) -> &XsdIdentity {
        &self.identities[id.0]
    }

    /// Store a type definition
    pub fn add_type(&mut self, def: XsdType) -> TypeId {
        self.types.push(def);
        TypeId(self.types.len() - 1)
    }

    /// Store an element declaration
    pub fn add_element(&mut self, decl: XsdElement) -> ElementId {
        self.elements.push(decl);
        ElementId(self.elements.len() - 1)
    }

    /// Store an attribute declaration
    pub fn add_attribute(&mut self, decl: XsdAttribute) -> AttributeId {
        self.attributes.push(decl);
        AttributeId(self.attributes.len() - 1)
    }

    /// Store a named model group
    pub fn add_group(&mut self, group: XsdGroup) -> GroupId {
        self.groups.push(group);
        GroupId(self.groups.len() - 1)
    }

    /// Store an attribute group
    pub fn add_attribute_group(&mut self, group: XsdAttributeGroup) -> AttributeGroupId {
        self.attribute_groups.push(group);
        AttributeGroupId(self.attribute_groups.len() - 1)
    }

    /// Store an identity constraint
    pub fn add_identity(&mut self, identity: XsdIdentity) -> ConstraintId {
        self.identities.push(identity);
        ConstraintId(self.identities.len() - 1)
    }

    /// Display name of a type for messages
    pub fn type_label(&self, id: TypeId) -> String {
        match self.type_def(id).name() {
            Some(name) if name.is_xsd() => format!("xs:{}", name.local_name),
            Some(name) => name.to_string(),
            None => "local type".to_string(),
        }
    }
}

/// Name tables for global components
#[derive(Debug, Clone, Default)]
pub struct GlobalMaps {
    /// Global types
    pub types: HashMap<QName, TypeId>,
    /// Global element declarations
    pub elements: HashMap<QName, ElementId>,
    /// Global attribute declarations
    pub attributes: HashMap<QName, AttributeId>,
    /// Named model groups
    pub groups: HashMap<QName, GroupId>,
    /// Attribute groups
    pub attribute_groups: HashMap<QName, AttributeGroupId>,
    /// Identity constraints (their names are schema-global)
    pub identities: HashMap<QName, ConstraintId>,
    /// Notation names
    pub notations: HashSet<QName>,
    /// Substitution group members by head, transitively closed
    pub substitutes: HashMap<ElementId, Vec<ElementId>>,
}

impl GlobalMaps {
    /// Name tables pre-filled with the built-in types
    pub fn with_builtins() -> Self {
        let mut maps = Self::default();
        maps.types.insert(QName::xsd("anyType"), ANY_TYPE);
        for builtin in BuiltinType::ALL {
            maps.types
                .insert(QName::xsd(builtin.name()), builtin_type_id(*builtin));
        }
        maps
    }
}
