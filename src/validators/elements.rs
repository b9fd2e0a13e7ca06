//! XSD Element declarations

use crate::namespaces::QName;

use super::complex_types::DerivationFlags;
use super::globals::{ConstraintId, ElementId, TypeId};

/// An element declaration
#[derive(Debug, Clone)]
pub struct XsdElement {
    /// Expanded name instances must carry
    pub name: QName,
    /// Declared type
    pub type_id: TypeId,
    /// Whether xsi:nil is allowed
    pub nillable: bool,
    /// Abstract declarations only appear through substitution
    pub is_abstract: bool,
    /// Default value for empty simple content
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
    /// Head of the substitution group this element belongs to
    pub substitution_group: Option<ElementId>,
    /// Substitutions and xsi:type derivations blocked for instances
    pub block: DerivationFlags,
    /// Derivations forbidden for substitution group members
    pub final_: DerivationFlags,
    /// unique/key/keyref declared on this element
    pub identities: Vec<ConstraintId>,
    /// Top-level declaration
    pub is_global: bool,
}

impl XsdElement {
    /// Create a declaration with default properties
    pub fn new(name: QName, type_id: TypeId) -> Self {
        Self {
            name,
            type_id,
            nillable: false,
            is_abstract: false,
            default: None,
            fixed: None,
            substitution_group: None,
            block: DerivationFlags::default(),
            final_: DerivationFlags::default(),
            identities: Vec::new(),
            is_global: false,
        }
    }

    /// Value constraint: fixed wins over default
    pub fn value_constraint(&self) -> Option<&str> {
        self.fixed.as_deref().or(self.default.as_deref())
    }
}
