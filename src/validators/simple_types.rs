//! XSD Simple Type validators
//!
//! Simple types are atomic restrictions, lists or unions. A restriction
//! step keeps only its own facets and points at its base, so validating a
//! value walks the derivation chain down to a built-in type.

use crate::namespaces::{NamespaceContext, QName};

use super::builtins::{AtomicValue, BuiltinType};
use super::complex_types::DerivationFlags;
use super::facets::{Facets, WhiteSpace};
use super::globals::{builtin_type_id, SchemaComponents, TypeId, ANY_SIMPLE_TYPE, ANY_TYPE};

/// How a simple type is constructed
#[derive(Debug, Clone, PartialEq)]
pub enum SimpleVariety {
    /// One of the built-in types
    Builtin(BuiltinType),
    /// Restriction of another simple type by facets
    Restriction(TypeId),
    /// Whitespace-separated list of an item type
    List(TypeId),
    /// Union of member types, tried in order
    Union(Vec<TypeId>),
}

/// A simple type definition
#[derive(Debug, Clone)]
pub struct XsdSimpleType {
    /// Name, for global types
    pub name: Option<QName>,
    /// Construction
    pub variety: SimpleVariety,
    /// Facets of this restriction step
    pub facets: Facets,
    /// Derivations forbidden by `final`
    pub final_: DerivationFlags,
}

impl XsdSimpleType {
    /// A built-in type definition
    pub fn builtin(builtin: BuiltinType) -> Self {
        Self {
            name: Some(QName::xsd(builtin.name())),
            variety: SimpleVariety::Builtin(builtin),
            facets: Facets::default(),
            final_: DerivationFlags::default(),
        }
    }

    /// A restriction of `base`
    pub fn restriction(name: Option<QName>, base: TypeId, facets: Facets) -> Self {
        Self {
            name,
            variety: SimpleVariety::Restriction(base),
            facets,
            final_: DerivationFlags::default(),
        }
    }

    /// The type this one is derived from
    pub fn base_type(&self) -> TypeId {
        match &self.variety {
            SimpleVariety::Builtin(b) => b.base().map(builtin_type_id).unwrap_or(ANY_TYPE),
            SimpleVariety::Restriction(base) => *base,
            SimpleVariety::List(_) | SimpleVariety::Union(_) => ANY_SIMPLE_TYPE,
        }
    }
}

/// ID-related role of a simple type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdRole {
    /// Not ID-related
    None,
    /// xs:ID or derived
    Id,
    /// xs:IDREF or derived
    IdRef,
    /// A list of IDREF
    IdRefs,
}

enum Failure {
    Lexical,
    Facet(String),
}

// =============================================================================
// Type hierarchy queries
// =============================================================================

fn simple(components: &SchemaComponents, id: TypeId) -> Option<&XsdSimpleType> {
    components.type_def(id).as_simple()
}

/// The whiteSpace facet in effect for a type
pub fn white_space(components: &SchemaComponents, id: TypeId) -> WhiteSpace {
    let Some(st) = simple(components, id) else {
        return WhiteSpace::Preserve;
    };
    match &st.variety {
        SimpleVariety::Builtin(b) => b.whitespace(),
        SimpleVariety::Restriction(base) => st
            .facets
            .white_space
            .unwrap_or_else(|| white_space(components, *base)),
        SimpleVariety::List(_) => WhiteSpace::Collapse,
        SimpleVariety::Union(_) => WhiteSpace::Preserve,
    }
}

/// The built-in a restriction chain bottoms out in, if atomic
pub fn builtin_root(components: &SchemaComponents, mut id: TypeId) -> Option<BuiltinType> {
    loop {
        match &simple(components, id)?.variety {
            SimpleVariety::Builtin(b) => return Some(*b),
            SimpleVariety::Restriction(base) => id = *base,
            SimpleVariety::List(_) | SimpleVariety::Union(_) => return None,
        }
    }
}

/// The list item type, if `id` is a (restricted) user-defined list
pub fn list_item(components: &SchemaComponents, mut id: TypeId) -> Option<TypeId> {
    loop {
        match &simple(components, id)?.variety {
            SimpleVariety::List(item) => return Some(*item),
            SimpleVariety::Restriction(base) => id = *base,
            _ => return None,
        }
    }
}

/// Whether `id` is a union or a restriction of one
pub fn is_union(components: &SchemaComponents, mut id: TypeId) -> bool {
    loop {
        match simple(components, id).map(|st| &st.variety) {
            Some(SimpleVariety::Union(_)) => return true,
            Some(SimpleVariety::Restriction(base)) => id = *base,
            _ => return false,
        }
    }
}

fn builtin_derives(mut builtin: BuiltinType, target: BuiltinType) -> bool {
    loop {
        if builtin == target {
            return true;
        }
        match builtin.base() {
            Some(base) => builtin = base,
            None => return false,
        }
    }
}

/// ID/IDREF role of a type, used for document-wide ID bookkeeping
pub fn id_role(components: &SchemaComponents, id: TypeId) -> IdRole {
    if let Some(builtin) = builtin_root(components, id) {
        if builtin_derives(builtin, BuiltinType::Id) {
            return IdRole::Id;
        }
        if builtin_derives(builtin, BuiltinType::IdRef) {
            return IdRole::IdRef;
        }
        if builtin == BuiltinType::IdRefs {
            return IdRole::IdRefs;
        }
        return IdRole::None;
    }
    match list_item(components, id) {
        Some(item) if id_role(components, item) == IdRole::IdRef => IdRole::IdRefs,
        _ => IdRole::None,
    }
}

// =============================================================================
// Value validation
// =============================================================================

/// Validate a raw lexical value against a simple type
///
/// Whitespace is normalized per the type first. On failure the message is
/// phrased like "'x' is not a valid value of the atomic type 'xs:int'." or
/// names the violated facet.
pub fn validate_value(
    components: &SchemaComponents,
    id: TypeId,
    raw: &str,
    namespaces: &NamespaceContext,
) -> Result<AtomicValue, String> {
    let normalized = white_space(components, id).normalize(raw);
    check(components, id, &normalized, namespaces).map_err(|failure| match failure {
        Failure::Facet(message) => message,
        Failure::Lexical => {
            let kind = if is_union(components, id) {
                "union"
            } else if list_item(components, id).is_some() {
                "list"
            } else {
                "atomic"
            };
            match simple(components, id).and_then(|st| st.name.as_ref()) {
                Some(_) => format!(
                    "'{}' is not a valid value of the {} type '{}'.",
                    normalized,
                    kind,
                    components.type_label(id)
                ),
                None => format!("'{}' is not a valid value of the local {} type.", normalized, kind),
            }
        }
    })
}

fn check(
    components: &SchemaComponents,
    id: TypeId,
    value: &str,
    namespaces: &NamespaceContext,
) -> Result<AtomicValue, Failure> {
    let Some(st) = simple(components, id) else {
        return Err(Failure::Lexical);
    };
    match &st.variety {
        SimpleVariety::Builtin(builtin) => {
            builtin.parse(value, namespaces).map_err(|_| Failure::Lexical)
        }
        SimpleVariety::Restriction(base) => {
            let parsed = check(components, *base, value, namespaces)?;
            st.facets.check(value, &parsed).map_err(Failure::Facet)?;
            Ok(parsed)
        }
        SimpleVariety::List(item) => {
            let mut count = 0;
            for token in value.split_whitespace() {
                check(components, *item, token, namespaces)?;
                count += 1;
            }
            Ok(AtomicValue::List(count))
        }
        SimpleVariety::Union(members) => {
            for member in members {
                let normalized = white_space(components, *member).normalize(value);
                if let Ok(parsed) = check(components, *member, &normalized, namespaces) {
                    return Ok(parsed);
                }
            }
            Err(Failure::Lexical)
        }
    }
}

/// Whether `derived` is `base` or derives from it, avoiding blocked methods
///
/// Simple type derivation is always by restriction (lists and unions count
/// as restrictions of anySimpleType), so only `restriction` in `blocked`
/// matters.
pub fn is_simple_derived(
    components: &SchemaComponents,
    derived: TypeId,
    base: TypeId,
    blocked: DerivationFlags,
) -> bool {
    let mut current = derived;
    for _ in 0..components.types.len() {
        if current == base {
            return true;
        }
        if blocked.restriction || current == ANY_TYPE {
            return false;
        }
        if let Some(members) = simple(components, current).and_then(|st| match &st.variety {
            SimpleVariety::Union(members) => Some(members),
            _ => None,
        }) {
            if members.contains(&base) {
                return true;
            }
        }
        current = match components.type_def(current).as_simple() {
            Some(st) => st.base_type(),
            None => return false,
        };
    }
    false
}
