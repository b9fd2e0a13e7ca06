//! XSD Complex Type Validators
//!
//! Complex types can have element content (model groups), simple content,
//! or no content at all. The content and attribute uses stored here are
//! the effective ones, with the base type's contributions already merged.
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Complex_Type_Definitions

use crate::namespaces::QName;

use super::attributes::AttributeUses;
use super::globals::{SchemaComponents, TypeId, ANY_TYPE};
use super::models::ContentModel;
use super::simple_types;
use super::wildcards::XsdWildcard;

/// Derivation method for complex types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DerivationMethod {
    /// Type derived by restriction
    #[default]
    Restriction,
    /// Type derived by extension
    Extension,
}

impl std::fmt::Display for DerivationMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Restriction => write!(f, "restriction"),
            Self::Extension => write!(f, "extension"),
        }
    }
}

/// Block/final derivation flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DerivationFlags {
    /// Block/finalize restriction
    pub restriction: bool,
    /// Block/finalize extension
    pub extension: bool,
    /// Block substitution (elements only)
    pub substitution: bool,
    /// Finalize list derivation (simple types only)
    pub list: bool,
    /// Finalize union derivation (simple types only)
    pub union: bool,
}

impl DerivationFlags {
    /// All derivations blocked/finalized
    pub fn all() -> Self {
        Self {
            restriction: true,
            extension: true,
            substitution: true,
            list: true,
            union: true,
        }
    }

    /// Parse from attribute value
    pub fn from_attr(value: &str) -> Self {
        let mut flags = DerivationFlags::default();
        for token in value.split_whitespace() {
            match token {
                "#all" => return Self::all(),
                "restriction" => flags.restriction = true,
                "extension" => flags.extension = true,
                "substitution" => flags.substitution = true,
                "list" => flags.list = true,
                "union" => flags.union = true,
                _ => {}
            }
        }
        flags
    }

    /// Check if a derivation method is blocked
    pub fn is_blocked(&self, method: DerivationMethod) -> bool {
        match method {
            DerivationMethod::Restriction => self.restriction,
            DerivationMethod::Extension => self.extension,
        }
    }

    /// Flags blocked by either side
    pub fn union_with(&self, other: &DerivationFlags) -> Self {
        Self {
            restriction: self.restriction || other.restriction,
            extension: self.extension || other.extension,
            substitution: self.substitution || other.substitution,
            list: self.list || other.list,
            union: self.union || other.union,
        }
    }
}

/// Effective content of a complex type
#[derive(Debug, Clone, PartialEq)]
pub enum ComplexContent {
    /// No character or element content
    Empty,
    /// Character content of this simple type
    Simple(TypeId),
    /// Element content
    Model {
        /// Compiled particle structure
        model: ContentModel,
        /// Whether character content may be interleaved
        mixed: bool,
    },
}

/// XSD Complex Type definition
#[derive(Debug, Clone)]
pub struct XsdComplexType {
    /// Name of a global type
    pub name: Option<QName>,
    /// Base type definition
    pub base: TypeId,
    /// How the type derives from its base
    pub derivation: DerivationMethod,
    /// Effective content
    pub content: ComplexContent,
    /// Effective attribute uses
    pub attributes: AttributeUses,
    /// Abstract types cannot be used directly by instances
    pub is_abstract: bool,
    /// Derivations blocked for xsi:type
    pub block: DerivationFlags,
    /// Derivations forbidden by `final`
    pub final_: DerivationFlags,
}

impl XsdComplexType {
    /// Create a type with empty content deriving from anyType
    pub fn new(name: Option<QName>) -> Self {
        Self {
            name,
            base: ANY_TYPE,
            derivation: DerivationMethod::Restriction,
            content: ComplexContent::Empty,
            attributes: AttributeUses::default(),
            is_abstract: false,
            block: DerivationFlags::default(),
            final_: DerivationFlags::default(),
        }
    }

    /// xs:anyType: any attributes and any content, laxly
    pub fn any_type() -> Self {
        Self {
            content: ComplexContent::Model {
                model: ContentModel::any_lax(),
                mixed: true,
            },
            attributes: AttributeUses {
                uses: Default::default(),
                wildcard: Some(XsdWildcard::any_lax()),
            },
            ..Self::new(Some(QName::xsd("anyType")))
        }
    }

    /// Whether the content is a simple type
    pub fn has_simple_content(&self) -> bool {
        matches!(self.content, ComplexContent::Simple(_))
    }

    /// Whether character content is allowed next to elements
    pub fn is_mixed(&self) -> bool {
        matches!(self.content, ComplexContent::Model { mixed: true, .. })
    }
}

/// Whether type `derived` is `base` or derived from it without using a
/// method in `blocked`
///
/// Blocks declared on intermediate complex types also apply.
pub fn is_derived_from(
    components: &SchemaComponents,
    derived: TypeId,
    base: TypeId,
    blocked: DerivationFlags,
) -> bool {
    let mut current = derived;
    let mut blocked = blocked;
    for _ in 0..components.types.len() {
        if current == base {
            return true;
        }
        if current == ANY_TYPE {
            return false;
        }
        match components.type_def(current).as_complex() {
            Some(ct) => {
                if blocked.is_blocked(ct.derivation) {
                    return false;
                }
                current = ct.base;
                if let Some(next) = components.type_def(current).as_complex() {
                    blocked = blocked.union_with(&next.block);
                }
            }
            None => return simple_types::is_simple_derived(components, current, base, blocked),
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::builtins::BuiltinType;
    use crate::validators::globals::{builtin_type_id, XsdType};

    #[test]
    fn test_flags_from_attr() {
        let flags = DerivationFlags::from_attr("extension substitution");
        assert!(flags.extension);
        assert!(flags.substitution);
        assert!(!flags.restriction);
        assert_eq!(DerivationFlags::from_attr("#all"), DerivationFlags::all());
        assert!(flags.is_blocked(DerivationMethod::Extension));
    }

    #[test]
    fn test_any_type() {
        let any = XsdComplexType::any_type();
        assert!(any.is_mixed());
        assert!(any.attributes.wildcard.is_some());
        assert!(!any.has_simple_content());
    }

    #[test]
    fn test_derivation_chain() {
        let mut components = SchemaComponents::with_builtins();
        let base = components.add_type(XsdType::Complex(XsdComplexType::new(Some(QName::local("Base")))));
        let mut ext = XsdComplexType::new(Some(QName::local("Ext")));
        ext.base = base;
        ext.derivation = DerivationMethod::Extension;
        let ext = components.add_type(XsdType::Complex(ext));

        let none = DerivationFlags::default();
        assert!(is_derived_from(&components, ext, base, none));
        assert!(is_derived_from(&components, ext, ANY_TYPE, none));
        assert!(!is_derived_from(&components, base, ext, none));
        let no_ext = DerivationFlags {
            extension: true,
            ..Default::default()
        };
        assert!(!is_derived_from(&components, ext, base, no_ext));

        let string = builtin_type_id(BuiltinType::String);
        let token = builtin_type_id(BuiltinType::Token);
        assert!(is_derived_from(&components, token, string, none));
        assert!(is_derived_from(&components, token, ANY_TYPE, none));
    }
}
