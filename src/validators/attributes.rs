//! XSD Attribute declarations, uses and groups

use indexmap::IndexMap;

use crate::namespaces::QName;

use super::globals::{AttributeGroupId, AttributeId, TypeId};
use super::wildcards::XsdWildcard;

/// Attribute use mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeUseMode {
    /// May be absent
    #[default]
    Optional,
    /// Must be present
    Required,
    /// Must be absent (removes an inherited use in a restriction)
    Prohibited,
}

impl AttributeUseMode {
    /// Parse the `use` attribute value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "optional" => Some(Self::Optional),
            "required" => Some(Self::Required),
            "prohibited" => Some(Self::Prohibited),
            _ => None,
        }
    }
}

/// An attribute declaration
#[derive(Debug, Clone)]
pub struct XsdAttribute {
    /// Expanded name
    pub name: QName,
    /// Simple type of the value
    pub type_id: TypeId,
    /// Default value
    pub default: Option<String>,
    /// Fixed value
    pub fixed: Option<String>,
}

impl XsdAttribute {
    /// Create a declaration
    pub fn new(name: QName, type_id: TypeId) -> Self {
        Self {
            name,
            type_id,
            default: None,
            fixed: None,
        }
    }
}

/// An attribute declaration as used by a complex type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUse {
    /// The declaration
    pub attribute: AttributeId,
    /// Use mode
    pub mode: AttributeUseMode,
    /// Default from the use (overrides the declaration's)
    pub default: Option<String>,
    /// Fixed value from the use (overrides the declaration's)
    pub fixed: Option<String>,
}

impl AttributeUse {
    /// An optional use of `attribute`
    pub fn new(attribute: AttributeId) -> Self {
        Self {
            attribute,
            mode: AttributeUseMode::Optional,
            default: None,
            fixed: None,
        }
    }
}

/// The attribute uses and wildcard of a complex type or attribute group
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeUses {
    /// Uses by expanded name
    pub uses: IndexMap<QName, AttributeUse>,
    /// anyAttribute
    pub wildcard: Option<XsdWildcard>,
}

impl AttributeUses {
    /// Add a use; a later use of the same name replaces the earlier one
    pub fn insert(&mut self, name: QName, attribute_use: AttributeUse) {
        self.uses.insert(name, attribute_use);
    }

    /// Look up a use by name
    pub fn get(&self, name: &QName) -> Option<&AttributeUse> {
        self.uses.get(name)
    }

    /// Uses that must be present
    pub fn required(&self) -> impl Iterator<Item = (&QName, &AttributeUse)> {
        self.uses
            .iter()
            .filter(|(_, u)| u.mode == AttributeUseMode::Required)
    }

    /// Merge another set as an extension does: uses are added and wildcards united
    pub fn extend_with(&mut self, other: &AttributeUses) {
        for (name, u) in &other.uses {
            self.uses.insert(name.clone(), u.clone());
        }
        self.wildcard = match (self.wildcard.take(), &other.wildcard) {
            (Some(mine), Some(theirs)) => Some(XsdWildcard::new(
                mine.namespace.union(&theirs.namespace),
                mine.process_contents,
            )),
            (mine, theirs) => mine.or_else(|| theirs.clone()),
        };
    }

    /// Apply a restriction: listed uses override, prohibited ones disappear,
    /// and the restriction's wildcard replaces the base's
    pub fn restrict_with(&mut self, other: &AttributeUses) {
        for (name, u) in &other.uses {
            if u.mode == AttributeUseMode::Prohibited {
                self.uses.shift_remove(name);
            } else {
                self.uses.insert(name.clone(), u.clone());
            }
        }
        self.uses.retain(|_, u| u.mode != AttributeUseMode::Prohibited);
        self.wildcard = other.wildcard.clone();
    }

    /// Add the uses of a referenced attribute group; wildcards intersect
    pub fn merge_group(&mut self, other: &AttributeUses) {
        for (name, u) in &other.uses {
            self.uses.entry(name.clone()).or_insert_with(|| u.clone());
        }
        self.wildcard = match (self.wildcard.take(), &other.wildcard) {
            (Some(mine), Some(theirs)) => Some(XsdWildcard::new(
                mine.namespace.intersection(&theirs.namespace),
                mine.process_contents,
            )),
            (mine, theirs) => mine.or_else(|| theirs.clone()),
        };
    }
}

/// A named attribute group
#[derive(Debug, Clone)]
pub struct XsdAttributeGroup {
    /// Group name
    pub name: QName,
    /// Own uses and wildcard
    pub uses: AttributeUses,
    /// Referenced attribute groups, merged at finalization
    pub group_refs: Vec<AttributeGroupId>,
}

impl XsdAttributeGroup {
    /// Create an empty group
    pub fn new(name: QName) -> Self {
        Self {
            name,
            uses: AttributeUses::default(),
            group_refs: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::wildcards::{NamespaceConstraint, ProcessContents};

    fn required(id: usize) -> AttributeUse {
        AttributeUse {
            mode: AttributeUseMode::Required,
            ..AttributeUse::new(AttributeId(id))
        }
    }

    #[test]
    fn test_use_mode_parse() {
        assert_eq!(AttributeUseMode::parse("required"), Some(AttributeUseMode::Required));
        assert_eq!(AttributeUseMode::parse("mandatory"), None);
    }

    #[test]
    fn test_extension_adds_uses() {
        let mut base = AttributeUses::default();
        base.insert(QName::local("a"), AttributeUse::new(AttributeId(0)));
        let mut ext = AttributeUses::default();
        ext.insert(QName::local("b"), required(1));
        ext.wildcard = Some(XsdWildcard::any_lax());

        base.extend_with(&ext);
        assert_eq!(base.uses.len(), 2);
        assert_eq!(base.required().count(), 1);
        assert_eq!(base.wildcard, Some(XsdWildcard::any_lax()));
    }

    #[test]
    fn test_restriction_prohibits() {
        let mut base = AttributeUses::default();
        base.insert(QName::local("a"), AttributeUse::new(AttributeId(0)));
        base.insert(QName::local("b"), AttributeUse::new(AttributeId(1)));
        base.wildcard = Some(XsdWildcard::any_lax());

        let mut restriction = AttributeUses::default();
        restriction.insert(
            QName::local("a"),
            AttributeUse {
                mode: AttributeUseMode::Prohibited,
                ..AttributeUse::new(AttributeId(0))
            },
        );
        restriction.insert(QName::local("b"), required(1));

        base.restrict_with(&restriction);
        assert!(base.get(&QName::local("a")).is_none());
        assert_eq!(base.get(&QName::local("b")).map(|u| u.mode), Some(AttributeUseMode::Required));
        assert_eq!(base.wildcard, None);
    }

    #[test]
    fn test_group_wildcards_intersect() {
        let ns = |s: &str| {
            NamespaceConstraint::Enumeration([Some(s.to_string())].into_iter().collect())
        };
        let mut a = AttributeUses {
            wildcard: Some(XsdWildcard::new(NamespaceConstraint::Any, ProcessContents::Strict)),
            ..Default::default()
        };
        let b = AttributeUses {
            wildcard: Some(XsdWildcard::new(ns("urn:x"), ProcessContents::Lax)),
            ..Default::default()
        };
        a.merge_group(&b);
        assert_eq!(a.wildcard.map(|w| w.namespace), Some(ns("urn:x")));
    }
}
