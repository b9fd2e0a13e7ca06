//! XSD Wildcard validators
//!
//! This module implements wildcards for XSD element and attribute content:
//! - xs:any - allows any element from specified namespaces
//! - xs:anyAttribute - allows any attribute from specified namespaces
//!
//! Reference: https://www.w3.org/TR/xmlschema-1/#Wildcards

use std::collections::BTreeSet;
use std::fmt;

/// Process contents mode for wildcards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessContents {
    /// Validate strictly - element/attribute must be declared
    #[default]
    Strict,
    /// Validate if declaration found, otherwise accept
    Lax,
    /// Skip validation entirely
    Skip,
}

impl ProcessContents {
    /// Parse from string value
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "strict" => Some(Self::Strict),
            "lax" => Some(Self::Lax),
            "skip" => Some(Self::Skip),
            _ => None,
        }
    }
}

/// Namespace constraint for wildcards
///
/// `None` stands for "no namespace" throughout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NamespaceConstraint {
    /// Any namespace is allowed (##any)
    #[default]
    Any,
    /// Any namespace except the given one and no namespace (##other)
    Other(Option<String>),
    /// Specific set of allowed namespaces
    Enumeration(BTreeSet<Option<String>>),
}

impl NamespaceConstraint {
    /// Create from the `namespace` attribute value
    pub fn from_namespace_attr(value: &str, target_namespace: Option<&str>) -> Result<Self, String> {
        match value.trim() {
            "##any" => Ok(Self::Any),
            "##other" => Ok(Self::Other(target_namespace.map(String::from))),
            value => {
                let mut namespaces = BTreeSet::new();
                for token in value.split_whitespace() {
                    match token {
                        "##local" => {
                            namespaces.insert(None);
                        }
                        "##targetNamespace" => {
                            namespaces.insert(target_namespace.map(String::from));
                        }
                        s if s.starts_with("##") => {
                            return Err(format!("wrong value '{}' in 'namespace' attribute", s));
                        }
                        uri => {
                            namespaces.insert(Some(uri.to_string()));
                        }
                    }
                }
                Ok(Self::Enumeration(namespaces))
            }
        }
    }

    /// Check if a namespace is allowed by this constraint
    pub fn is_allowed(&self, namespace: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Other(excluded) => namespace.is_some() && namespace != excluded.as_deref(),
            Self::Enumeration(set) => set.contains(&namespace.map(String::from)),
        }
    }

    /// Constraint admitting what either side admits (attribute wildcard extension)
    pub fn union(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Any, _) | (_, Self::Any) => Self::Any,
            (Self::Enumeration(a), Self::Enumeration(b)) => {
                Self::Enumeration(a.union(b).cloned().collect())
            }
            (Self::Other(a), Self::Other(b)) if a == b => Self::Other(a.clone()),
            (Self::Other(excluded), Self::Enumeration(set))
            | (Self::Enumeration(set), Self::Other(excluded)) => {
                if set.contains(excluded) {
                    Self::Any
                } else {
                    Self::Other(excluded.clone())
                }
            }
            _ => Self::Any,
        }
    }

    /// Constraint admitting what both sides admit (attribute group merging)
    pub fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Any, x) | (x, Self::Any) => x.clone(),
            (Self::Enumeration(a), Self::Enumeration(b)) => {
                Self::Enumeration(a.intersection(b).cloned().collect())
            }
            (Self::Other(a), Self::Other(b)) if a == b => Self::Other(a.clone()),
            (Self::Other(excluded), Self::Enumeration(set))
            | (Self::Enumeration(set), Self::Other(excluded)) => Self::Enumeration(
                set.iter()
                    .filter(|ns| ns.is_some() && *ns != excluded)
                    .cloned()
                    .collect(),
            ),
            _ => Self::Enumeration(BTreeSet::new()),
        }
    }
}

/// An element or attribute wildcard
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct XsdWildcard {
    /// Admitted namespaces
    pub namespace: NamespaceConstraint,
    /// How matched items are validated
    pub process_contents: ProcessContents,
}

impl XsdWildcard {
    /// Create a wildcard
    pub fn new(namespace: NamespaceConstraint, process_contents: ProcessContents) -> Self {
        Self {
            namespace,
            process_contents,
        }
    }

    /// The wildcard of xs:anyType content
    pub fn any_lax() -> Self {
        Self::new(NamespaceConstraint::Any, ProcessContents::Lax)
    }

    /// Check if an item in `namespace` matches
    pub fn is_namespace_allowed(&self, namespace: Option<&str>) -> bool {
        self.namespace.is_allowed(namespace)
    }
}

impl fmt::Display for XsdWildcard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            NamespaceConstraint::Any => write!(f, "##any"),
            NamespaceConstraint::Other(Some(ns)) => write!(f, "##other{{{}}}*", ns),
            NamespaceConstraint::Other(None) => write!(f, "##other*"),
            NamespaceConstraint::Enumeration(set) => {
                let parts: Vec<String> = set
                    .iter()
                    .map(|ns| match ns {
                        Some(ns) => format!("{{{}}}*", ns),
                        None => "*".to_string(),
                    })
                    .collect();
                write!(f, "{}", parts.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_contents() {
        assert_eq!(ProcessContents::parse("lax"), Some(ProcessContents::Lax));
        assert_eq!(ProcessContents::parse("none"), None);
        assert_eq!(ProcessContents::default(), ProcessContents::Strict);
    }

    #[test]
    fn test_namespace_attr() {
        let other = NamespaceConstraint::from_namespace_attr("##other", Some("urn:t")).unwrap();
        assert!(other.is_allowed(Some("urn:x")));
        assert!(!other.is_allowed(Some("urn:t")));
        assert!(!other.is_allowed(None));

        let list =
            NamespaceConstraint::from_namespace_attr("##local ##targetNamespace urn:a", Some("urn:t"))
                .unwrap();
        assert!(list.is_allowed(None));
        assert!(list.is_allowed(Some("urn:t")));
        assert!(list.is_allowed(Some("urn:a")));
        assert!(!list.is_allowed(Some("urn:b")));

        assert!(NamespaceConstraint::from_namespace_attr("##bogus", None).is_err());
    }

    #[test]
    fn test_union_and_intersection() {
        let a = NamespaceConstraint::Enumeration([Some("urn:a".to_string())].into_iter().collect());
        let other = NamespaceConstraint::Other(Some("urn:t".to_string()));
        assert_eq!(a.union(&NamespaceConstraint::Any), NamespaceConstraint::Any);
        assert_eq!(a.union(&other), other);
        assert_eq!(a.intersection(&other), a);
        assert_eq!(NamespaceConstraint::Any.intersection(&a), a);
    }

    #[test]
    fn test_display() {
        assert_eq!(XsdWildcard::any_lax().to_string(), "##any");
        let w = XsdWildcard::new(
            NamespaceConstraint::Enumeration([Some("urn:a".to_string())].into_iter().collect()),
            ProcessContents::Strict,
        );
        assert_eq!(w.to_string(), "{urn:a}*");
    }
}
