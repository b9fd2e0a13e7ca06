//! XSD Model Group definitions
//!
//! Declared content structure: compositors (sequence, choice, all) over
//! particles. The declared form is compiled to a [`ContentModel`] once the
//! schema is complete.
//!
//! [`ContentModel`]: super::models::ContentModel

use crate::namespaces::QName;

use super::globals::{ElementId, GroupId};
use super::particles::Occurs;
use super::wildcards::XsdWildcard;

/// Model group compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    /// Particles in order
    Sequence,
    /// Exactly one of the particles
    Choice,
    /// Particles in any order, each at most once
    All,
}

impl ModelType {
    /// Create from the XSD element local name
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sequence" => Some(Self::Sequence),
            "choice" => Some(Self::Choice),
            "all" => Some(Self::All),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequence => write!(f, "sequence"),
            Self::Choice => write!(f, "choice"),
            Self::All => write!(f, "all"),
        }
    }
}

/// What a particle contributes
#[derive(Debug, Clone, PartialEq)]
pub enum ParticleTerm {
    /// An element declaration (local or referenced global)
    Element(ElementId),
    /// An element wildcard
    Any(XsdWildcard),
    /// A nested compositor
    Group(XsdGroup),
    /// A reference to a named model group
    GroupRef(GroupId),
}

/// A term with its occurrence bounds
#[derive(Debug, Clone, PartialEq)]
pub struct GroupParticle {
    /// minOccurs/maxOccurs
    pub occurs: Occurs,
    /// The term
    pub term: ParticleTerm,
}

impl GroupParticle {
    /// Create a particle
    pub fn new(term: ParticleTerm, occurs: Occurs) -> Self {
        Self { occurs, term }
    }
}

/// A compositor and its particles; named when it is a global group
#[derive(Debug, Clone, PartialEq)]
pub struct XsdGroup {
    /// Name of a global group definition
    pub name: Option<QName>,
    /// Compositor
    pub model: ModelType,
    /// Particles in declaration order
    pub particles: Vec<GroupParticle>,
}

impl XsdGroup {
    /// Create an anonymous group
    pub fn new(model: ModelType) -> Self {
        Self {
            name: None,
            model,
            particles: Vec::new(),
        }
    }

    /// Create a named group
    pub fn named(name: QName, model: ModelType) -> Self {
        Self {
            name: Some(name),
            model,
            particles: Vec::new(),
        }
    }

    /// Add a particle to the group
    pub fn add_particle(&mut self, particle: GroupParticle) {
        self.particles.push(particle);
    }

    /// Check if the group has no particles
    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    /// Number of particles
    pub fn len(&self) -> usize {
        self.particles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_from_tag() {
        assert_eq!(ModelType::from_tag("sequence"), Some(ModelType::Sequence));
        assert_eq!(ModelType::from_tag("all"), Some(ModelType::All));
        assert_eq!(ModelType::from_tag("group"), None);
        assert_eq!(ModelType::Choice.to_string(), "choice");
    }

    #[test]
    fn test_group_particles() {
        let mut group = XsdGroup::named(QName::local("G"), ModelType::Sequence);
        assert!(group.is_empty());
        group.add_particle(GroupParticle::new(
            ParticleTerm::Element(ElementId(0)),
            Occurs::optional(),
        ));
        group.add_particle(GroupParticle::new(
            ParticleTerm::Any(XsdWildcard::any_lax()),
            Occurs::zero_or_more(),
        ));
        assert_eq!(group.len(), 2);
        assert_eq!(group.name, Some(QName::local("G")));
    }
}
