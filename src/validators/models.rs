//! Content model validation
//!
//! A complex type's particle tree is compiled into a regular expression
//! over *terms* (element declarations and wildcards) with counted
//! repetition. Child sequences are matched by taking the derivative of the
//! expression with respect to each child in turn; the remaining
//! expression is the state. Counted repetition is never unrolled, so large
//! `maxOccurs` values cost nothing extra.

use std::collections::HashMap;

use crate::namespaces::QName;

use super::globals::{ElementId, GroupId, SchemaComponents};
use super::groups::{GroupParticle, ModelType, ParticleTerm, XsdGroup};
use super::particles::Occurs;
use super::wildcards::{ProcessContents, XsdWildcard};

/// Regular expression over term indexes
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModelExpr {
    /// Matches only the empty sequence
    Empty,
    /// Matches nothing
    Fail,
    /// One occurrence of a term
    Term(usize),
    /// Concatenation
    Sequence(Vec<ModelExpr>),
    /// Alternation
    Choice(Vec<ModelExpr>),
    /// Counted repetition (expr, min, max)
    Repeat(Box<ModelExpr>, u32, Option<u32>),
    /// xs:all items as (term, required), in any order
    All(Vec<(usize, bool)>),
}

/// A leaf of the content model
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// An element declaration
    Element(ElementId),
    /// An element wildcard
    Any(XsdWildcard),
}

/// What a child element matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matched {
    /// Validate against this declaration
    Element(ElementId),
    /// Matched a wildcard with this processing mode
    Wildcard(ProcessContents),
}

/// A compiled content model
#[derive(Debug, Clone, PartialEq)]
pub struct ContentModel {
    /// The expression
    pub expr: ModelExpr,
    /// Terms referenced by index from the expression
    pub terms: Vec<Term>,
}

impl ContentModel {
    /// The content model of xs:anyType: any elements, laxly
    pub fn any_lax() -> Self {
        Self {
            expr: repeat(ModelExpr::Term(0), 0, None),
            terms: vec![Term::Any(XsdWildcard::any_lax())],
        }
    }

    /// Compile a particle, expanding group references
    ///
    /// Fails on a group that references itself.
    pub fn compile(particle: &GroupParticle, components: &SchemaComponents) -> Result<Self, String> {
        let mut compiler = Compiler {
            components,
            terms: Vec::new(),
            expanding: Vec::new(),
        };
        let expr = compiler.particle(particle)?;
        Ok(Self {
            expr,
            terms: compiler.terms,
        })
    }

    /// Whether the model accepts no children
    pub fn is_emptiable(&self) -> bool {
        nullable(&self.expr)
    }
}

struct Compiler<'a> {
    components: &'a SchemaComponents,
    terms: Vec<Term>,
    expanding: Vec<GroupId>,
}

impl Compiler<'_> {
    fn term(&mut self, term: Term) -> ModelExpr {
        self.terms.push(term);
        ModelExpr::Term(self.terms.len() - 1)
    }

    fn particle(&mut self, particle: &GroupParticle) -> Result<ModelExpr, String> {
        let Occurs { min, max } = particle.occurs;
        let inner = match &particle.term {
            ParticleTerm::Element(id) => self.term(Term::Element(*id)),
            ParticleTerm::Any(wildcard) => self.term(Term::Any(wildcard.clone())),
            ParticleTerm::Group(group) => self.group(group)?,
            ParticleTerm::GroupRef(id) => {
                if self.expanding.contains(id) {
                    let name = self
                        .components
                        .group(*id)
                        .name
                        .as_ref()
                        .map(|n| n.to_string())
                        .unwrap_or_default();
                    return Err(format!("Circular reference to the model group '{}'.", name));
                }
                self.expanding.push(*id);
                let group = self.components.group(*id);
                let expr = self.group(group)?;
                self.expanding.pop();
                expr
            }
        };
        Ok(repeat(inner, min, max))
    }

    fn group(&mut self, group: &XsdGroup) -> Result<ModelExpr, String> {
        match group.model {
            ModelType::Sequence => {
                let mut parts = Vec::with_capacity(group.particles.len());
                for particle in &group.particles {
                    parts.push(self.particle(particle)?);
                }
                Ok(seq(parts))
            }
            ModelType::Choice => {
                let mut parts = Vec::with_capacity(group.particles.len());
                for particle in &group.particles {
                    parts.push(self.particle(particle)?);
                }
                Ok(alt(parts))
            }
            ModelType::All => {
                let mut items = Vec::new();
                for particle in &group.particles {
                    if particle.occurs.is_empty() {
                        continue;
                    }
                    let term = match &particle.term {
                        ParticleTerm::Element(id) => Term::Element(*id),
                        _ => return Err("An 'all' model group may only contain element declarations.".to_string()),
                    };
                    if particle.occurs.max.map_or(true, |max| max > 1) {
                        return Err("Elements of an 'all' model group must have maxOccurs of 0 or 1.".to_string());
                    }
                    self.terms.push(term);
                    items.push((self.terms.len() - 1, particle.occurs.min > 0));
                }
                Ok(all(items))
            }
        }
    }
}

// =============================================================================
// Expression algebra
// =============================================================================

fn seq(parts: Vec<ModelExpr>) -> ModelExpr {
    let mut flat = Vec::with_capacity(parts.len());
    for part in parts {
        match part {
            ModelExpr::Fail => return ModelExpr::Fail,
            ModelExpr::Empty => {}
            ModelExpr::Sequence(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => ModelExpr::Empty,
        1 => flat.pop().unwrap_or(ModelExpr::Empty),
        _ => ModelExpr::Sequence(flat),
    }
}

fn alt(parts: Vec<ModelExpr>) -> ModelExpr {
    let mut flat: Vec<ModelExpr> = Vec::with_capacity(parts.len());
    for part in parts {
        let items = match part {
            ModelExpr::Fail => continue,
            ModelExpr::Choice(inner) => inner,
            other => vec![other],
        };
        for item in items {
            if !flat.contains(&item) {
                flat.push(item);
            }
        }
    }
    match flat.len() {
        0 => ModelExpr::Fail,
        1 => flat.pop().unwrap_or(ModelExpr::Fail),
        _ => ModelExpr::Choice(flat),
    }
}

fn repeat(expr: ModelExpr, min: u32, max: Option<u32>) -> ModelExpr {
    if max == Some(0) || expr == ModelExpr::Empty {
        return ModelExpr::Empty;
    }
    if expr == ModelExpr::Fail {
        return if min == 0 { ModelExpr::Empty } else { ModelExpr::Fail };
    }
    if min == 1 && max == Some(1) {
        return expr;
    }
    ModelExpr::Repeat(Box::new(expr), min, max)
}

fn all(items: Vec<(usize, bool)>) -> ModelExpr {
    if items.is_empty() {
        ModelExpr::Empty
    } else {
        ModelExpr::All(items)
    }
}

/// Whether the expression accepts the empty sequence
pub fn nullable(expr: &ModelExpr) -> bool {
    match expr {
        ModelExpr::Empty => true,
        ModelExpr::Fail | ModelExpr::Term(_) => false,
        ModelExpr::Sequence(parts) => parts.iter().all(nullable),
        ModelExpr::Choice(parts) => parts.iter().any(nullable),
        ModelExpr::Repeat(inner, min, _) => *min == 0 || nullable(inner),
        ModelExpr::All(items) => items.iter().all(|(_, required)| !required),
    }
}

/// Terms that can start the expression, in model order
pub fn first(expr: &ModelExpr) -> Vec<usize> {
    let mut out = Vec::new();
    collect_first(expr, &mut out);
    out
}

fn collect_first(expr: &ModelExpr, out: &mut Vec<usize>) {
    match expr {
        ModelExpr::Empty | ModelExpr::Fail => {}
        ModelExpr::Term(t) => {
            if !out.contains(t) {
                out.push(*t);
            }
        }
        ModelExpr::Sequence(parts) => {
            for part in parts {
                collect_first(part, out);
                if !nullable(part) {
                    break;
                }
            }
        }
        ModelExpr::Choice(parts) => parts.iter().for_each(|p| collect_first(p, out)),
        ModelExpr::Repeat(inner, _, _) => collect_first(inner, out),
        ModelExpr::All(items) => {
            for (t, _) in items {
                if !out.contains(t) {
                    out.push(*t);
                }
            }
        }
    }
}

/// Derivative with respect to one child matching the terms in `hit`
pub fn derive(expr: &ModelExpr, hit: &dyn Fn(usize) -> bool) -> ModelExpr {
    match expr {
        ModelExpr::Empty | ModelExpr::Fail => ModelExpr::Fail,
        ModelExpr::Term(t) => {
            if hit(*t) {
                ModelExpr::Empty
            } else {
                ModelExpr::Fail
            }
        }
        ModelExpr::Sequence(parts) => {
            let head = &parts[0];
            let rest = seq(parts[1..].to_vec());
            let through_head = seq(vec![derive(head, hit), rest.clone()]);
            if nullable(head) {
                alt(vec![through_head, derive(&rest, hit)])
            } else {
                through_head
            }
        }
        ModelExpr::Choice(parts) => alt(parts.iter().map(|p| derive(p, hit)).collect()),
        ModelExpr::Repeat(inner, min, max) => seq(vec![
            derive(inner, hit),
            repeat(
                (**inner).clone(),
                min.saturating_sub(1),
                max.map(|m| m.saturating_sub(1)),
            ),
        ]),
        ModelExpr::All(items) => alt(items
            .iter()
            .enumerate()
            .filter(|(_, (t, _))| hit(*t))
            .map(|(i, _)| {
                let mut remaining = items.clone();
                remaining.remove(i);
                all(remaining)
            })
            .collect()),
    }
}

// =============================================================================
// Model visitor
// =============================================================================

/// Walks a content model across a sequence of child elements
#[derive(Debug)]
pub struct ModelVisitor<'a> {
    model: &'a ContentModel,
    components: &'a SchemaComponents,
    substitutes: &'a HashMap<ElementId, Vec<ElementId>>,
    state: ModelExpr,
}

impl<'a> ModelVisitor<'a> {
    /// Start at the beginning of `model`
    pub fn new(
        model: &'a ContentModel,
        components: &'a SchemaComponents,
        substitutes: &'a HashMap<ElementId, Vec<ElementId>>,
    ) -> Self {
        Self {
            model,
            components,
            substitutes,
            state: model.expr.clone(),
        }
    }

    fn match_term(&self, term: usize, name: &QName) -> Option<Matched> {
        match &self.model.terms[term] {
            Term::Element(id) => {
                let decl = self.components.element(*id);
                if decl.name == *name {
                    return Some(Matched::Element(*id));
                }
                if decl.block.substitution {
                    return None;
                }
                self.substitutes
                    .get(id)?
                    .iter()
                    .find(|member| {
                        let member = self.components.element(**member);
                        member.name == *name && !member.is_abstract
                    })
                    .map(|member| Matched::Element(*member))
            }
            Term::Any(wildcard) => wildcard
                .is_namespace_allowed(name.namespace.as_deref())
                .then_some(Matched::Wildcard(wildcard.process_contents)),
        }
    }

    /// Consume one child element
    ///
    /// On failure the state is left unchanged and the expected names are
    /// returned.
    pub fn advance(&mut self, name: &QName) -> Result<Matched, Vec<String>> {
        let candidates = first(&self.state);
        let matched = candidates
            .iter()
            .find_map(|t| self.match_term(*t, name));
        match matched {
            Some(matched) => {
                let hit = |t: usize| self.match_term(t, name).is_some();
                self.state = derive(&self.state, &hit);
                Ok(matched)
            }
            None => Err(self.describe(&candidates)),
        }
    }

    /// Check that the content may end here; otherwise the expected names
    pub fn finish(&self) -> Result<(), Vec<String>> {
        if nullable(&self.state) {
            Ok(())
        } else {
            Err(self.describe(&first(&self.state)))
        }
    }

    fn describe(&self, terms: &[usize]) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for t in terms {
            let name = match &self.model.terms[*t] {
                Term::Element(id) => self.components.element(*id).name.to_string(),
                Term::Any(wildcard) => wildcard.to_string(),
            };
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Format an expected-names list the way diagnostics show it
pub fn expected_clause(names: &[String]) -> String {
    match names.len() {
        0 => String::new(),
        1 => format!(" Expected is ( {} ).", names[0]),
        _ => format!(" Expected is one of ( {} ).", names.join(", ")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::elements::XsdElement;
    use crate::validators::globals::ANY_TYPE;

    struct Fixture {
        components: SchemaComponents,
        substitutes: HashMap<ElementId, Vec<ElementId>>,
    }

    impl Fixture {
        fn new(names: &[&str]) -> (Self, Vec<ElementId>) {
            let mut components = SchemaComponents::with_builtins();
            let ids = names
                .iter()
                .map(|n| components.add_element(XsdElement::new(QName::local(*n), ANY_TYPE)))
                .collect();
            (
                Self {
                    components,
                    substitutes: HashMap::new(),
                },
                ids,
            )
        }

        fn run(&self, model: &ContentModel, children: &[&str]) -> Result<(), Vec<String>> {
            let mut visitor = ModelVisitor::new(model, &self.components, &self.substitutes);
            for child in children {
                visitor.advance(&QName::local(*child))?;
            }
            visitor.finish()
        }
    }

    fn element(id: ElementId, occurs: Occurs) -> GroupParticle {
        GroupParticle::new(ParticleTerm::Element(id), occurs)
    }

    fn group(model: ModelType, particles: Vec<GroupParticle>, occurs: Occurs) -> GroupParticle {
        let mut group = XsdGroup::new(model);
        for p in particles {
            group.add_particle(p);
        }
        GroupParticle::new(ParticleTerm::Group(group), occurs)
    }

    #[test]
    fn test_sequence_with_optional() {
        let (fx, ids) = Fixture::new(&["a", "b", "c"]);
        let particle = group(
            ModelType::Sequence,
            vec![
                element(ids[0], Occurs::once()),
                element(ids[1], Occurs::optional()),
                element(ids[2], Occurs::once()),
            ],
            Occurs::once(),
        );
        let model = ContentModel::compile(&particle, &fx.components).unwrap();
        assert!(fx.run(&model, &["a", "b", "c"]).is_ok());
        assert!(fx.run(&model, &["a", "c"]).is_ok());
        assert_eq!(fx.run(&model, &["a"]), Err(vec!["b".to_string(), "c".to_string()]));
        assert_eq!(fx.run(&model, &["b"]), Err(vec!["a".to_string()]));
        assert_eq!(fx.run(&model, &["a", "c", "c"]), Err(vec![]));
    }

    #[test]
    fn test_choice_repeated() {
        let (fx, ids) = Fixture::new(&["a", "b"]);
        let particle = group(
            ModelType::Choice,
            vec![element(ids[0], Occurs::once()), element(ids[1], Occurs::once())],
            Occurs::new(1, Some(3)),
        );
        let model = ContentModel::compile(&particle, &fx.components).unwrap();
        assert!(fx.run(&model, &["b", "a", "b"]).is_ok());
        assert!(fx.run(&model, &["a", "a", "a", "a"]).is_err());
        assert!(fx.run(&model, &[]).is_err());
    }

    #[test]
    fn test_large_max_occurs_is_counted() {
        let (fx, ids) = Fixture::new(&["row"]);
        let particle = group(
            ModelType::Sequence,
            vec![element(ids[0], Occurs::new(2, Some(100_000)))],
            Occurs::once(),
        );
        let model = ContentModel::compile(&particle, &fx.components).unwrap();
        let rows = vec!["row"; 500];
        assert!(fx.run(&model, &rows).is_ok());
        assert!(fx.run(&model, &["row"]).is_err());
    }

    #[test]
    fn test_all_group() {
        let (fx, ids) = Fixture::new(&["x", "y", "z"]);
        let particle = group(
            ModelType::All,
            vec![
                element(ids[0], Occurs::once()),
                element(ids[1], Occurs::optional()),
                element(ids[2], Occurs::once()),
            ],
            Occurs::once(),
        );
        let model = ContentModel::compile(&particle, &fx.components).unwrap();
        assert!(fx.run(&model, &["z", "x"]).is_ok());
        assert!(fx.run(&model, &["y", "z", "x"]).is_ok());
        assert!(fx.run(&model, &["x", "x"]).is_err());
        assert_eq!(fx.run(&model, &["z"]), Err(vec!["x".to_string(), "y".to_string()]));
    }

    #[test]
    fn test_wildcard_term() {
        let (fx, ids) = Fixture::new(&["a"]);
        let particle = group(
            ModelType::Sequence,
            vec![
                element(ids[0], Occurs::once()),
                GroupParticle::new(ParticleTerm::Any(XsdWildcard::any_lax()), Occurs::zero_or_more()),
            ],
            Occurs::once(),
        );
        let model = ContentModel::compile(&particle, &fx.components).unwrap();
        let mut visitor = ModelVisitor::new(&model, &fx.components, &fx.substitutes);
        assert_eq!(visitor.advance(&QName::local("a")), Ok(Matched::Element(ids[0])));
        assert_eq!(
            visitor.advance(&QName::namespaced("urn:x", "anything")),
            Ok(Matched::Wildcard(ProcessContents::Lax))
        );
        assert!(visitor.finish().is_ok());
    }

    #[test]
    fn test_substitution_group_member() {
        let (mut fx, ids) = Fixture::new(&["head", "member"]);
        fx.substitutes.insert(ids[0], vec![ids[1]]);
        let particle = element(ids[0], Occurs::once());
        let model = ContentModel::compile(&particle, &fx.components).unwrap();
        let mut visitor = ModelVisitor::new(&model, &fx.components, &fx.substitutes);
        assert_eq!(visitor.advance(&QName::local("member")), Ok(Matched::Element(ids[1])));
    }

    #[test]
    fn test_circular_group_reference() {
        let (mut fx, ids) = Fixture::new(&["a"]);
        let mut g = XsdGroup::named(QName::local("G"), ModelType::Sequence);
        g.add_particle(element(ids[0], Occurs::once()));
        g.add_particle(GroupParticle::new(ParticleTerm::GroupRef(GroupId(0)), Occurs::optional()));
        let gid = fx.components.add_group(g);
        let particle = GroupParticle::new(ParticleTerm::GroupRef(gid), Occurs::once());
        let err = ContentModel::compile(&particle, &fx.components).unwrap_err();
        assert!(err.contains("Circular"));
    }

    #[test]
    fn test_any_type_model() {
        let model = ContentModel::any_lax();
        assert!(model.is_emptiable());
    }

    #[test]
    fn test_expected_clause() {
        assert_eq!(expected_clause(&["a".into()]), " Expected is ( a ).");
        assert_eq!(
            expected_clause(&["a".into(), "b".into()]),
            " Expected is one of ( a, b )."
        );
        assert_eq!(expected_clause(&[]), "");
    }
}
