//! Visibility projection - which properties a model exposes in a given context.
//!
//! A property carries an optional set of [`Lifecycle`] tags. A
//! [`VisibilityContext`] names the usage scenario a schema is produced for;
//! projecting a model under a context keeps the admitted properties and
//! computes their effective optionality.
//!
//! # Requiredness Rules
//!
//! | Property | Effect |
//! |----------|--------|
//! | discriminator of the model | always required |
//! | declared optional | optional |
//! | required, context relaxed by policy (update) | optional |
//! | required, `pinned-required` | required in every context |

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::{Model, Property, TypeGraph, TypeId, TypeNode, TypeRef};
use crate::service::Verb;

/// Lifecycle phase a property can be visible in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    Create,
    Read,
    Update,
    Delete,
    Query,
}

/// Usage scenario a schema is lowered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisibilityContext {
    /// Canonical context: response payloads and unreferenced types.
    Read,
    Create,
    Update,
    CreateOrUpdate,
    Delete,
    Query,
    /// Every property is admitted regardless of its tags.
    Unconstrained,
}

impl VisibilityContext {
    /// Lifecycle phases this context admits.
    pub fn lifecycles(&self) -> &'static [Lifecycle] {
        match self {
            VisibilityContext::Read => &[Lifecycle::Read],
            VisibilityContext::Create => &[Lifecycle::Create],
            VisibilityContext::Update => &[Lifecycle::Update],
            VisibilityContext::CreateOrUpdate => &[Lifecycle::Create, Lifecycle::Update],
            VisibilityContext::Delete => &[Lifecycle::Delete],
            VisibilityContext::Query => &[Lifecycle::Query],
            VisibilityContext::Unconstrained => &[
                Lifecycle::Create,
                Lifecycle::Read,
                Lifecycle::Update,
                Lifecycle::Delete,
                Lifecycle::Query,
            ],
        }
    }

    /// Whether a property tagged with `tags` is visible in this context.
    ///
    /// Untagged properties are visible everywhere.
    pub fn admits(&self, tags: Option<&BTreeSet<Lifecycle>>) -> bool {
        match tags {
            None => true,
            Some(tags) => self.lifecycles().iter().any(|l| tags.contains(l)),
        }
    }

    /// Definition name suffix used when a type has several context variants.
    ///
    /// Read is canonical and never suffixed.
    pub fn suffix(&self) -> &'static str {
        match self {
            VisibilityContext::Read => "",
            VisibilityContext::Create => "Create",
            VisibilityContext::Update => "Update",
            VisibilityContext::CreateOrUpdate => "CreateOrUpdate",
            VisibilityContext::Delete => "Delete",
            VisibilityContext::Query => "Query",
            VisibilityContext::Unconstrained => "All",
        }
    }

    /// Context used for the request parameters of an operation.
    pub fn for_request(verb: Verb) -> Self {
        match verb {
            Verb::Post => VisibilityContext::Create,
            Verb::Put => VisibilityContext::CreateOrUpdate,
            Verb::Patch => VisibilityContext::Update,
            Verb::Delete => VisibilityContext::Delete,
            Verb::Get | Verb::Head => VisibilityContext::Query,
        }
    }
}

/// Which contexts turn required properties into optional ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RequirednessPolicy {
    pub relaxed_contexts: BTreeSet<VisibilityContext>,
}

impl Default for RequirednessPolicy {
    fn default() -> Self {
        Self {
            relaxed_contexts: BTreeSet::from([VisibilityContext::Update]),
        }
    }
}

impl RequirednessPolicy {
    pub fn relaxes(&self, context: VisibilityContext) -> bool {
        self.relaxed_contexts.contains(&context)
    }
}

/// A property kept by a projection, with its effective optionality.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedProperty<'g> {
    pub property: &'g Property,
    pub optional: bool,
}

/// Project a model's own properties for a context.
///
/// Pure function of the model, the context and the policy.
pub fn project<'g>(
    model: &'g Model,
    context: VisibilityContext,
    policy: &RequirednessPolicy,
) -> Vec<ProjectedProperty<'g>> {
    model
        .properties
        .iter()
        .filter(|p| context.admits(p.visibility.as_ref()))
        .map(|p| {
            let is_discriminator = model.discriminator.as_deref() == Some(p.name.as_str());
            let optional = !is_discriminator
                && (p.optional || (policy.relaxes(context) && !p.pinned_required));
            ProjectedProperty {
                property: p,
                optional,
            }
        })
        .collect()
}

/// A property tagged only `read` is emitted as `readOnly`.
pub fn is_read_only(property: &Property) -> bool {
    matches!(&property.visibility, Some(tags) if tags.len() == 1 && tags.contains(&Lifecycle::Read))
}

/// `x-ms-mutability` values for a property with explicit tags.
pub fn mutability(property: &Property) -> Vec<&'static str> {
    let Some(tags) = &property.visibility else {
        return Vec::new();
    };
    [
        (Lifecycle::Read, "read"),
        (Lifecycle::Update, "update"),
        (Lifecycle::Create, "create"),
    ]
    .into_iter()
    .filter(|(l, _)| tags.contains(l))
    .map(|(_, s)| s)
    .collect()
}

/// Projection helper that also answers whether a type changes shape in a
/// context compared to the canonical Read context.
///
/// The answer is transitive: a model whose own properties project the same
/// but that holds a property of a transformed type is transformed too.
pub struct Projector<'g> {
    graph: &'g TypeGraph,
    policy: &'g RequirednessPolicy,
    transformed: HashMap<(TypeId, VisibilityContext), bool>,
}

impl<'g> Projector<'g> {
    pub fn new(graph: &'g TypeGraph, policy: &'g RequirednessPolicy) -> Self {
        Self {
            graph,
            policy,
            transformed: HashMap::new(),
        }
    }

    pub fn project(&self, model: &'g Model, context: VisibilityContext) -> Vec<ProjectedProperty<'g>> {
        project(model, context, self.policy)
    }

    /// Whether `id` lowers differently under `context` than under Read.
    ///
    /// A type is transformed when any type reachable from it (itself
    /// included) projects a different shape. Only answers covering a fully
    /// explored reachable set are cached, so cycles never pin a guess.
    pub fn is_transformed(&mut self, id: TypeId, context: VisibilityContext) -> bool {
        if context == VisibilityContext::Read {
            return false;
        }
        if let Some(&known) = self.transformed.get(&(id, context)) {
            return known;
        }

        let mut seen = HashSet::new();
        let mut stack = vec![id];
        let mut found = false;
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            match self.transformed.get(&(next, context)) {
                Some(true) => {
                    found = true;
                    break;
                }
                Some(false) => continue,
                None => {}
            }
            if self.differs_locally(next, context) {
                found = true;
                break;
            }
            stack.extend(self.successors(next, context));
        }

        if found {
            self.transformed.insert((id, context), true);
        } else {
            // Everything reachable from these was explored without a hit.
            for seen_id in seen {
                self.transformed.insert((seen_id, context), false);
            }
        }
        found
    }

    /// Whether the own properties of `id` project differently than under Read.
    fn differs_locally(&self, id: TypeId, context: VisibilityContext) -> bool {
        let graph = self.graph;
        let TypeNode::Model(model) = graph.node(id) else {
            return false;
        };
        let variant = self.project(model, context);
        let canonical = self.project(model, VisibilityContext::Read);
        variant.len() != canonical.len()
            || variant
                .iter()
                .zip(&canonical)
                .any(|(a, b)| a.property.name != b.property.name || a.optional != b.optional)
    }

    /// Types `id` lowers through under `context`.
    fn successors(&self, id: TypeId, context: VisibilityContext) -> Vec<TypeId> {
        let graph = self.graph;
        let refs: Vec<&TypeRef> = match graph.node(id) {
            TypeNode::Model(model) => self
                .project(model, context)
                .into_iter()
                .map(|p| p.property)
                .map(|property| &property.ty)
                .collect(),
            TypeNode::Array(array) => vec![&array.element],
            TypeNode::Dictionary(dict) => vec![&dict.value],
            TypeNode::Union(union) => union.variants.iter().map(|v| &v.ty).collect(),
            TypeNode::Scalar(_) | TypeNode::Enum(_) => Vec::new(),
        };
        let mut ids: Vec<TypeId> = refs
            .into_iter()
            .filter_map(|ty| match ty {
                TypeRef::Type(id) => Some(*id),
                _ => None,
            })
            .collect();
        if let TypeNode::Model(Model { base: Some(base), .. }) = graph.node(id) {
            ids.push(*base);
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Scalar;

    fn string_scalar(graph: &mut TypeGraph) -> TypeRef {
        TypeRef::Type(graph.add(Scalar::std("string")))
    }

    #[test]
    fn untagged_property_visible_everywhere() {
        assert!(VisibilityContext::Create.admits(None));
        assert!(VisibilityContext::Read.admits(None));
    }

    #[test]
    fn tags_filter_by_context() {
        let tags = BTreeSet::from([Lifecycle::Read]);
        assert!(VisibilityContext::Read.admits(Some(&tags)));
        assert!(!VisibilityContext::Create.admits(Some(&tags)));
        assert!(VisibilityContext::Unconstrained.admits(Some(&tags)));

        let tags = BTreeSet::from([Lifecycle::Update]);
        assert!(VisibilityContext::CreateOrUpdate.admits(Some(&tags)));
    }

    #[test]
    fn project_drops_invisible_properties() {
        let mut graph = TypeGraph::new();
        let s = string_scalar(&mut graph);
        let model = Model::named("Widget")
            .property(Property::new("id", s.clone()).visible(&[Lifecycle::Read]))
            .property(Property::new("name", s));

        let projected = project(&model, VisibilityContext::Create, &RequirednessPolicy::default());
        let names: Vec<_> = projected.iter().map(|p| p.property.name.as_str()).collect();
        assert_eq!(names, vec!["name"]);
    }

    #[test]
    fn update_relaxes_required_properties() {
        let mut graph = TypeGraph::new();
        let s = string_scalar(&mut graph);
        let model = Model::named("Widget")
            .property(Property::new("name", s.clone()))
            .property(Property::new("etag", s).pinned());

        let projected = project(&model, VisibilityContext::Update, &RequirednessPolicy::default());
        assert!(projected[0].optional);
        assert!(!projected[1].optional);

        let projected = project(&model, VisibilityContext::Create, &RequirednessPolicy::default());
        assert!(!projected[0].optional);
    }

    #[test]
    fn discriminator_always_required() {
        let mut graph = TypeGraph::new();
        let s = string_scalar(&mut graph);
        let model = Model::named("Pet")
            .discriminated_by("kind")
            .property(Property::new("kind", s).optional());

        for context in [VisibilityContext::Read, VisibilityContext::Update] {
            let projected = project(&model, context, &RequirednessPolicy::default());
            assert!(!projected[0].optional);
        }
    }

    #[test]
    fn read_only_and_mutability() {
        let p = Property::new("id", TypeRef::Unknown).visible(&[Lifecycle::Read]);
        assert!(is_read_only(&p));
        let p = Property::new("name", TypeRef::Unknown).visible(&[Lifecycle::Create, Lifecycle::Read]);
        assert!(!is_read_only(&p));
        assert_eq!(mutability(&p), vec!["read", "create"]);
    }

    #[test]
    fn transformed_is_transitive() {
        let mut graph = TypeGraph::new();
        let s = string_scalar(&mut graph);
        let inner = graph.add(
            Model::named("Inner").property(Property::new("id", s.clone()).visible(&[Lifecycle::Read])),
        );
        let outer = graph.add(
            Model::named("Outer")
                .property(Property::new("inner", TypeRef::Type(inner)).visible(&[Lifecycle::Read, Lifecycle::Create])),
        );
        let plain = graph.add(Model::named("Plain").property(Property::new("name", s)));

        let policy = RequirednessPolicy::default();
        let mut projector = Projector::new(&graph, &policy);
        assert!(projector.is_transformed(inner, VisibilityContext::Create));
        assert!(projector.is_transformed(outer, VisibilityContext::Create));
        assert!(!projector.is_transformed(plain, VisibilityContext::Create));
        assert!(!projector.is_transformed(outer, VisibilityContext::Read));
    }

    #[test]
    fn transformed_handles_cycles() {
        let mut graph = TypeGraph::new();
        let node = graph.reserve();
        graph.set(
            node,
            Model::named("Node").property(Property::new("next", TypeRef::Type(node)).optional()),
        );
        let policy = RequirednessPolicy::default();
        let mut projector = Projector::new(&graph, &policy);
        assert!(!projector.is_transformed(node, VisibilityContext::Create));
    }

    #[test]
    fn transformed_through_cycle_is_not_pinned_early() {
        let mut graph = TypeGraph::new();
        let s = string_scalar(&mut graph);
        let a = graph.reserve();
        let b = graph.add(Model::named("B").property(Property::new("a", TypeRef::Type(a))));
        let c = graph.add(
            Model::named("C").property(Property::new("id", s).visible(&[Lifecycle::Read])),
        );
        graph.set(
            a,
            Model::named("A")
                .property(Property::new("b", TypeRef::Type(b)))
                .property(Property::new("c", TypeRef::Type(c))),
        );

        let policy = RequirednessPolicy::default();
        let mut projector = Projector::new(&graph, &policy);
        assert!(projector.is_transformed(a, VisibilityContext::Create));
        assert!(projector.is_transformed(b, VisibilityContext::Create));
        assert!(projector.is_transformed(c, VisibilityContext::Create));
    }
}
