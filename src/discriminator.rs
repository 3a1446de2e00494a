//! Discriminator resolution across inheritance.
//!
//! For every model declaring a discriminator, all transitive subtypes are
//! walked. A subtype that declares the discriminator property contributes the
//! literal values of that property; values flow through nested
//! discriminated roots, so `Beagle extends Dog extends Pet` is checked
//! against every other subtype of `Pet`.
//!
//! # Accepted value kinds
//!
//! | Property type | Values |
//! |---------------|--------|
//! | string literal | the literal |
//! | member of a string enum | the member value |
//! | string enum | every member value |
//! | union | values of every variant, recursively |
//!
//! Anything else (numbers, scalars, models, optional properties) is an
//! `invalid-discriminator-value` error. Problems are collected, never
//! fail-fast.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::diagnostics::{Code, Diagnostics};
use crate::graph::{Model, TypeGraph, TypeId, TypeNode, TypeRef};

/// Resolved discriminator data for one discriminated root.
#[derive(Debug, Clone, PartialEq)]
pub struct DiscriminatorInfo {
    /// Name of the discriminator property.
    pub property: String,
    /// Values contributed by each subtype that declares the property.
    pub values: BTreeMap<TypeId, Vec<String>>,
}

/// Discriminator data for a whole snapshot.
#[derive(Debug, Clone, Default)]
pub struct DiscriminatorIndex {
    roots: BTreeMap<TypeId, DiscriminatorInfo>,
    /// Single discriminator value of a subtype (`x-ms-discriminator-value`).
    values: HashMap<TypeId, String>,
}

/// Why a declared discriminator property could not produce values.
enum Rejection {
    Kind(&'static str),
    Optional,
}

impl DiscriminatorIndex {
    /// Resolve every discriminated root of the graph.
    pub fn resolve(graph: &TypeGraph, diagnostics: &mut Diagnostics) -> Self {
        let derived = graph.derived_index();
        let mut index = DiscriminatorIndex::default();

        for id in graph.ids() {
            if !graph.is_present(id) {
                continue;
            }
            let Some(property) = graph.model(id).and_then(|m| m.discriminator.clone()) else {
                continue;
            };
            let info = resolve_root(graph, &derived, id, property, diagnostics);
            index.roots.insert(id, info);
        }

        // The nearest root wins when a subtype declares values for several.
        for id in graph.ids() {
            let Some(model) = graph.model(id) else { continue };
            for root in ancestors(graph, model) {
                let Some(info) = index.roots.get(&root) else { continue };
                if let Some(values) = info.values.get(&id) {
                    if let [single] = values.as_slice() {
                        index.values.insert(id, single.clone());
                    }
                    break;
                }
            }
        }

        tracing::debug!(roots = index.roots.len(), "discriminators resolved");
        index
    }

    /// The `x-ms-discriminator-value` of a subtype, if it has exactly one.
    pub fn discriminator_value(&self, id: TypeId) -> Option<&str> {
        self.values.get(&id).map(String::as_str)
    }

    /// Discriminator properties of every discriminated ancestor of `model`.
    ///
    /// These are owned by the ancestor's schema and left out of the subtype's.
    pub fn inherited_properties(&self, graph: &TypeGraph, model: &Model) -> BTreeSet<String> {
        ancestors(graph, model)
            .into_iter()
            .filter_map(|root| self.roots.get(&root))
            .map(|info| info.property.clone())
            .collect()
    }
}

/// Base chain of a model, nearest first. Stops on inheritance loops.
fn ancestors(graph: &TypeGraph, model: &Model) -> Vec<TypeId> {
    let mut chain = Vec::new();
    let mut next = model.base;
    while let Some(base) = next {
        if chain.contains(&base) || graph.get(base).is_none() {
            break;
        }
        chain.push(base);
        next = graph.model(base).and_then(|m| m.base);
    }
    chain
}

fn resolve_root(
    graph: &TypeGraph,
    derived: &BTreeMap<TypeId, Vec<TypeId>>,
    root: TypeId,
    property: String,
    diagnostics: &mut Diagnostics,
) -> DiscriminatorInfo {
    let mut info = DiscriminatorInfo {
        property,
        values: BTreeMap::new(),
    };
    let mut owners: BTreeMap<String, Vec<TypeId>> = BTreeMap::new();
    let mut visited = BTreeSet::from([root]);

    for &child in derived.get(&root).into_iter().flatten() {
        walk_subtype(
            graph,
            derived,
            child,
            false,
            &mut info,
            &mut owners,
            &mut visited,
            diagnostics,
        );
    }
    info
}

#[allow(clippy::too_many_arguments)]
fn walk_subtype(
    graph: &TypeGraph,
    derived: &BTreeMap<TypeId, Vec<TypeId>>,
    id: TypeId,
    declared_above: bool,
    info: &mut DiscriminatorInfo,
    owners: &mut BTreeMap<String, Vec<TypeId>>,
    visited: &mut BTreeSet<TypeId>,
    diagnostics: &mut Diagnostics,
) {
    if !visited.insert(id) {
        return;
    }
    let Some(model) = graph.model(id) else { return };
    let name = graph.describe(id);

    let mut declared = declared_above;
    if let Some(prop) = model.own_property(&info.property) {
        declared = true;
        match property_values(graph, &prop.ty, prop.optional) {
            Ok(values) => {
                for value in &values {
                    let previous = owners.entry(value.clone()).or_default();
                    if previous.contains(&id) {
                        continue;
                    }
                    for &other in previous.iter() {
                        diagnostics.report(
                            Code::DuplicateDiscriminatorValue,
                            name.clone(),
                            format!(
                                "Discriminator value \"{}\" is already used in another variant ({}).",
                                value,
                                graph.describe(other)
                            ),
                        );
                    }
                    previous.push(id);
                }
                info.values.insert(id, values);
            }
            Err(Rejection::Optional) => diagnostics.report(
                Code::InvalidDiscriminatorValue,
                format!("{}.{}", name, info.property),
                "The discriminator property must be a required property.",
            ),
            Err(Rejection::Kind(kind)) => diagnostics.report(
                Code::InvalidDiscriminatorValue,
                format!("{}.{}", name, info.property),
                format!(
                    "Discriminator value should be a string, union of string or string enum but was {}.",
                    kind
                ),
            ),
        }
    }

    let children = derived.get(&id).map(Vec::as_slice).unwrap_or_default();
    if children.is_empty() {
        if !declared {
            diagnostics.report(
                Code::MissingDiscriminatorProperty,
                name,
                format!(
                    "Each derived model of a discriminated model type should have set the discriminator property (\"{0}\") or have a derived model which has. Add `{0}: \"<discriminator-value>\"`",
                    info.property
                ),
            );
        }
        return;
    }
    for &child in children {
        walk_subtype(graph, derived, child, declared, info, owners, visited, diagnostics);
    }
}

/// Literal string values a discriminator property type stands for.
fn property_values(graph: &TypeGraph, ty: &TypeRef, optional: bool) -> Result<Vec<String>, Rejection> {
    if optional {
        return Err(Rejection::Optional);
    }
    let mut values = Vec::new();
    collect_values(graph, ty, &mut values, &mut BTreeSet::new())?;
    Ok(values)
}

fn collect_values(
    graph: &TypeGraph,
    ty: &TypeRef,
    values: &mut Vec<String>,
    seen: &mut BTreeSet<TypeId>,
) -> Result<(), Rejection> {
    match ty {
        TypeRef::String(s) => values.push(s.clone()),
        TypeRef::EnumMember { enum_id, member } => {
            let value = match graph.get(*enum_id) {
                Some(TypeNode::Enum(e)) => e.member(member).and_then(|m| m.string_value()),
                _ => None,
            };
            match value {
                Some(v) => values.push(v.to_string()),
                None => return Err(Rejection::Kind("EnumMember")),
            }
        }
        TypeRef::Type(id) => {
            if !seen.insert(*id) {
                return Ok(());
            }
            match graph.get(*id) {
                Some(TypeNode::Union(union)) => {
                    for variant in &union.variants {
                        collect_values(graph, &variant.ty, values, seen)?;
                    }
                }
                Some(TypeNode::Enum(e)) => {
                    for member in &e.members {
                        match member.string_value() {
                            Some(v) => values.push(v.to_string()),
                            None => return Err(Rejection::Kind("Enum")),
                        }
                    }
                }
                Some(TypeNode::Scalar(_)) => return Err(Rejection::Kind("Scalar")),
                Some(TypeNode::Model(_)) => return Err(Rejection::Kind("Model")),
                Some(TypeNode::Array(_)) | Some(TypeNode::Dictionary(_)) => {
                    return Err(Rejection::Kind("Model"))
                }
                None => return Err(Rejection::Kind("Intrinsic")),
            }
        }
        TypeRef::Number(_) => return Err(Rejection::Kind("Number")),
        TypeRef::Boolean(_) => return Err(Rejection::Kind("Boolean")),
        TypeRef::Null | TypeRef::Unknown => return Err(Rejection::Kind("Intrinsic")),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Enum, Property, Scalar, Union};

    fn pets(graph: &mut TypeGraph) -> TypeId {
        graph.add(Model::named("Pet").discriminated_by("kind"))
    }

    #[test]
    fn string_literals_resolve() {
        let mut graph = TypeGraph::new();
        let pet = pets(&mut graph);
        let cat = graph.add(
            Model::named("Cat")
                .extends(pet)
                .property(Property::new("kind", TypeRef::string("cat"))),
        );
        let dog = graph.add(
            Model::named("Dog")
                .extends(pet)
                .property(Property::new("kind", TypeRef::string("dog"))),
        );

        let mut diags = Diagnostics::new();
        let index = DiscriminatorIndex::resolve(&graph, &mut diags);
        assert!(diags.is_empty(), "{:?}", diags);
        assert_eq!(index.discriminator_value(cat), Some("cat"));
        assert_eq!(index.discriminator_value(dog), Some("dog"));
        let values: BTreeSet<&str> = index.roots[&pet]
            .values
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        assert_eq!(values, BTreeSet::from(["cat", "dog"]));
        let cat_model = graph.model(cat).unwrap();
        assert_eq!(
            index.inherited_properties(&graph, cat_model),
            BTreeSet::from(["kind".to_string()])
        );
    }

    #[test]
    fn enum_members_and_unions_resolve() {
        let mut graph = TypeGraph::new();
        let kinds = graph.add(Enum::new("PetKind", &["cat", "dog"]));
        let union = graph.add(Union::of(vec![TypeRef::string("a"), TypeRef::string("b")]));
        let pet = pets(&mut graph);
        let cat = graph.add(
            Model::named("Cat")
                .extends(pet)
                .property(Property::new("kind", TypeRef::member(kinds, "cat"))),
        );
        let other = graph.add(
            Model::named("Other")
                .extends(pet)
                .property(Property::new("kind", union)),
        );

        let mut diags = Diagnostics::new();
        let index = DiscriminatorIndex::resolve(&graph, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(index.discriminator_value(cat), Some("cat"));
        assert_eq!(index.discriminator_value(other), None);
        assert_eq!(index.roots[&pet].values[&other], vec!["a", "b"]);
    }

    #[test]
    fn invalid_and_missing_properties_are_all_reported() {
        let mut graph = TypeGraph::new();
        let int32 = graph.add(Scalar::std("int32"));
        let pet = pets(&mut graph);
        graph.add(
            Model::named("Dog")
                .extends(pet)
                .property(Property::new("petType", TypeRef::string("dog"))),
        );
        graph.add(
            Model::named("Pig")
                .extends(pet)
                .property(Property::new("kind", int32)),
        );
        graph.add(
            Model::named("Tiger")
                .extends(pet)
                .property(Property::new("kind", TypeRef::string("tiger")).optional()),
        );

        let mut diags = Diagnostics::new();
        DiscriminatorIndex::resolve(&graph, &mut diags);
        assert_eq!(diags.with_code(Code::MissingDiscriminatorProperty).count(), 1);
        let invalid: Vec<_> = diags
            .with_code(Code::InvalidDiscriminatorValue)
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(
            invalid,
            vec![
                "Discriminator value should be a string, union of string or string enum but was Scalar.",
                "The discriminator property must be a required property.",
            ]
        );
    }

    #[test]
    fn duplicates_reported_once_per_pair() {
        let mut graph = TypeGraph::new();
        let pet = pets(&mut graph);
        let cat_kinds = graph.add(Union::of(vec![
            TypeRef::string("cat"),
            TypeRef::string("housepet"),
        ]));
        let dog_kinds = graph.add(Union::of(vec![
            TypeRef::string("dog"),
            TypeRef::string("housepet"),
        ]));
        graph.add(Model::named("Cat").extends(pet).property(Property::new("kind", cat_kinds)));
        graph.add(Model::named("Dog").extends(pet).property(Property::new("kind", dog_kinds)));
        graph.add(
            Model::named("Beagle")
                .extends(pet)
                .property(Property::new("kind", TypeRef::string("dog"))),
        );

        let mut diags = Diagnostics::new();
        DiscriminatorIndex::resolve(&graph, &mut diags);
        let messages: Vec<_> = diags
            .with_code(Code::DuplicateDiscriminatorValue)
            .map(|d| d.message.clone())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("\"housepet\""));
        assert!(messages[1].contains("\"dog\""));
    }

    #[test]
    fn nested_roots_flatten_into_outer_root() {
        let mut graph = TypeGraph::new();
        let pet = pets(&mut graph);
        let dog = graph.add(
            Model::named("Dog")
                .extends(pet)
                .discriminated_by("breed")
                .property(Property::new("kind", TypeRef::string("dog"))),
        );
        let beagle = graph.add(
            Model::named("Beagle")
                .extends(dog)
                .property(Property::new("breed", TypeRef::string("beagle"))),
        );
        // Deeper level reusing an outer value is an indirect duplicate.
        graph.add(
            Model::named("Impostor")
                .extends(dog)
                .property(Property::new("breed", TypeRef::string("poodle")))
                .property(Property::new("kind", TypeRef::string("dog"))),
        );

        let mut diags = Diagnostics::new();
        let index = DiscriminatorIndex::resolve(&graph, &mut diags);
        assert_eq!(index.discriminator_value(dog), Some("dog"));
        assert_eq!(index.discriminator_value(beagle), Some("beagle"));
        assert_eq!(diags.with_code(Code::DuplicateDiscriminatorValue).count(), 1);
        assert_eq!(diags.with_code(Code::MissingDiscriminatorProperty).count(), 0);

        let beagle_model = graph.model(beagle).unwrap();
        assert_eq!(
            index.inherited_properties(&graph, beagle_model),
            BTreeSet::from(["breed".to_string(), "kind".to_string()])
        );
    }

    #[test]
    fn unrelated_roots_are_not_compared() {
        let mut graph = TypeGraph::new();
        let pet = pets(&mut graph);
        let toy = graph.add(Model::named("Toy").discriminated_by("kind"));
        graph.add(Model::named("Cat").extends(pet).property(Property::new("kind", TypeRef::string("x"))));
        graph.add(Model::named("Ball").extends(toy).property(Property::new("kind", TypeRef::string("x"))));

        let mut diags = Diagnostics::new();
        DiscriminatorIndex::resolve(&graph, &mut diags);
        assert!(diags.is_empty());
    }
}
