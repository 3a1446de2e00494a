//! Per-version projection of the declaration graph.
//!
//! Every snapshot works on its own [`TypeGraph`], derived from the input by
//! [`project_version`]: members that do not exist at the version are filtered
//! out and declarations that do not exist are marked withdrawn (ids stay
//! stable). The input graph is never touched, so nothing computed for one
//! version can leak into the next.

use std::collections::HashSet;

use crate::diagnostics::{Code, Diagnostics};
use crate::graph::{Availability, TypeGraph, TypeNode};
use crate::service::Service;

/// Version a snapshot is lowered for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// `None` for an unversioned service.
    pub version: Option<String>,
    /// Whether availability filtering applies.
    pub versioned: bool,
}

/// Snapshots to produce for `service`, in declaration order.
///
/// An unversioned service yields a single snapshot. `only` restricts a
/// versioned service to one of its versions; naming a version the service
/// does not declare is an error.
pub fn snapshots(service: &Service, only: Option<&str>, diagnostics: &mut Diagnostics) -> Vec<Snapshot> {
    if !service.is_versioned() {
        return vec![Snapshot {
            version: None,
            versioned: false,
        }];
    }

    match only {
        Some(version) if !service.versions.iter().any(|v| v == version) => {
            diagnostics.report(
                Code::UnknownVersion,
                &service.name,
                format!(
                    "Version '{}' is not declared by service '{}' (declared: {}).",
                    version,
                    service.name,
                    service.versions.join(", ")
                ),
            );
            Vec::new()
        }
        Some(version) => vec![Snapshot {
            version: Some(version.to_string()),
            versioned: true,
        }],
        None => service
            .versions
            .iter()
            .map(|v| Snapshot {
                version: Some(v.clone()),
                versioned: true,
            })
            .collect(),
    }
}

/// Availability check against the ordered version list of a service.
struct VersionFilter<'a> {
    versions: &'a [String],
    index: usize,
    unknown: HashSet<String>,
}

impl<'a> VersionFilter<'a> {
    fn position(&mut self, name: &str, diagnostics: &mut Diagnostics) -> Option<usize> {
        let found = self.versions.iter().position(|v| v == name);
        if found.is_none() && self.unknown.insert(name.to_string()) {
            diagnostics.report(
                Code::UnknownVersion,
                name,
                format!("Availability refers to undeclared version '{}'.", name),
            );
        }
        found
    }

    /// Unknown bounds are reported and ignored.
    fn is_available(&mut self, availability: &Availability, diagnostics: &mut Diagnostics) -> bool {
        if let Some(added) = &availability.added {
            if let Some(added) = self.position(added, diagnostics) {
                if self.index < added {
                    return false;
                }
            }
        }
        if let Some(removed) = &availability.removed {
            if let Some(removed) = self.position(removed, diagnostics) {
                if self.index >= removed {
                    return false;
                }
            }
        }
        true
    }
}

/// Derive the graph of `service` as it exists at `snapshot`.
///
/// The result holds only the projected service. Undeclared version names in
/// availability bounds are reported once per name.
pub fn project_version(
    graph: &TypeGraph,
    service: &Service,
    snapshot: &Snapshot,
    diagnostics: &mut Diagnostics,
) -> TypeGraph {
    let mut projected = TypeGraph {
        types: graph.types.clone(),
        services: vec![service.clone()],
        diagnostics: Vec::new(),
        withdrawn: graph.withdrawn.clone(),
    };

    let (true, Some(version)) = (snapshot.versioned, snapshot.version.as_deref()) else {
        return projected;
    };
    let Some(index) = service.versions.iter().position(|v| v == version) else {
        return projected;
    };
    let mut filter = VersionFilter {
        versions: &service.versions,
        index,
        unknown: HashSet::new(),
    };

    for (i, node) in projected.types.iter_mut().enumerate() {
        if !filter.is_available(node.availability(), diagnostics) {
            projected.withdrawn.insert(crate::graph::TypeId(i));
            continue;
        }
        match node {
            TypeNode::Model(model) => model
                .properties
                .retain(|p| filter.is_available(&p.availability, diagnostics)),
            TypeNode::Enum(e) => e
                .members
                .retain(|m| filter.is_available(&m.availability, diagnostics)),
            TypeNode::Union(u) => u
                .variants
                .retain(|v| filter.is_available(&v.availability, diagnostics)),
            TypeNode::Scalar(_) | TypeNode::Array(_) | TypeNode::Dictionary(_) => {}
        }
    }

    for service in &mut projected.services {
        service
            .operations
            .retain(|op| filter.is_available(&op.availability, diagnostics));
        for operation in &mut service.operations {
            operation
                .parameters
                .retain(|p| filter.is_available(&p.availability, diagnostics));
        }
    }

    tracing::debug!(
        version,
        withdrawn = projected.withdrawn.len(),
        "graph projected"
    );
    projected
}

/// `preview` for versions containing "preview", `stable` otherwise.
pub fn version_status(version: Option<&str>) -> Option<&'static str> {
    version.map(|v| if v.contains("preview") { "preview" } else { "stable" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Enum, Model, Property, Scalar, TypeId};
    use crate::service::{Operation, Verb};

    fn versioned_graph() -> (TypeGraph, TypeId) {
        let mut graph = TypeGraph::new();
        let s = graph.add(Scalar::std("string"));
        let widget = graph.add(
            Model::named("Widget")
                .property(Property::new("name", s))
                .property(Property::new("color", s).added("v2")),
        );
        graph.add(Model::named("Gadget").added("v2"));
        graph.add(Model::named("Legacy").removed("v2"));
        let graph = graph.service(
            Service::new("Contoso")
                .versions(&["v1", "v2"])
                .operation(Operation::new("get", Verb::Get, "/widgets"))
                .operation(Operation::new("list", Verb::Get, "/gadgets").added("v2")),
        );
        (graph, widget)
    }

    fn project(graph: &TypeGraph, version: &str) -> TypeGraph {
        let snapshot = Snapshot {
            version: Some(version.into()),
            versioned: true,
        };
        project_version(graph, &graph.services[0], &snapshot, &mut Diagnostics::new())
    }

    #[test]
    fn properties_follow_versions() {
        let (graph, widget) = versioned_graph();
        let v1 = project(&graph, "v1");
        let v2 = project(&graph, "v2");

        assert!(v1.model(widget).unwrap().own_property("color").is_none());
        assert!(v2.model(widget).unwrap().own_property("color").is_some());
        // The input is untouched.
        assert!(graph.model(widget).unwrap().own_property("color").is_some());
    }

    #[test]
    fn declarations_are_withdrawn_not_removed() {
        let (graph, _) = versioned_graph();
        let v1 = project(&graph, "v1");
        let v2 = project(&graph, "v2");

        assert_eq!(v1.types.len(), graph.types.len());
        assert!(!v1.is_present(TypeId(2)));
        assert!(v1.is_present(TypeId(3)));
        assert!(v2.is_present(TypeId(2)));
        assert!(!v2.is_present(TypeId(3)));
        assert_eq!(v1.services[0].operations.len(), 1);
        assert_eq!(v2.services[0].operations.len(), 2);
    }

    #[test]
    fn enum_members_are_filtered() {
        let mut graph = TypeGraph::new();
        let mut color = Enum::new("Color", &["red", "blue"]);
        color.members[1].availability.added = Some("v2".into());
        let id = graph.add(color);
        let graph = graph.service(Service::new("S").versions(&["v1", "v2"]));

        match project(&graph, "v1").node(id) {
            TypeNode::Enum(e) => assert_eq!(e.members.len(), 1),
            other => panic!("expected enum, got {:?}", other),
        }
    }

    #[test]
    fn unknown_versions_are_reported() {
        let mut graph = TypeGraph::new();
        graph.add(Model::named("Odd").added("v9"));
        let graph = graph.service(Service::new("S").versions(&["v1"]));
        let snapshot = Snapshot {
            version: Some("v1".into()),
            versioned: true,
        };
        let mut diags = Diagnostics::new();
        let projected = project_version(&graph, &graph.services[0], &snapshot, &mut diags);
        assert!(projected.is_present(TypeId(0)));
        assert_eq!(diags.with_code(Code::UnknownVersion).count(), 1);

        let mut diags = Diagnostics::new();
        assert!(snapshots(&graph.services[0], Some("v3"), &mut diags).is_empty());
        assert!(diags.has_errors());
    }

    #[test]
    fn snapshot_list() {
        let service = Service::new("S").versions(&["2023-01-01", "2024-01-01-preview"]);
        let list = snapshots(&service, None, &mut Diagnostics::new());
        assert_eq!(list.len(), 2);
        assert_eq!(version_status(list[1].version.as_deref()), Some("preview"));
        assert_eq!(version_status(list[0].version.as_deref()), Some("stable"));

        let unversioned = Service::new("S");
        let list = snapshots(&unversioned, None, &mut Diagnostics::new());
        assert_eq!(list, vec![Snapshot { version: None, versioned: false }]);
    }
}
