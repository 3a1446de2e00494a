//! Structural cycle detection and promotion to named schemas.
//!
//! Edges are the ones returned by [`TypeNode::structural_edges`]. A cycle
//! through at least one referenced (named) declaration is harmless: the
//! reference breaks the expansion. Named declarations on a cycle are marked
//! must-be-named so that even named arrays and dictionaries, which are
//! normally inlined, become definitions. A cycle made only of anonymous
//! nodes cannot be expressed; those nodes are reported and excluded.

use std::collections::hash_map::Entry;
use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::diagnostics::{Code, Diagnostics};
use crate::graph::{TypeGraph, TypeId, TypeNode};

/// Result of the cycle pass for one snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Nodes on a structural cycle that have a name to be referenced by.
    pub must_be_named: BTreeSet<TypeId>,
    /// Anonymous nodes on an anonymous-only cycle; lowered as `{}`.
    pub excluded: BTreeSet<TypeId>,
}

impl CycleReport {
    pub fn must_be_named(&self, id: TypeId) -> bool {
        self.must_be_named.contains(&id)
    }

    pub fn is_excluded(&self, id: TypeId) -> bool {
        self.excluded.contains(&id)
    }
}

/// Whether a node can be addressed by a definition name.
fn is_nameable(node: &TypeNode) -> bool {
    match node {
        TypeNode::Scalar(s) => !s.std,
        other => other.name().is_some(),
    }
}

/// Run the cycle pass over every present declaration of the graph.
pub fn detect_cycles(graph: &TypeGraph, diagnostics: &mut Diagnostics) -> CycleReport {
    let mut report = CycleReport::default();

    let all = |_: TypeId| true;
    for component in cyclic_components(graph, &all) {
        for id in component {
            if is_nameable(graph.node(id)) {
                report.must_be_named.insert(id);
            }
        }
    }

    let anonymous = |id: TypeId| !is_nameable(graph.node(id));
    for component in cyclic_components(graph, &anonymous) {
        for &id in &component {
            let path = cycle_path(graph, id, &component)
                .iter()
                .map(|id| graph.describe(*id))
                .collect::<Vec<_>>()
                .join(" -> ");
            diagnostics.report(
                Code::InlineCycle,
                graph.describe(id),
                format!(
                    "Cycle detected in anonymous type; it must be named to be referenced: {}",
                    path
                ),
            );
            report.excluded.insert(id);
        }
    }

    tracing::debug!(
        named = report.must_be_named.len(),
        excluded = report.excluded.len(),
        "cycle pass complete"
    );
    report
}

/// Strongly connected components with a cycle (size > 1 or a self edge),
/// restricted to nodes accepted by `include`.
fn cyclic_components(graph: &TypeGraph, include: &dyn Fn(TypeId) -> bool) -> Vec<Vec<TypeId>> {
    let mut state = Tarjan {
        graph,
        include,
        index: 0,
        indices: HashMap::new(),
        lowlink: HashMap::new(),
        stack: Vec::new(),
        on_stack: BTreeSet::new(),
        components: Vec::new(),
    };

    for id in graph.ids() {
        if graph.is_present(id) && include(id) && !state.indices.contains_key(&id) {
            state.visit(id);
        }
    }

    state
        .components
        .into_iter()
        .filter(|c| c.len() > 1 || has_self_edge(graph, c[0]))
        .map(|mut c| {
            c.sort();
            c
        })
        .collect()
}

fn has_self_edge(graph: &TypeGraph, id: TypeId) -> bool {
    graph.node(id).structural_edges().contains(&id)
}

struct Tarjan<'g, 'f> {
    graph: &'g TypeGraph,
    include: &'f dyn Fn(TypeId) -> bool,
    index: usize,
    indices: HashMap<TypeId, usize>,
    lowlink: HashMap<TypeId, usize>,
    stack: Vec<TypeId>,
    on_stack: BTreeSet<TypeId>,
    components: Vec<Vec<TypeId>>,
}

impl Tarjan<'_, '_> {
    fn edges(&self, id: TypeId) -> Vec<TypeId> {
        self.graph
            .node(id)
            .structural_edges()
            .into_iter()
            .filter(|e| self.graph.get(*e).is_some() && self.graph.is_present(*e) && (self.include)(*e))
            .collect()
    }

    fn visit(&mut self, id: TypeId) {
        self.indices.insert(id, self.index);
        self.lowlink.insert(id, self.index);
        self.index += 1;
        self.stack.push(id);
        self.on_stack.insert(id);

        for next in self.edges(id) {
            if !self.indices.contains_key(&next) {
                self.visit(next);
                let low = self.lowlink[&id].min(self.lowlink[&next]);
                self.lowlink.insert(id, low);
            } else if self.on_stack.contains(&next) {
                let low = self.lowlink[&id].min(self.indices[&next]);
                self.lowlink.insert(id, low);
            }
        }

        if self.lowlink[&id] == self.indices[&id] {
            let mut component = Vec::new();
            while let Some(member) = self.stack.pop() {
                self.on_stack.remove(&member);
                component.push(member);
                if member == id {
                    break;
                }
            }
            self.components.push(component);
        }
    }
}

/// Shortest path from `start` back to itself inside `component`.
fn cycle_path(graph: &TypeGraph, start: TypeId, component: &[TypeId]) -> Vec<TypeId> {
    let mut previous: HashMap<TypeId, TypeId> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        for next in graph.node(current).structural_edges() {
            if !component.contains(&next) {
                continue;
            }
            if next == start {
                let mut middle = Vec::new();
                let mut at = current;
                while at != start {
                    middle.push(at);
                    at = previous[&at];
                }
                middle.reverse();
                let mut path = vec![start];
                path.extend(middle);
                path.push(start);
                return path;
            }
            if let Entry::Vacant(entry) = previous.entry(next) {
                entry.insert(current);
                queue.push_back(next);
            }
        }
    }
    vec![start]
}
