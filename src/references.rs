//! Late-bound schema references.
//!
//! Collection phase: lowering asks the [`SchemaTable`] for a handle per
//! (type, visibility context) pair and embeds it in the schema it is building.
//! The table guarantees one handle per pair. Finalize phase: once every pending
//! schema has a body, [`SchemaTable::finalize`] assigns export names, decides
//! local versus external form and rewrites every handle into its textual path.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::diagnostics::{Code, Diagnostics};
use crate::graph::{TypeGraph, TypeId};
use crate::schema::Schema;
use crate::types::EmitterOptions;
use crate::visibility::VisibilityContext;

/// Opaque handle to a pending schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaRef(usize);

impl SchemaRef {
    pub(crate) fn new(index: usize) -> Self {
        SchemaRef(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "&{}", self.0)
    }
}

/// A (type, context) pair awaiting its schema body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSchema {
    pub handle: SchemaRef,
    pub type_id: TypeId,
    pub context: VisibilityContext,
}

/// Final form of a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRef {
    /// Definition in the document being emitted.
    Local { name: String },
    /// Definition owned by another artifact.
    External { file: String, name: String },
}

impl ResolvedRef {
    pub fn name(&self) -> &str {
        match self {
            ResolvedRef::Local { name } | ResolvedRef::External { name, .. } => name,
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ResolvedRef::Local { .. })
    }

    /// `#/definitions/<name>` or `<file>#/definitions/<name>`.
    pub fn render(&self) -> String {
        match self {
            ResolvedRef::Local { name } => format!("#/definitions/{}", encode_component(name)),
            ResolvedRef::External { file, name } => {
                format!("{}#/definitions/{}", file, encode_component(name))
            }
        }
    }
}

/// Percent-encode a JSON pointer segment the way URI components are encoded.
pub fn encode_component(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'_'
            | b'.'
            | b'!'
            | b'~'
            | b'*'
            | b'\''
            | b'('
            | b')' => out.push(byte as char),
            other => out.push_str(&format!("%{:02X}", other)),
        }
    }
    out
}

/// Pending-schema table for one snapshot.
#[derive(Debug, Default)]
pub struct SchemaTable {
    pending: Vec<PendingSchema>,
    keys: HashMap<(TypeId, VisibilityContext), SchemaRef>,
    bodies: Vec<Option<Schema>>,
    cursor: usize,
}

/// Output of the finalize pass.
#[derive(Debug, Default)]
pub struct Finalized {
    /// Resolved form of every handle, indexed by handle.
    pub refs: Vec<ResolvedRef>,
    /// Local definitions by export name.
    pub definitions: BTreeMap<String, Schema>,
}

impl Finalized {
    pub fn resolve(&self, handle: SchemaRef) -> String {
        self.refs
            .get(handle.0)
            .map(ResolvedRef::render)
            .unwrap_or_default()
    }
}

impl SchemaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `(id, context)`, allocated on first request.
    pub fn get_or_add(&mut self, id: TypeId, context: VisibilityContext) -> SchemaRef {
        if let Some(&handle) = self.keys.get(&(id, context)) {
            return handle;
        }
        let handle = SchemaRef(self.pending.len());
        self.pending.push(PendingSchema {
            handle,
            type_id: id,
            context,
        });
        self.bodies.push(None);
        self.keys.insert((id, context), handle);
        tracing::trace!(%id, ?context, %handle, "pending schema");
        handle
    }

    /// Next pending schema that has not been handed out yet, in allocation order.
    pub fn next_pending(&mut self) -> Option<PendingSchema> {
        let next = self.pending.get(self.cursor).copied();
        if next.is_some() {
            self.cursor += 1;
        }
        next
    }

    pub fn complete(&mut self, handle: SchemaRef, schema: Schema) {
        if let Some(slot) = self.bodies.get_mut(handle.0) {
            *slot = Some(schema);
        }
    }

    /// Assign names and rewrite every handle.
    ///
    /// The Read context keeps the declared name; every other context variant
    /// gets the context suffix, so names never depend on arrival order.
    pub fn finalize(
        self,
        graph: &TypeGraph,
        options: &EmitterOptions,
        diagnostics: &mut Diagnostics,
    ) -> Finalized {
        let refs: Vec<ResolvedRef> = self
            .pending
            .iter()
            .map(|p| {
                let base = graph
                    .name_of(p.type_id)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Type{}", p.type_id.0));
                let name = format!("{}{}", base, p.context.suffix());
                match graph.node(p.type_id).library() {
                    Some(library) => ResolvedRef::External {
                        file: options.library_file_for(library),
                        name,
                    },
                    None => ResolvedRef::Local { name },
                }
            })
            .collect();

        let mut owners: BTreeMap<&str, TypeId> = BTreeMap::new();
        let mut reported: BTreeSet<&str> = BTreeSet::new();
        let mut definitions = BTreeMap::new();
        let resolve = |handle: SchemaRef| refs[handle.0].render();

        for (entry, body) in self.pending.iter().zip(self.bodies) {
            let resolved = &refs[entry.handle.0];
            if !resolved.is_local() {
                continue;
            }
            let Some(mut body) = body else {
                tracing::warn!(handle = %entry.handle, "pending schema without body");
                continue;
            };
            let name = resolved.name();
            match owners.get(name) {
                Some(&owner) if owner != entry.type_id => {
                    if reported.insert(name) {
                        diagnostics.report(
                            Code::DuplicateTypeName,
                            name,
                            format!(
                                "Duplicate type name: '{}' is used by both {} and {}.",
                                name,
                                graph.describe(owner),
                                graph.describe(entry.type_id)
                            ),
                        );
                    }
                    continue;
                }
                Some(_) => continue,
                None => {
                    owners.insert(name, entry.type_id);
                }
            }
            body.bind(&resolve);
            definitions.insert(name.to_string(), body);
        }

        tracing::debug!(
            references = refs.len(),
            definitions = definitions.len(),
            "references finalized"
        );
        Finalized { refs, definitions }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Model;

    #[test]
    fn one_handle_per_type_and_context() {
        let mut table = SchemaTable::new();
        let a = table.get_or_add(TypeId(0), VisibilityContext::Read);
        let b = table.get_or_add(TypeId(0), VisibilityContext::Read);
        let c = table.get_or_add(TypeId(0), VisibilityContext::Create);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(c.index(), 1);
    }

    #[test]
    fn next_pending_walks_in_allocation_order() {
        let mut table = SchemaTable::new();
        table.get_or_add(TypeId(3), VisibilityContext::Read);
        assert_eq!(table.next_pending().map(|p| p.type_id), Some(TypeId(3)));
        assert!(table.next_pending().is_none());
        table.get_or_add(TypeId(1), VisibilityContext::Update);
        assert_eq!(table.next_pending().map(|p| p.context), Some(VisibilityContext::Update));
    }

    #[test]
    fn finalize_names_variants_and_external_refs() {
        let mut graph = TypeGraph::new();
        let widget = graph.add(Model::named("Widget"));
        let shared = graph.add(Model::named("Error").in_library("common"));

        let mut table = SchemaTable::new();
        let read = table.get_or_add(widget, VisibilityContext::Read);
        let create = table.get_or_add(widget, VisibilityContext::Create);
        let external = table.get_or_add(shared, VisibilityContext::Read);
        table.complete(read, Schema::object());
        table.complete(create, Schema::object());

        let options = EmitterOptions::default().library_file("common", "../common.json");
        let mut diags = Diagnostics::new();
        let finalized = table.finalize(&graph, &options, &mut diags);

        assert!(diags.is_empty());
        assert_eq!(finalized.resolve(read), "#/definitions/Widget");
        assert_eq!(finalized.resolve(create), "#/definitions/WidgetCreate");
        assert_eq!(finalized.resolve(external), "../common.json#/definitions/Error");
        let names: Vec<_> = finalized.definitions.keys().cloned().collect();
        assert_eq!(names, vec!["Widget", "WidgetCreate"]);
    }

    #[test]
    fn duplicate_names_are_reported() {
        let mut graph = TypeGraph::new();
        let a = graph.add(Model::named("Thing"));
        let b = graph.add(Model::named("Thing"));
        let mut table = SchemaTable::new();
        let ha = table.get_or_add(a, VisibilityContext::Read);
        let hb = table.get_or_add(b, VisibilityContext::Read);
        table.complete(ha, Schema::object());
        table.complete(hb, Schema::string());

        let mut diags = Diagnostics::new();
        let finalized = table.finalize(&graph, &EmitterOptions::default(), &mut diags);
        assert_eq!(diags.with_code(Code::DuplicateTypeName).count(), 1);
        assert_eq!(finalized.definitions["Thing"], Schema::object());
    }

    #[test]
    fn names_are_percent_encoded() {
        let local = ResolvedRef::Local {
            name: "Foo[Bar]".into(),
        };
        assert_eq!(local.render(), "#/definitions/Foo%5BBar%5D");
        assert_eq!(encode_component("a b"), "a%20b");
    }
}
