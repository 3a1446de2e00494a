//! Schema lowering for one snapshot.
//!
//! [`LowerContext`] owns every per-snapshot cache: the visibility projector,
//! the cycle report, the discriminator index and the pending-schema table.
//! It is threaded through every lowering call; nothing is global.
//!
//! # Inline or reference
//!
//! | Declaration | Lowered as |
//! |-------------|------------|
//! | anonymous model / union | inline |
//! | std scalar | inline |
//! | array, dictionary | inline, unless named and on a cycle |
//! | named model / union, enum, custom scalar | `$ref` |

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;

use crate::cycles::{detect_cycles, CycleReport};
use crate::diagnostics::{Code, Diagnostics};
use crate::discriminator::DiscriminatorIndex;
use crate::graph::{
    ArrayType, DictionaryType, Enum, EnumValue, Model, Property, Scalar, TypeGraph, TypeId,
    TypeNode, TypeRef, Union,
};
use crate::references::{Finalized, SchemaTable};
use crate::schema::{number_value, Properties, Schema, SchemaType, XmsEnum};
use crate::types::EmitterOptions;
use crate::visibility::{is_read_only, mutability, Projector, VisibilityContext};

/// String formats representable in the target dialect.
const ALLOWED_STRING_FORMATS: &[&str] = &[
    "char",
    "binary",
    "byte",
    "certificate",
    "date",
    "time",
    "date-time",
    "date-time-rfc1123",
    "date-time-rfc7231",
    "duration",
    "password",
    "uuid",
    "base64url",
    "uri",
    "url",
    "arm-id",
];

pub struct LowerContext<'g> {
    pub graph: &'g TypeGraph,
    pub options: &'g EmitterOptions,
    projector: Projector<'g>,
    cycles: CycleReport,
    discriminators: DiscriminatorIndex,
    derived: BTreeMap<TypeId, Vec<TypeId>>,
    table: SchemaTable,
    pub diagnostics: Diagnostics,
    /// Problems already reported; inline types are lowered many times.
    reported: HashSet<(String, Code)>,
}

impl<'g> LowerContext<'g> {
    /// Run the graph-wide pre-passes (cycles, discriminators) and set up the caches.
    pub fn new(graph: &'g TypeGraph, options: &'g EmitterOptions) -> Self {
        let mut diagnostics = Diagnostics::new();
        let cycles = detect_cycles(graph, &mut diagnostics);
        let discriminators = DiscriminatorIndex::resolve(graph, &mut diagnostics);
        Self {
            graph,
            options,
            projector: Projector::new(graph, &options.requiredness),
            cycles,
            discriminators,
            derived: graph.derived_index(),
            table: SchemaTable::new(),
            diagnostics,
            reported: HashSet::new(),
        }
    }

    fn report_once(&mut self, target: String, code: Code, message: impl Into<String>) {
        if self.reported.insert((target.clone(), code)) {
            self.diagnostics.report(code, target, message);
        }
    }

    fn report_type(&mut self, id: TypeId, code: Code, message: impl Into<String>) {
        let target = self.graph.describe(id);
        self.report_once(target, code, message);
    }

    /// Whether a declaration is expanded in place rather than referenced.
    pub fn should_inline(&self, id: TypeId) -> bool {
        match self.graph.node(id) {
            TypeNode::Model(m) => m.name.is_none(),
            TypeNode::Scalar(s) => s.std,
            TypeNode::Enum(_) => false,
            TypeNode::Union(u) => u.name.is_none(),
            TypeNode::Array(ArrayType { name, .. }) | TypeNode::Dictionary(DictionaryType { name, .. }) => {
                name.is_none() || !self.cycles.must_be_named(id)
            }
        }
    }

    /// Schema for a use site: an inline body or a late-bound reference.
    pub fn schema_or_ref(&mut self, ty: &TypeRef, context: VisibilityContext) -> Schema {
        match ty {
            TypeRef::Type(id) => {
                let id = *id;
                if self.graph.get(id).is_none()
                    || !self.graph.is_present(id)
                    || self.cycles.is_excluded(id)
                {
                    return Schema::default();
                }
                if self.should_inline(id) {
                    return self.schema_for_type(id, context);
                }
                // Types projecting like Read share the canonical schema.
                let context = if self.projector.is_transformed(id, context) {
                    context
                } else {
                    VisibilityContext::Read
                };
                Schema::pending(self.table.get_or_add(id, context))
            }
            TypeRef::String(s) => literal(SchemaType::String, Value::String(s.clone())),
            TypeRef::Number(n) => literal(SchemaType::Number, number_value(*n)),
            TypeRef::Boolean(b) => literal(SchemaType::Boolean, Value::Bool(*b)),
            TypeRef::EnumMember { enum_id, member } => {
                let value = match self.graph.get(*enum_id) {
                    Some(TypeNode::Enum(e)) => e.member(member).map(|m| m.json_value()),
                    _ => None,
                };
                match value {
                    Some(v @ Value::Number(_)) => literal(SchemaType::Number, v),
                    Some(v) => literal(SchemaType::String, v),
                    None => Schema::default(),
                }
            }
            TypeRef::Null => Schema {
                nullable: Some(true),
                ..Schema::default()
            },
            TypeRef::Unknown => Schema::default(),
        }
    }

    /// Full schema body of a declaration under a context.
    pub fn schema_for_type(&mut self, id: TypeId, context: VisibilityContext) -> Schema {
        let graph = self.graph;
        match graph.node(id) {
            TypeNode::Model(model) => self.model_schema(id, model, context),
            TypeNode::Scalar(scalar) => self.scalar_schema(id, scalar, &mut Vec::new()),
            TypeNode::Enum(e) => self.enum_schema(id, e),
            TypeNode::Union(union) => self.union_schema(id, union, context),
            TypeNode::Array(array) => {
                Schema::array(self.schema_or_ref(&array.element, context)).with_description(array.doc.as_deref())
            }
            TypeNode::Dictionary(dict) => {
                let mut schema = Schema::object().with_description(dict.doc.as_deref());
                schema.additional_properties = Some(Box::new(self.schema_or_ref(&dict.value, context)));
                schema
            }
        }
    }

    fn model_schema(&mut self, id: TypeId, model: &'g Model, context: VisibilityContext) -> Schema {
        let graph = self.graph;
        let mut schema = Schema::object().with_description(model.doc.as_deref());

        if model.base.is_some() {
            if let Some(value) = self.discriminators.discriminator_value(id) {
                schema.discriminator_value = Some(value.to_string());
            }
        }

        // Subtypes are emitted whenever their base is.
        if model.name.is_some() {
            let children = self.derived.get(&id).cloned().unwrap_or_default();
            for child in children {
                self.schema_or_ref(&TypeRef::Type(child), context);
            }
        }

        let hidden = self.discriminators.inherited_properties(graph, model);
        let mut properties = Vec::new();
        let mut required = Vec::new();

        if let Some(property) = &model.discriminator {
            schema.discriminator = Some(property.clone());
            if model.own_property(property).is_none() {
                properties.push((property.clone(), Schema::string()));
                required.push(property.clone());
            }
        }

        for projected in self.projector.project(model, context) {
            let property = projected.property;
            if hidden.contains(&property.name) {
                continue;
            }
            if !projected.optional {
                required.push(property.name.clone());
            }
            let property_schema = self.property_schema(id, property, context);
            properties.push((property.name.clone(), property_schema));
        }

        if let Some(base) = model.base {
            schema.all_of = Some(vec![self.schema_or_ref(&TypeRef::Type(base), context)]);
        }
        if !properties.is_empty() {
            schema.properties = Some(Properties(properties));
        }
        if !required.is_empty() {
            schema.required = Some(required);
        }
        schema
    }

    /// Schema of a model property, with the property's own annotations applied.
    pub fn property_schema(&mut self, owner: TypeId, property: &Property, context: VisibilityContext) -> Schema {
        let mut schema = self.schema_or_ref(&property.ty, context);

        if let Some(format) = &property.format {
            let target = format!("{}.{}", self.graph.describe(owner), property.name);
            self.apply_format(target, &mut schema, format);
        }
        if let Some(doc) = &property.doc {
            schema.description = Some(doc.clone());
        }
        if let Some(default) = &property.default {
            if !schema.is_ref() {
                schema.default = Some(default.clone());
            }
        }
        if is_read_only(property) {
            schema.read_only = Some(true);
        } else {
            let mutability = mutability(property);
            if !mutability.is_empty() {
                schema.mutability = Some(mutability.into_iter().map(String::from).collect());
            }
        }
        schema
    }

    fn apply_format(&mut self, target: String, schema: &mut Schema, format: &str) {
        if schema.schema_type != Some(SchemaType::String) {
            return;
        }
        if ALLOWED_STRING_FORMATS.contains(&format.to_lowercase().as_str()) {
            schema.format = Some(format.to_string());
        } else {
            self.report_once(
                target,
                Code::InvalidFormat,
                format!("'string' format '{}' is not supported in Swagger 2.0; it is dropped.", format),
            );
        }
    }

    fn scalar_schema(&mut self, id: TypeId, scalar: &'g Scalar, seen: &mut Vec<TypeId>) -> Schema {
        if scalar.std {
            return self.std_scalar_schema(id, &scalar.name);
        }
        seen.push(id);

        let graph = self.graph;
        let mut schema = match scalar.base {
            Some(base) if !seen.contains(&base) => match graph.get(base) {
                Some(TypeNode::Scalar(base_scalar)) => self.scalar_schema(base, base_scalar, seen),
                _ => Schema::default(),
            },
            _ => Schema::default(),
        };
        if let Some(format) = &scalar.format {
            self.apply_format(graph.describe(id), &mut schema, format);
        }
        schema.description = scalar.doc.clone();
        schema
    }

    fn std_scalar_schema(&mut self, id: TypeId, name: &str) -> Schema {
        let nonspecific = |this: &mut Self, chosen: &str| {
            this.report_type(
                id,
                Code::NonspecificScalar,
                format!(
                    "Scalar type '{}' is not specific enough. The more specific type '{}' has been chosen.",
                    name, chosen
                ),
            );
        };
        match name {
            "bytes" => Schema::string().with_format("byte"),
            "numeric" => {
                nonspecific(self, "int64");
                Schema::integer().with_format("int64")
            }
            "integer" => {
                nonspecific(self, "int64");
                Schema::integer().with_format("int64")
            }
            "int8" | "int16" | "int32" | "int64" | "uint8" | "uint16" | "uint32" | "uint64" => {
                Schema::integer().with_format(name)
            }
            "safeint" => Schema::integer().with_format("int64"),
            "float" => {
                nonspecific(self, "float64");
                Schema::number()
            }
            "float64" => Schema::number().with_format("double"),
            "float32" => Schema::number().with_format("float"),
            "decimal" | "decimal128" => Schema::number().with_format("decimal"),
            "string" => Schema::string(),
            "boolean" => Schema::boolean(),
            "plainDate" => Schema::string().with_format("date"),
            "utcDateTime" | "offsetDateTime" => Schema::string().with_format("date-time"),
            "plainTime" => Schema::string().with_format("time"),
            "duration" => Schema::string().with_format("duration"),
            "url" => Schema::string().with_format("uri"),
            _ => Schema::default(),
        }
    }

    fn enum_schema(&mut self, id: TypeId, e: &'g Enum) -> Schema {
        let Some(first) = e.members.first() else {
            self.report_type(id, Code::UnionUnsupported, "Empty enums are not supported.");
            return Schema::default();
        };
        let member_type = |value: &Option<EnumValue>| match value {
            Some(EnumValue::Number(_)) => SchemaType::Number,
            _ => SchemaType::String,
        };
        let schema_type = member_type(&first.value);

        let mut values = Vec::new();
        for member in &e.members {
            if member_type(&member.value) != schema_type {
                self.report_type(
                    id,
                    Code::UnionUnsupported,
                    "Enums mixing string and numeric members are not supported.",
                );
                continue;
            }
            values.push(member.json_value());
        }

        let mut schema = Schema::new(schema_type).with_description(e.doc.as_deref());
        schema.enum_values = Some(values);
        schema.ms_enum = Some(XmsEnum {
            name: Some(e.name.clone()),
            model_as_string: false,
        });
        schema
    }

    fn union_schema(&mut self, id: TypeId, union: &'g Union, context: VisibilityContext) -> Schema {
        let non_null: Vec<&TypeRef> = union
            .variants
            .iter()
            .map(|v| &v.ty)
            .filter(|ty| **ty != TypeRef::Null)
            .collect();
        let nullable = non_null.len() != union.variants.len();

        if non_null.is_empty() {
            self.report_type(id, Code::UnionNull, "Cannot have a union containing only null types.");
            return Schema::default();
        }

        if let [single] = non_null.as_slice() {
            let schema = self.schema_or_ref(single, context);
            let is_model = matches!(
                single.type_id().and_then(|t| self.graph.get(t)),
                Some(TypeNode::Model(_))
            );
            let mut schema = if nullable && schema.is_ref() && is_model {
                Schema {
                    all_of: Some(vec![schema]),
                    ..Schema::object()
                }
            } else {
                schema
            };
            if nullable {
                schema.nullable = Some(true);
            }
            return schema;
        }

        match union_as_enum(self.graph, &non_null) {
            Some((schema_type, values)) => {
                let mut schema = Schema::new(schema_type).with_description(union.doc.as_deref());
                schema.enum_values = Some(values);
                schema.ms_enum = Some(XmsEnum {
                    name: union.name.clone(),
                    model_as_string: false,
                });
                if nullable {
                    schema.nullable = Some(true);
                }
                schema
            }
            None => {
                self.report_type(
                    id,
                    Code::UnionUnsupported,
                    "Unions cannot be emitted to Swagger 2.0 unless all options are literals of the same type.",
                );
                Schema::default()
            }
        }
    }

    /// Queue the Read schema of every local named declaration.
    pub fn include_unreferenced(&mut self) {
        for id in self.graph.ids() {
            if !self.graph.is_present(id) || self.cycles.is_excluded(id) {
                continue;
            }
            let node = self.graph.node(id);
            if node.library().is_some() {
                continue;
            }
            let named = match node {
                TypeNode::Model(m) => m.name.is_some(),
                TypeNode::Scalar(s) => !s.std,
                TypeNode::Enum(_) => true,
                TypeNode::Union(u) => u.name.is_some(),
                TypeNode::Array(_) | TypeNode::Dictionary(_) => self.cycles.must_be_named(id),
            };
            if named {
                self.table.get_or_add(id, VisibilityContext::Read);
            }
        }
    }

    /// Compute the body of every pending schema, including the ones queued
    /// while computing others.
    pub fn process_pending(&mut self) {
        while let Some(pending) = self.table.next_pending() {
            if self.graph.node(pending.type_id).library().is_some() {
                continue;
            }
            let schema = self.schema_for_type(pending.type_id, pending.context);
            self.table.complete(pending.handle, schema);
        }
    }

    /// Finalize names and hand back the resolved definitions and diagnostics.
    pub fn finish(mut self) -> (Finalized, Diagnostics) {
        self.process_pending();
        let finalized = self.table.finalize(self.graph, self.options, &mut self.diagnostics);
        (finalized, self.diagnostics)
    }
}

fn literal(schema_type: SchemaType, value: Value) -> Schema {
    Schema {
        enum_values: Some(vec![value]),
        ..Schema::new(schema_type)
    }
}

/// Flatten a union of literals and enums into enum values of one JSON type.
fn union_as_enum(graph: &TypeGraph, variants: &[&TypeRef]) -> Option<(SchemaType, Vec<Value>)> {
    let mut values = Vec::new();
    let mut schema_type = None;
    let mut seen = HashSet::new();
    for ty in variants {
        collect_enum_values(graph, ty, &mut values, &mut schema_type, &mut seen)?;
    }
    schema_type.map(|t| (t, values))
}

fn collect_enum_values(
    graph: &TypeGraph,
    ty: &TypeRef,
    values: &mut Vec<Value>,
    schema_type: &mut Option<SchemaType>,
    seen: &mut HashSet<TypeId>,
) -> Option<()> {
    let mut push = |value: Value| -> Option<()> {
        let kind = match value {
            Value::Number(_) => SchemaType::Number,
            Value::String(_) => SchemaType::String,
            _ => return None,
        };
        if let Some(existing) = *schema_type {
            if existing != kind {
                return None;
            }
        }
        *schema_type = Some(kind);
        if !values.contains(&value) {
            values.push(value);
        }
        Some(())
    };

    match ty {
        TypeRef::String(s) => push(Value::String(s.clone())),
        TypeRef::Number(n) => push(number_value(*n)),
        TypeRef::EnumMember { enum_id, member } => match graph.get(*enum_id) {
            Some(TypeNode::Enum(e)) => push(e.member(member)?.json_value()),
            _ => None,
        },
        TypeRef::Type(id) => {
            if !seen.insert(*id) {
                return Some(());
            }
            match graph.get(*id)? {
                TypeNode::Enum(e) => {
                    for member in &e.members {
                        push(member.json_value())?;
                    }
                    Some(())
                }
                TypeNode::Union(u) => {
                    for variant in &u.variants {
                        collect_enum_values(graph, &variant.ty, values, schema_type, seen)?;
                    }
                    Some(())
                }
                _ => None,
            }
        }
        TypeRef::Boolean(_) | TypeRef::Null | TypeRef::Unknown => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Property;
    use crate::visibility::Lifecycle;
    use serde_json::json;

    struct Lowered {
        definitions: BTreeMap<String, Value>,
        diagnostics: Diagnostics,
    }

    /// Lower the Read schema of `root` and return the rendered definitions.
    fn lower(graph: &TypeGraph, roots: &[(TypeRef, VisibilityContext)]) -> (Vec<Value>, Lowered) {
        let options = EmitterOptions::default();
        let mut cx = LowerContext::new(graph, &options);
        let mut uses: Vec<Schema> = roots
            .iter()
            .map(|(ty, context)| cx.schema_or_ref(ty, *context))
            .collect();
        let (finalized, diagnostics) = cx.finish();
        for schema in &mut uses {
            schema.bind(&|h| finalized.resolve(h));
        }
        let definitions = finalized
            .definitions
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap()))
            .collect();
        (
            uses.iter().map(|s| serde_json::to_value(s).unwrap()).collect(),
            Lowered {
                definitions,
                diagnostics,
            },
        )
    }

    mod models {
        use super::*;

        #[test]
        fn pet_cat_dog() {
            let mut graph = TypeGraph::new();
            let int32 = graph.add(Scalar::std("int32"));
            let pet = graph.add(Model::named("Pet").discriminated_by("kind"));
            graph.add(
                Model::named("Cat")
                    .extends(pet)
                    .property(Property::new("kind", TypeRef::string("cat")))
                    .property(Property::new("meow", int32)),
            );
            graph.add(
                Model::named("Dog")
                    .extends(pet)
                    .property(Property::new("kind", TypeRef::string("dog"))),
            );

            let (uses, lowered) = lower(&graph, &[(pet.into(), VisibilityContext::Read)]);
            assert!(lowered.diagnostics.is_empty());
            assert_eq!(uses[0], json!({ "$ref": "#/definitions/Pet" }));
            assert_eq!(
                lowered.definitions["Pet"],
                json!({
                    "type": "object",
                    "properties": { "kind": { "type": "string" } },
                    "required": ["kind"],
                    "discriminator": "kind"
                })
            );
            assert_eq!(
                lowered.definitions["Cat"],
                json!({
                    "type": "object",
                    "properties": { "meow": { "type": "integer", "format": "int32" } },
                    "required": ["meow"],
                    "allOf": [ { "$ref": "#/definitions/Pet" } ],
                    "x-ms-discriminator-value": "cat"
                })
            );
            assert_eq!(lowered.definitions["Dog"]["allOf"], json!([{ "$ref": "#/definitions/Pet" }]));
        }

        #[test]
        fn visibility_variants_get_suffixed_names() {
            let mut graph = TypeGraph::new();
            let s = graph.add(Scalar::std("string"));
            let widget = graph.add(
                Model::named("Widget")
                    .property(Property::new("id", s).visible(&[Lifecycle::Read]))
                    .property(Property::new("name", s)),
            );

            let (uses, lowered) = lower(
                &graph,
                &[
                    (widget.into(), VisibilityContext::Read),
                    (widget.into(), VisibilityContext::Create),
                    (widget.into(), VisibilityContext::Update),
                ],
            );
            assert_eq!(uses[1], json!({ "$ref": "#/definitions/WidgetCreate" }));
            assert_eq!(uses[2], json!({ "$ref": "#/definitions/WidgetUpdate" }));
            assert_eq!(
                lowered.definitions["Widget"]["properties"]["id"],
                json!({ "type": "string", "readOnly": true })
            );
            assert_eq!(lowered.definitions["WidgetCreate"]["required"], json!(["name"]));
            assert!(lowered.definitions["WidgetUpdate"].get("required").is_none());
        }

        #[test]
        fn untransformed_context_shares_read_schema() {
            let mut graph = TypeGraph::new();
            let s = graph.add(Scalar::std("string"));
            let plain = graph.add(Model::named("Plain").property(Property::new("name", s)));

            let (uses, lowered) = lower(&graph, &[(plain.into(), VisibilityContext::Create)]);
            assert_eq!(uses[0], json!({ "$ref": "#/definitions/Plain" }));
            assert_eq!(lowered.definitions.len(), 1);
        }

        #[test]
        fn cyclic_named_model_is_referenced() {
            let mut graph = TypeGraph::new();
            let node = graph.reserve();
            graph.set(
                node,
                Model::named("Node").property(Property::new("next", node).optional()),
            );

            let (_, lowered) = lower(&graph, &[(node.into(), VisibilityContext::Read)]);
            assert_eq!(
                lowered.definitions["Node"]["properties"]["next"],
                json!({ "$ref": "#/definitions/Node" })
            );
        }

        #[test]
        fn anonymous_cycle_lowers_to_empty_schema() {
            let mut graph = TypeGraph::new();
            let a = graph.reserve();
            graph.set(a, Model::anonymous().property(Property::new("again", a).optional()));
            let holder = graph.add(Model::named("Holder").property(Property::new("a", a)));

            let (_, lowered) = lower(&graph, &[(holder.into(), VisibilityContext::Read)]);
            assert_eq!(lowered.definitions["Holder"]["properties"]["a"], json!({}));
            assert_eq!(lowered.diagnostics.with_code(Code::InlineCycle).count(), 1);
        }

        #[test]
        fn property_annotations() {
            let mut graph = TypeGraph::new();
            let s = graph.add(Scalar::std("string"));
            let model = graph.add(
                Model::named("Thing")
                    .property(
                        Property::new("color", s)
                            .doc("The color")
                            .default_value(json!("red"))
                            .visible(&[Lifecycle::Read, Lifecycle::Create]),
                    )
                    .property({
                        let mut p = Property::new("id", s);
                        p.format = Some("uuid".into());
                        p
                    })
                    .property({
                        let mut p = Property::new("weird", s);
                        p.format = Some("no-such-format".into());
                        p
                    }),
            );

            let (_, lowered) = lower(&graph, &[(model.into(), VisibilityContext::Read)]);
            let props = &lowered.definitions["Thing"]["properties"];
            assert_eq!(
                props["color"],
                json!({
                    "type": "string",
                    "description": "The color",
                    "default": "red",
                    "x-ms-mutability": ["read", "create"]
                })
            );
            assert_eq!(props["id"], json!({ "type": "string", "format": "uuid" }));
            assert_eq!(props["weird"], json!({ "type": "string" }));
            assert_eq!(lowered.diagnostics.with_code(Code::InvalidFormat).count(), 1);
        }
    }

    mod scalars {
        use super::*;

        #[test]
        fn std_table_and_fallbacks() {
            let mut graph = TypeGraph::new();
            let int64 = graph.add(Scalar::std("int64"));
            let numeric = graph.add(Scalar::std("numeric"));
            let float = graph.add(Scalar::std("float"));
            let url = graph.add(Scalar::std("url"));

            let (uses, lowered) = lower(
                &graph,
                &[
                    (int64.into(), VisibilityContext::Read),
                    (numeric.into(), VisibilityContext::Read),
                    (numeric.into(), VisibilityContext::Read),
                    (float.into(), VisibilityContext::Read),
                    (url.into(), VisibilityContext::Read),
                ],
            );
            assert_eq!(uses[0], json!({ "type": "integer", "format": "int64" }));
            assert_eq!(uses[1], json!({ "type": "integer", "format": "int64" }));
            assert_eq!(uses[3], json!({ "type": "number" }));
            assert_eq!(uses[4], json!({ "type": "string", "format": "uri" }));
            // Reported once per scalar, however often it is used.
            assert_eq!(lowered.diagnostics.with_code(Code::NonspecificScalar).count(), 2);
        }

        #[test]
        fn custom_scalar_is_a_definition() {
            let mut graph = TypeGraph::new();
            let string = graph.add(Scalar::std("string"));
            let mut id_scalar = Scalar::custom("ResourceId", string).format("arm-id");
            id_scalar.doc = Some("An ARM id".into());
            let custom = graph.add(id_scalar);

            let (uses, lowered) = lower(&graph, &[(custom.into(), VisibilityContext::Read)]);
            assert_eq!(uses[0], json!({ "$ref": "#/definitions/ResourceId" }));
            assert_eq!(
                lowered.definitions["ResourceId"],
                json!({ "type": "string", "format": "arm-id", "description": "An ARM id" })
            );
        }
    }

    mod unions {
        use super::*;

        #[test]
        fn nullable_model_wrapped_in_all_of() {
            let mut graph = TypeGraph::new();
            let pet = graph.add(Model::named("Pet"));
            let union = graph.add(Union::of(vec![pet.into(), TypeRef::Null]));

            let (uses, _) = lower(&graph, &[(union.into(), VisibilityContext::Read)]);
            assert_eq!(
                uses[0],
                json!({
                    "type": "object",
                    "allOf": [ { "$ref": "#/definitions/Pet" } ],
                    "x-nullable": true
                })
            );
        }

        #[test]
        fn literal_union_becomes_enum() {
            let mut graph = TypeGraph::new();
            let union = graph.add(Union::named(
                "Size",
                vec![TypeRef::string("small"), TypeRef::string("large")],
            ));

            let (_, lowered) = lower(&graph, &[(union.into(), VisibilityContext::Read)]);
            assert_eq!(
                lowered.definitions["Size"],
                json!({
                    "type": "string",
                    "enum": ["small", "large"],
                    "x-ms-enum": { "name": "Size", "modelAsString": false }
                })
            );
        }

        #[test]
        fn null_only_and_mixed_unions_are_reported() {
            let mut graph = TypeGraph::new();
            let s = graph.add(Scalar::std("string"));
            let only_null = graph.add(Union::of(vec![TypeRef::Null]));
            let mixed = graph.add(Union::of(vec![s.into(), TypeRef::Number(1.0)]));

            let (uses, lowered) = lower(
                &graph,
                &[
                    (only_null.into(), VisibilityContext::Read),
                    (mixed.into(), VisibilityContext::Read),
                ],
            );
            assert_eq!(uses, vec![json!({}), json!({})]);
            assert_eq!(lowered.diagnostics.with_code(Code::UnionNull).count(), 1);
            assert_eq!(lowered.diagnostics.with_code(Code::UnionUnsupported).count(), 1);
            assert!(lowered.diagnostics.has_errors());
        }
    }

    mod enums {
        use super::*;

        #[test]
        fn enum_definition() {
            let mut graph = TypeGraph::new();
            let color = graph.add(Enum::new("Color", &["red", "blue"]));

            let (uses, lowered) = lower(
                &graph,
                &[
                    (color.into(), VisibilityContext::Read),
                    (TypeRef::member(color, "blue"), VisibilityContext::Read),
                ],
            );
            assert_eq!(uses[1], json!({ "type": "string", "enum": ["blue"] }));
            assert_eq!(
                lowered.definitions["Color"],
                json!({
                    "type": "string",
                    "enum": ["red", "blue"],
                    "x-ms-enum": { "name": "Color", "modelAsString": false }
                })
            );
        }
    }

    mod collections {
        use super::*;

        #[test]
        fn arrays_and_dictionaries_inline() {
            let mut graph = TypeGraph::new();
            let s = graph.add(Scalar::std("string"));
            let list = graph.add(ArrayType::named("Names", s));
            let dict = graph.add(DictionaryType::of(s));

            let (uses, lowered) = lower(
                &graph,
                &[
                    (list.into(), VisibilityContext::Read),
                    (dict.into(), VisibilityContext::Read),
                ],
            );
            assert_eq!(uses[0], json!({ "type": "array", "items": { "type": "string" } }));
            assert_eq!(
                uses[1],
                json!({ "type": "object", "additionalProperties": { "type": "string" } })
            );
            assert!(lowered.definitions.is_empty());
        }

        #[test]
        fn unreferenced_types_are_included_on_request() {
            let mut graph = TypeGraph::new();
            graph.add(Model::named("Lonely"));
            graph.add(Model::named("Shared").in_library("common"));

            let options = EmitterOptions::default();
            let mut cx = LowerContext::new(&graph, &options);
            cx.include_unreferenced();
            let (finalized, _) = cx.finish();
            let names: Vec<_> = finalized.definitions.keys().cloned().collect();
            assert_eq!(names, vec!["Lonely"]);
        }
    }
}
