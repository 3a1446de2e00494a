//! Declaration graph - the typed, possibly cyclic input of the lowering passes.
//!
//! Types live in an arena ([`TypeGraph::types`]) and point at each other
//! through [`TypeId`] indices, never through ownership. The graph is plain
//! data: it deserializes from the JSON a front-end produces and can also be
//! assembled in code with the builder methods below.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::{Code, Diagnostic};
use crate::service::Service;
use crate::visibility::Lifecycle;

/// Stable identity of a declaration: its index in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub usize);

impl std::fmt::Display for TypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a property, variant, element or body points at.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeRef {
    /// A declaration in the arena.
    Type(TypeId),
    String(String),
    Number(f64),
    Boolean(bool),
    EnumMember {
        #[serde(rename = "enum")]
        enum_id: TypeId,
        member: String,
    },
    Null,
    #[default]
    Unknown,
}

impl TypeRef {
    pub fn string(value: impl Into<String>) -> Self {
        TypeRef::String(value.into())
    }

    pub fn member(enum_id: TypeId, member: impl Into<String>) -> Self {
        TypeRef::EnumMember {
            enum_id,
            member: member.into(),
        }
    }

    pub fn type_id(&self) -> Option<TypeId> {
        match self {
            TypeRef::Type(id) => Some(*id),
            _ => None,
        }
    }
}

impl From<TypeId> for TypeRef {
    fn from(id: TypeId) -> Self {
        TypeRef::Type(id)
    }
}

/// Version window a declaration or member exists in.
///
/// Both bounds name entries of the owning service's `versions` list;
/// `removed` is exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Availability {
    pub added: Option<String>,
    pub removed: Option<String>,
}

/// A property of a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Property {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
    /// Lifecycle tags; `None` means visible in every context.
    #[serde(default)]
    pub visibility: Option<BTreeSet<Lifecycle>>,
    /// Stays required even in contexts that relax requiredness.
    #[serde(default)]
    pub pinned_required: bool,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub availability: Availability,
}

impl Property {
    pub fn new(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
            optional: false,
            visibility: None,
            pinned_required: false,
            doc: None,
            default: None,
            format: None,
            availability: Availability::default(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn visible(mut self, lifecycles: &[Lifecycle]) -> Self {
        self.visibility = Some(lifecycles.iter().copied().collect());
        self
    }

    pub fn pinned(mut self) -> Self {
        self.pinned_required = true;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn added(mut self, version: impl Into<String>) -> Self {
        self.availability.added = Some(version.into());
        self
    }

    pub fn removed(mut self, version: impl Into<String>) -> Self {
        self.availability.removed = Some(version.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Model {
    pub name: Option<String>,
    pub doc: Option<String>,
    /// Owning artifact; `None` means local to the document being emitted.
    pub library: Option<String>,
    pub availability: Availability,
    pub properties: Vec<Property>,
    pub base: Option<TypeId>,
    /// Name of the discriminator property, on discriminated roots.
    pub discriminator: Option<String>,
}

impl Model {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    pub fn extends(mut self, base: TypeId) -> Self {
        self.base = Some(base);
        self
    }

    pub fn discriminated_by(mut self, property: impl Into<String>) -> Self {
        self.discriminator = Some(property.into());
        self
    }

    pub fn in_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn added(mut self, version: impl Into<String>) -> Self {
        self.availability.added = Some(version.into());
        self
    }

    pub fn removed(mut self, version: impl Into<String>) -> Self {
        self.availability.removed = Some(version.into());
        self
    }

    pub fn own_property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Scalar {
    pub name: String,
    pub doc: Option<String>,
    pub library: Option<String>,
    pub availability: Availability,
    /// Part of the standard scalar library (`int32`, `string`, ...).
    pub std: bool,
    pub base: Option<TypeId>,
    pub format: Option<String>,
}

impl Scalar {
    pub fn std(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            std: true,
            ..Self::default()
        }
    }

    pub fn custom(name: impl Into<String>, base: TypeId) -> Self {
        Self {
            name: name.into(),
            base: Some(base),
            ..Self::default()
        }
    }

    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Value of an enum member; the member name is used when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnumValue {
    String(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    pub name: String,
    #[serde(default)]
    pub value: Option<EnumValue>,
    #[serde(default)]
    pub availability: Availability,
}

impl EnumMember {
    /// Value as emitted: the explicit value, or the member name.
    pub fn json_value(&self) -> Value {
        match &self.value {
            Some(EnumValue::String(s)) => Value::String(s.clone()),
            Some(EnumValue::Number(n)) => crate::schema::number_value(*n),
            None => Value::String(self.name.clone()),
        }
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            Some(EnumValue::String(s)) => Some(s),
            Some(EnumValue::Number(_)) => None,
            None => Some(&self.name),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Enum {
    pub name: String,
    pub doc: Option<String>,
    pub library: Option<String>,
    pub availability: Availability,
    pub members: Vec<EnumMember>,
}

impl Enum {
    pub fn new(name: impl Into<String>, members: &[&str]) -> Self {
        Self {
            name: name.into(),
            members: members
                .iter()
                .map(|m| EnumMember {
                    name: m.to_string(),
                    value: None,
                    availability: Availability::default(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn member(&self, name: &str) -> Option<&EnumMember> {
        self.members.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnionVariant {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub availability: Availability,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Union {
    pub name: Option<String>,
    pub doc: Option<String>,
    pub library: Option<String>,
    pub availability: Availability,
    pub variants: Vec<UnionVariant>,
}

impl Union {
    pub fn of(variants: Vec<TypeRef>) -> Self {
        Self {
            variants: variants
                .into_iter()
                .map(|ty| UnionVariant {
                    name: None,
                    ty,
                    availability: Availability::default(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>, variants: Vec<TypeRef>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of(variants)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ArrayType {
    pub name: Option<String>,
    pub doc: Option<String>,
    pub library: Option<String>,
    pub availability: Availability,
    pub element: TypeRef,
}

impl ArrayType {
    pub fn of(element: impl Into<TypeRef>) -> Self {
        Self {
            element: element.into(),
            ..Self::default()
        }
    }

    pub fn named(name: impl Into<String>, element: impl Into<TypeRef>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::of(element)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DictionaryType {
    pub name: Option<String>,
    pub doc: Option<String>,
    pub library: Option<String>,
    pub availability: Availability,
    pub value: TypeRef,
}

impl DictionaryType {
    pub fn of(value: impl Into<TypeRef>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// A declaration in the arena.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TypeNode {
    Model(Model),
    Scalar(Scalar),
    Enum(Enum),
    Union(Union),
    Array(ArrayType),
    Dictionary(DictionaryType),
}

impl TypeNode {
    /// Declared name, if the declaration has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            TypeNode::Model(m) => m.name.as_deref(),
            TypeNode::Scalar(s) => Some(&s.name),
            TypeNode::Enum(e) => Some(&e.name),
            TypeNode::Union(u) => u.name.as_deref(),
            TypeNode::Array(a) => a.name.as_deref(),
            TypeNode::Dictionary(d) => d.name.as_deref(),
        }
    }

    pub fn library(&self) -> Option<&str> {
        match self {
            TypeNode::Model(m) => m.library.as_deref(),
            TypeNode::Scalar(s) => s.library.as_deref(),
            TypeNode::Enum(e) => e.library.as_deref(),
            TypeNode::Union(u) => u.library.as_deref(),
            TypeNode::Array(a) => a.library.as_deref(),
            TypeNode::Dictionary(d) => d.library.as_deref(),
        }
    }

    pub fn doc(&self) -> Option<&str> {
        match self {
            TypeNode::Model(m) => m.doc.as_deref(),
            TypeNode::Scalar(s) => s.doc.as_deref(),
            TypeNode::Enum(e) => e.doc.as_deref(),
            TypeNode::Union(u) => u.doc.as_deref(),
            TypeNode::Array(a) => a.doc.as_deref(),
            TypeNode::Dictionary(d) => d.doc.as_deref(),
        }
    }

    pub fn availability(&self) -> &Availability {
        match self {
            TypeNode::Model(m) => &m.availability,
            TypeNode::Scalar(s) => &s.availability,
            TypeNode::Enum(e) => &e.availability,
            TypeNode::Union(u) => &u.availability,
            TypeNode::Array(a) => &a.availability,
            TypeNode::Dictionary(d) => &d.availability,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TypeNode::Model(_) => "model",
            TypeNode::Scalar(_) => "scalar",
            TypeNode::Enum(_) => "enum",
            TypeNode::Union(_) => "union",
            TypeNode::Array(_) => "array",
            TypeNode::Dictionary(_) => "dictionary",
        }
    }

    /// Edges followed by structural cycle detection: properties, elements,
    /// dictionary values and union variants. Inheritance is not structural.
    pub fn structural_edges(&self) -> Vec<TypeId> {
        match self {
            TypeNode::Model(m) => m.properties.iter().filter_map(|p| p.ty.type_id()).collect(),
            TypeNode::Array(a) => a.element.type_id().into_iter().collect(),
            TypeNode::Dictionary(d) => d.value.type_id().into_iter().collect(),
            TypeNode::Union(u) => u.variants.iter().filter_map(|v| v.ty.type_id()).collect(),
            TypeNode::Scalar(_) | TypeNode::Enum(_) => Vec::new(),
        }
    }
}

impl From<Model> for TypeNode {
    fn from(m: Model) -> Self {
        TypeNode::Model(m)
    }
}

impl From<Scalar> for TypeNode {
    fn from(s: Scalar) -> Self {
        TypeNode::Scalar(s)
    }
}

impl From<Enum> for TypeNode {
    fn from(e: Enum) -> Self {
        TypeNode::Enum(e)
    }
}

impl From<Union> for TypeNode {
    fn from(u: Union) -> Self {
        TypeNode::Union(u)
    }
}

impl From<ArrayType> for TypeNode {
    fn from(a: ArrayType) -> Self {
        TypeNode::Array(a)
    }
}

impl From<DictionaryType> for TypeNode {
    fn from(d: DictionaryType) -> Self {
        TypeNode::Dictionary(d)
    }
}

/// The whole compile input: type arena, services and upstream diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeGraph {
    pub types: Vec<TypeNode>,
    pub services: Vec<Service>,
    /// Diagnostics reported by the front-end for this compile.
    pub diagnostics: Vec<Diagnostic>,
    /// Declarations that do not exist in the version this graph was projected to.
    #[serde(skip)]
    pub withdrawn: BTreeSet<TypeId>,
}

impl TypeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, node: impl Into<TypeNode>) -> TypeId {
        self.types.push(node.into());
        TypeId(self.types.len() - 1)
    }

    /// Allocate an id before its node is known, for self-referencing types.
    pub fn reserve(&mut self) -> TypeId {
        self.add(Model::anonymous())
    }

    pub fn set(&mut self, id: TypeId, node: impl Into<TypeNode>) {
        if let Some(slot) = self.types.get_mut(id.0) {
            *slot = node.into();
        }
    }

    pub fn service(mut self, service: Service) -> Self {
        self.services.push(service);
        self
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.types.get(id.0)
    }

    /// Node for an id known to be in the arena.
    ///
    /// Lowering only runs on graphs that passed [`TypeGraph::check_references`].
    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.types[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.types.len()).map(TypeId)
    }

    pub fn name_of(&self, id: TypeId) -> Option<&str> {
        self.get(id).and_then(TypeNode::name)
    }

    pub fn model(&self, id: TypeId) -> Option<&Model> {
        match self.get(id) {
            Some(TypeNode::Model(m)) => Some(m),
            _ => None,
        }
    }

    pub fn is_present(&self, id: TypeId) -> bool {
        !self.withdrawn.contains(&id)
    }

    /// Human readable label for diagnostics.
    pub fn describe(&self, id: TypeId) -> String {
        match self.get(id) {
            Some(node) => match node.name() {
                Some(name) => name.to_string(),
                None => format!("(anonymous {})", node.kind()),
            },
            None => format!("(unknown type {})", id),
        }
    }

    /// Direct subtypes of every model with at least one.
    pub fn derived_index(&self) -> BTreeMap<TypeId, Vec<TypeId>> {
        let mut derived: BTreeMap<TypeId, Vec<TypeId>> = BTreeMap::new();
        for id in self.ids() {
            if !self.is_present(id) {
                continue;
            }
            if let Some(base) = self.model(id).and_then(|m| m.base) {
                derived.entry(base).or_default().push(id);
            }
        }
        derived
    }

    /// Base type of a model or scalar.
    fn base_of(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id)? {
            TypeNode::Model(m) => m.base,
            TypeNode::Scalar(s) => s.base,
            _ => None,
        }
    }

    /// Whether following bases from `id` leads back to `id`.
    fn in_inheritance_loop(&self, id: TypeId) -> bool {
        let mut seen = BTreeSet::new();
        let mut next = self.base_of(id);
        while let Some(base) = next {
            if base == id {
                return true;
            }
            if !seen.insert(base) {
                return false;
            }
            next = self.base_of(base);
        }
        false
    }

    /// Report every id that does not point into the arena, and every model
    /// or scalar that inherits from itself.
    pub fn check_references(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let mut check = |owner: String, id: TypeId| {
            if self.get(id).is_none() {
                diagnostics.push(Diagnostic::new(
                    Code::InvalidSchema,
                    owner,
                    format!("reference to unknown type {}", id),
                ));
            }
        };
        let check_ref = |owner: String, ty: &TypeRef, check: &mut dyn FnMut(String, TypeId)| {
            match ty {
                TypeRef::Type(id) | TypeRef::EnumMember { enum_id: id, .. } => check(owner, *id),
                _ => {}
            }
        };

        for id in self.ids() {
            let owner = self.describe(id);
            match self.node(id) {
                TypeNode::Model(m) => {
                    if let Some(base) = m.base {
                        check(owner.clone(), base);
                    }
                    for p in &m.properties {
                        check_ref(format!("{}.{}", owner, p.name), &p.ty, &mut check);
                    }
                }
                TypeNode::Scalar(s) => {
                    if let Some(base) = s.base {
                        check(owner, base);
                    }
                }
                TypeNode::Union(u) => {
                    for v in &u.variants {
                        check_ref(owner.clone(), &v.ty, &mut check);
                    }
                }
                TypeNode::Array(a) => check_ref(owner, &a.element, &mut check),
                TypeNode::Dictionary(d) => check_ref(owner, &d.value, &mut check),
                TypeNode::Enum(_) => {}
            }
        }

        for service in &self.services {
            for op in &service.operations {
                for p in &op.parameters {
                    check_ref(format!("{}.{}", op.name, p.name), &p.ty, &mut check);
                }
                for r in &op.responses {
                    if let Some(body) = &r.body {
                        check_ref(op.name.clone(), body, &mut check);
                    }
                }
            }
        }

        for id in self.ids() {
            if self.in_inheritance_loop(id) {
                diagnostics.push(Diagnostic::new(
                    Code::InvalidSchema,
                    self.describe(id),
                    "type inherits from itself",
                ));
            }
        }

        diagnostics
    }
}
