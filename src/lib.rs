//! Swagger Lowering
//!
//! Lowers a typed service declaration graph into Swagger 2.0 documents, one
//! per service and API version.
//!
//! The graph is built with the builders below (or loaded from JSON with
//! [`load_graph`]); [`emit`] lowers it and writes documents and example files
//! through an [`EmitHost`]. Problems in the graph are reported as
//! [`Diagnostic`]s; if any of them is an error nothing is written.
//!
//! # Example
//!
//! ```
//! use swagger_lower::{
//!     emit, EmitterOptions, MemoryHost, Model, Operation, Property, Response, Scalar, Service,
//!     TypeGraph, Verb,
//! };
//!
//! let mut graph = TypeGraph::new();
//! let string = graph.add(Scalar::std("string"));
//! let pet = graph.add(Model::named("Pet").property(Property::new("name", string)));
//! let graph = graph.service(
//!     Service::new("PetStore")
//!         .operation(Operation::new("listPets", Verb::Get, "/pets").response(Response::ok(pet))),
//! );
//!
//! let mut host = MemoryHost::new();
//! let report = emit(&graph, &EmitterOptions::new("out"), &mut host).unwrap();
//! assert!(!report.has_errors());
//!
//! let doc: serde_json::Value = serde_json::from_str(host.get("out/openapi.json").unwrap()).unwrap();
//! assert_eq!(doc["paths"]["/pets"]["get"]["operationId"], "ListPets");
//! assert_eq!(doc["definitions"]["Pet"]["properties"]["name"]["type"], "string");
//! ```
//!
//! # Visibility Contexts
//!
//! | Context | Used for | Definition name |
//! |---------|----------|-----------------|
//! | `Read` | responses | `Widget` |
//! | `Create` | `POST` bodies | `WidgetCreate` |
//! | `Update` | `PATCH` bodies | `WidgetUpdate` |
//! | `CreateOrUpdate` | `PUT` bodies | `WidgetCreateOrUpdate` |
//! | `Delete` | `DELETE` bodies | `WidgetDelete` |
//! | `Query` | `GET`/`HEAD` inputs | `WidgetQuery` |
//!
//! A suffixed definition is only produced when projecting the model for that
//! context actually changes it; otherwise the `Read` definition is shared.
//!
//! # Output Paths
//!
//! The default output pattern is
//! ```text
//! {azure-resource-provider-folder}/{service-name}/{version-status}/{version}/openapi.json
//! ```
//! Placeholders without a value are dropped together with their segment.

mod cycles;
mod diagnostics;
mod discriminator;
mod document;
mod emitter;
mod error;
mod examples;
mod graph;
mod host;
mod loader;
mod lower;
mod paths;
mod references;
mod schema;
mod security;
mod service;
mod types;
mod versioning;
mod visibility;

pub use diagnostics::{Code, Diagnostic, Diagnostics, Severity};
pub use document::{Document, Generator, Info, PathItem, Tag};
pub use emitter::{compile, emit, Compilation, EmitReport, SnapshotOutput};
pub use error::{EmitError, HostError, LoadError};
pub use examples::BoundExample;
pub use graph::{
    ArrayType, Availability, DictionaryType, Enum, EnumMember, EnumValue, Model, Property, Scalar,
    TypeGraph, TypeId, TypeNode, TypeRef, Union, UnionVariant,
};
pub use host::{interpolate_path, EmitHost, FsHost, MemoryHost, TemplateVars};
pub use loader::{load_graph, load_graph_str, load_options};
pub use paths::{ExampleRef, OperationObject, ParameterEntry, ParameterObject, ResponseObject};
pub use references::SchemaRef;
pub use schema::{Properties, Reference, Schema, SchemaType, XmsEnum};
pub use security::{SecurityRequirement, SecurityScheme};
pub use service::{
    ApiKeyLocation, AuthOption, AuthScheme, ExampleDeclaration, OAuth2Flow, OAuth2FlowKind,
    Operation, Parameter, ParameterLocation, Response, Service, StatusCode, Verb,
};
pub use types::{EmitterOptions, NewLine, DEFAULT_OUTPUT_FILE, SWAGGER_VERSION};
pub use visibility::{Lifecycle, RequirednessPolicy, VisibilityContext};
