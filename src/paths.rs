//! Operations lowered into Swagger 2 path items.
//!
//! Request parameters are lowered under the context derived from the verb
//! (see [`VisibilityContext::for_request`]); response bodies always use the
//! canonical Read context. Schemas built here may hold pending references, so
//! the whole section is bound once the schema table is finalized.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::Code;
use crate::examples::declared_examples;
use crate::graph::TypeRef;
use crate::lower::LowerContext;
use crate::references::{encode_component, Finalized, SchemaRef};
use crate::schema::Schema;
use crate::service::{Operation, Parameter, ParameterLocation, Service, StatusCode, Verb};
use crate::visibility::VisibilityContext;

/// A Swagger 2 parameter object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterObject {
    pub name: String,
    #[serde(rename = "in")]
    pub location: &'static str,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Body parameters only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    /// Simple parameters carry their schema fields inline.
    #[serde(flatten)]
    pub simple: Schema,
}

impl ParameterObject {
    fn bind(&mut self, finalized: &Finalized) {
        let resolve = |h: SchemaRef| finalized.resolve(h);
        if let Some(schema) = &mut self.schema {
            schema.bind(&resolve);
        }
        self.simple.bind(&resolve);
    }
}

/// An operation parameter: inline, or a reference into the shared section.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParameterEntry {
    Shared {
        #[serde(rename = "$ref")]
        reference: String,
    },
    Inline(ParameterObject),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseObject {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// `x-ms-examples` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleRef {
    #[serde(rename = "$ref")]
    pub reference: String,
}

/// A Swagger 2 operation object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationObject {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    pub operation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: Vec<ParameterEntry>,
    pub responses: BTreeMap<String, ResponseObject>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(rename = "x-ms-examples", skip_serializing_if = "BTreeMap::is_empty")]
    pub examples: BTreeMap<String, ExampleRef>,
}

/// One lowered operation and where it lives in the document.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationEntry {
    /// Key under `paths` or `x-ms-paths`.
    pub path: String,
    /// Overloads of an already used path and verb go to `x-ms-paths`.
    pub overload: bool,
    pub verb: Verb,
    pub object: OperationObject,
}

/// Every operation of a service, plus the shared parameters and tags they use.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathsSection {
    pub operations: Vec<OperationEntry>,
    pub parameters: BTreeMap<String, ParameterObject>,
    /// Tags in first-use order.
    pub tags: Vec<String>,
}

impl PathsSection {
    pub fn operation_mut(&mut self, operation_id: &str) -> Option<&mut OperationObject> {
        self.operations
            .iter_mut()
            .map(|e| &mut e.object)
            .find(|o| o.operation_id == operation_id)
    }

    /// Replace every pending reference with its final path.
    pub fn bind(&mut self, finalized: &Finalized) {
        let resolve = |h: SchemaRef| finalized.resolve(h);
        for entry in &mut self.operations {
            for parameter in &mut entry.object.parameters {
                if let ParameterEntry::Inline(p) = parameter {
                    p.bind(finalized);
                }
            }
            for response in entry.object.responses.values_mut() {
                if let Some(schema) = &mut response.schema {
                    schema.bind(&resolve);
                }
            }
        }
        for parameter in self.parameters.values_mut() {
            parameter.bind(finalized);
        }
    }
}

/// Lower every operation of `service`.
pub fn lower_operations(cx: &mut LowerContext<'_>, service: &Service) -> PathsSection {
    let mut section = PathsSection::default();

    for operation in &service.operations {
        let operation_id = resolve_operation_id(operation);
        let path = strip_query(&operation.path).to_string();
        let taken = section
            .operations
            .iter()
            .any(|e| !e.overload && e.path == path && e.verb == operation.verb);
        let (path, overload) = if !taken {
            (path, false)
        } else if operation.path.contains('?') {
            let clash = section
                .operations
                .iter()
                .any(|e| e.overload && e.path == operation.path);
            if clash {
                (format!("{}&_overload={}", operation.path, operation.name), true)
            } else {
                (operation.path.clone(), true)
            }
        } else {
            (format!("{}?_overload={}", operation.path, operation.name), true)
        };

        for tag in &operation.tags {
            if !section.tags.contains(tag) {
                section.tags.push(tag.clone());
            }
        }

        let parameters = lower_parameters(cx, &mut section, operation, &operation_id);
        let responses = lower_responses(cx, operation, &operation_id);
        let examples = declared_examples(operation, &operation_id, &mut cx.diagnostics);

        tracing::trace!(%operation_id, %path, verb = operation.verb.as_str(), "operation lowered");
        section.operations.push(OperationEntry {
            path,
            overload,
            verb: operation.verb,
            object: OperationObject {
                tags: operation.tags.clone(),
                operation_id,
                summary: operation.summary.clone(),
                description: operation.doc.clone(),
                parameters,
                responses,
                deprecated: operation.deprecated,
                examples,
            },
        });
    }

    section
}

fn lower_parameters(
    cx: &mut LowerContext<'_>,
    section: &mut PathsSection,
    operation: &Operation,
    operation_id: &str,
) -> Vec<ParameterEntry> {
    let context = VisibilityContext::for_request(operation.verb);
    let mut entries = Vec::new();
    let mut has_body = false;

    for parameter in &operation.parameters {
        if parameter.location == ParameterLocation::Body {
            if has_body {
                cx.diagnostics.report(
                    Code::DuplicateBody,
                    operation_id,
                    "Operation has multiple @body parameters declared",
                );
                continue;
            }
            has_body = true;
        }

        match &parameter.shared_name {
            Some(shared) => {
                if !section.parameters.contains_key(shared) {
                    let object = parameter_object(cx, parameter, context);
                    section.parameters.insert(shared.clone(), object);
                }
                entries.push(ParameterEntry::Shared {
                    reference: format!("#/parameters/{}", encode_component(shared)),
                });
            }
            None => entries.push(ParameterEntry::Inline(parameter_object(cx, parameter, context))),
        }
    }

    entries
}

fn parameter_object(
    cx: &mut LowerContext<'_>,
    parameter: &Parameter,
    context: VisibilityContext,
) -> ParameterObject {
    let required = parameter.location == ParameterLocation::Path || !parameter.optional;
    let mut object = ParameterObject {
        name: parameter.name.clone(),
        location: parameter.location.as_str(),
        required,
        description: parameter.doc.clone(),
        schema: None,
        simple: Schema::default(),
    };

    if parameter.location == ParameterLocation::Body {
        object.schema = Some(cx.schema_or_ref(&parameter.ty, context));
        return object;
    }

    // Simple parameters cannot point at definitions; expand the type in place.
    let mut simple = match &parameter.ty {
        TypeRef::Type(id) if cx.graph.get(*id).is_some() => cx.schema_for_type(*id, context),
        other => cx.schema_or_ref(other, context),
    };
    if simple.properties.is_some() || simple.additional_properties.is_some() {
        simple = Schema::string();
    }
    simple.description = None;
    object.simple = simple;
    object
}

fn lower_responses(
    cx: &mut LowerContext<'_>,
    operation: &Operation,
    operation_id: &str,
) -> BTreeMap<String, ResponseObject> {
    let mut responses = BTreeMap::new();

    for response in &operation.responses {
        let schema = response
            .body
            .as_ref()
            .map(|body| cx.schema_or_ref(body, VisibilityContext::Read));
        for code in status_codes(cx, &response.status, operation_id) {
            let description = response
                .description
                .clone()
                .unwrap_or_else(|| status_description(&code).to_string());
            responses.entry(code).or_insert_with(|| ResponseObject {
                description,
                schema: schema.clone(),
            });
        }
    }

    responses
}

/// Response keys for a status declaration.
///
/// Ranges map onto whole `NXX` groups; anything that does not line up with
/// a group is reported and approximated.
fn status_codes(cx: &mut LowerContext<'_>, status: &StatusCode, operation_id: &str) -> Vec<String> {
    let (range_start, range_end) = match *status {
        StatusCode::Default => return vec!["default".to_string()],
        StatusCode::Code(code) => return vec![code.to_string()],
        StatusCode::Range { start, end } => (start, end),
    };

    let mut codes = Vec::new();
    let mut invalid = false;
    let (mut start, mut end) = (range_start, range_end);

    if range_start < 100 {
        invalid = true;
        start = 100;
        codes.push("default".to_string());
    } else if range_end > 599 {
        invalid = true;
        codes.push("default".to_string());
        end = 599;
    }

    for group in 1..=5u16 {
        if start > end {
            break;
        }
        let group_start = group * 100;
        let group_end = group_start + 99;
        if (group_start..=group_end).contains(&start) {
            codes.push(format!("{}XX", group));
            if start != group_start || end < group_end {
                invalid = true;
            }
            start = group_start + 100;
        }
    }

    if invalid {
        cx.diagnostics.report(
            Code::UnsupportedStatusCodeRange,
            operation_id,
            format!(
                "Status code range '{} to '{}' is not supported. OpenAPI 2.0 can only represent range 1XX, 2XX, 3XX, 4XX and 5XX.",
                range_start, range_end
            ),
        );
    }
    codes
}

fn status_description(code: &str) -> &'static str {
    match code {
        "default" => "An unexpected error response.",
        "200" => "The request has succeeded.",
        "201" => "The request has succeeded and a new resource has been created as a result.",
        "202" => "The request has been accepted for processing, but processing has not yet completed.",
        "204" => "There is no content to send for this request, but the headers may be useful.",
        "301" => "The URL of the requested resource has been changed permanently. The new URL is given in the response.",
        "304" => "The client has made a conditional request and the resource has not been modified.",
        "400" => "The server could not understand the request due to invalid syntax.",
        "401" => "Access is unauthorized.",
        "403" => "Access is forbidden.",
        "404" => "The server cannot find the requested resource.",
        "409" => "The request conflicts with the current state of the server.",
        "412" => "Precondition failed.",
        "503" => "Service unavailable.",
        _ => match code.as_bytes().first() {
            Some(b'1') => "Informational",
            Some(b'2') => "Successful",
            Some(b'3') => "Redirection",
            Some(b'4') => "Client error",
            Some(b'5') => "Server error",
            _ => "Unknown",
        },
    }
}

/// Explicit id, else `Group_Name`, else the PascalCase operation name.
pub fn resolve_operation_id(operation: &Operation) -> String {
    if let Some(id) = &operation.operation_id {
        return id.clone();
    }
    match &operation.group {
        Some(group) => format!("{}_{}", group, operation.name)
            .split('_')
            .map(pascal_case)
            .collect::<Vec<_>>()
            .join("_"),
        None => pascal_case(&operation.name),
    }
}

fn pascal_case(segment: &str) -> String {
    let mut chars = segment.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn strip_query(path: &str) -> &str {
    path.split_once('?').map_or(path, |(p, _)| p)
}
