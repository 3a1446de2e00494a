//! Example files bound to operations.
//!
//! Two sources feed `x-ms-examples`: examples declared on an operation, which
//! are only referenced, and JSON files found in the examples directory, which
//! are matched to operations by `operationId`, conformed against the lowered
//! schemas and copied next to the document.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde_json::{Map, Value};

use crate::diagnostics::{Code, Diagnostics};
use crate::host::EmitHost;
use crate::paths::{ExampleRef, OperationObject, ParameterEntry, PathsSection};
use crate::schema::{Reference, Schema, SchemaType};
use crate::service::Operation;

/// An example file read from the examples directory.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedExample {
    /// Path relative to the examples directory, `/` separated.
    pub relative_path: String,
    pub operation_id: String,
    pub title: String,
    pub content: Value,
}

/// A loaded example attached to an operation, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundExample {
    pub relative_path: String,
    pub content: Value,
}

/// `x-ms-examples` entries for the examples declared on an operation.
///
/// A declaration reusing the title or the file of an earlier one is reported
/// and skipped.
pub fn declared_examples(
    operation: &Operation,
    operation_id: &str,
    diagnostics: &mut Diagnostics,
) -> BTreeMap<String, ExampleRef> {
    let mut examples = BTreeMap::new();
    let mut files = BTreeSet::new();

    for example in &operation.examples {
        if examples.contains_key(&example.title) || files.contains(&example.path) {
            diagnostics.report(
                Code::DuplicateExample,
                operation_id,
                format!(
                    "Duplicate example declaration on operation (title '{}', file '{}')",
                    example.title, example.path
                ),
            );
            continue;
        }
        files.insert(example.path.clone());
        examples.insert(
            example.title.clone(),
            ExampleRef {
                reference: example.path.clone(),
            },
        );
    }
    examples
}

/// Read every `.json` file below `dir`.
///
/// A missing directory is only worth a warning when it was configured
/// explicitly. Unreadable files and files without `operationId` or `title`
/// are reported and skipped.
pub fn load_examples(
    host: &dyn EmitHost,
    dir: &Path,
    explicit: bool,
    diagnostics: &mut Diagnostics,
) -> Vec<LoadedExample> {
    if !host.is_dir(dir) {
        if explicit {
            diagnostics.report(
                Code::ExampleLoading,
                dir.display().to_string(),
                format!("Examples directory '{}' does not exist.", dir.display()),
            );
        }
        return Vec::new();
    }

    let files = match host.read_dir(dir) {
        Ok(files) => files,
        Err(e) => {
            diagnostics.report(Code::ExampleLoading, dir.display().to_string(), e.to_string());
            return Vec::new();
        }
    };

    let mut loaded = Vec::new();
    for relative_path in files.into_iter().filter(|f| f.ends_with(".json")) {
        let content = host
            .read_file(&dir.join(&relative_path))
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()));
        let content = match content {
            Ok(content) => content,
            Err(message) => {
                diagnostics.report(
                    Code::ExampleLoading,
                    &relative_path,
                    format!("Cannot read example file '{}': {}", relative_path, message),
                );
                continue;
            }
        };

        let operation_id = content.get("operationId").and_then(Value::as_str);
        let title = content.get("title").and_then(Value::as_str);
        let (Some(operation_id), Some(title)) = (operation_id, title) else {
            diagnostics.report(
                Code::ExampleLoading,
                &relative_path,
                format!(
                    "Example file '{}' is missing title or operationId.",
                    relative_path
                ),
            );
            continue;
        };

        loaded.push(LoadedExample {
            operation_id: operation_id.to_string(),
            title: title.to_string(),
            relative_path,
            content,
        });
    }

    tracing::debug!(dir = %dir.display(), count = loaded.len(), "examples loaded");
    loaded
}

/// Attach loaded examples to the operations of `section`.
///
/// Must run after the section was bound: conforming resolves `$ref`s against
/// `definitions`.
pub fn bind_examples(
    section: &mut PathsSection,
    definitions: &BTreeMap<String, Schema>,
    examples: Vec<LoadedExample>,
    diagnostics: &mut Diagnostics,
) -> Vec<BoundExample> {
    let mut bound = Vec::new();
    // (operationId, title) and (operationId, file) already taken, seeded
    // with the examples declared on the operations.
    let mut titles: BTreeSet<(String, String)> = BTreeSet::new();
    let mut files: BTreeSet<(String, String)> = BTreeSet::new();
    let mut declared_titles: BTreeSet<(String, String)> = BTreeSet::new();
    for entry in &section.operations {
        let operation_id = &entry.object.operation_id;
        for (title, example) in &entry.object.examples {
            titles.insert((operation_id.clone(), title.clone()));
            declared_titles.insert((operation_id.clone(), title.clone()));
            files.insert((operation_id.clone(), example.reference.clone()));
        }
    }

    for example in examples {
        let Some(operation) = section.operation_mut(&example.operation_id) else {
            diagnostics.report(
                Code::ExampleOperationNotFound,
                &example.relative_path,
                format!(
                    "Example '{}' references operation '{}' which does not exist.",
                    example.relative_path, example.operation_id
                ),
            );
            continue;
        };

        let reference = format!("./examples/{}", example.relative_path);
        let title_key = (example.operation_id.clone(), example.title.clone());
        if declared_titles.contains(&title_key)
            || files.contains(&(example.operation_id.clone(), reference.clone()))
        {
            diagnostics.report(
                Code::DuplicateExample,
                &example.relative_path,
                format!(
                    "Example file {} duplicates the title or file of an example declared on operation '{}'",
                    example.relative_path, example.operation_id
                ),
            );
            continue;
        }
        if !titles.insert(title_key) {
            diagnostics.report(
                Code::DuplicateExampleFile,
                &example.relative_path,
                format!(
                    "Example file {} uses duplicate title '{}' for operationId '{}'",
                    example.relative_path, example.title, example.operation_id
                ),
            );
            continue;
        }

        let conformer = Conformer {
            definitions,
            file: &example.relative_path,
        };
        let content = conformer.conform_example(operation, example.content, diagnostics);

        files.insert((example.operation_id.clone(), reference.clone()));
        operation.examples.insert(example.title.clone(), ExampleRef { reference });
        bound.push(BoundExample {
            relative_path: example.relative_path,
            content,
        });
    }

    bound
}

/// Checks example payloads against lowered schemas, dropping what does not fit.
struct Conformer<'a> {
    definitions: &'a BTreeMap<String, Schema>,
    file: &'a str,
}

impl Conformer<'_> {
    /// Conform the body parameter and every response body of an example.
    fn conform_example(
        &self,
        operation: &OperationObject,
        mut content: Value,
        diagnostics: &mut Diagnostics,
    ) -> Value {
        if let Some(parameters) = content.get_mut("parameters").and_then(Value::as_object_mut) {
            for entry in &operation.parameters {
                let ParameterEntry::Inline(parameter) = entry else {
                    continue;
                };
                if let Some(schema) = &parameter.schema {
                    let path = format!("parameters/{}", parameter.name);
                    self.conform_entry(parameters, &parameter.name, schema, &path, diagnostics);
                }
            }
        }

        if let Some(responses) = content.get_mut("responses").and_then(Value::as_object_mut) {
            for (status, response) in responses.iter_mut() {
                let Some(schema) = operation.responses.get(status).and_then(|r| r.schema.as_ref())
                else {
                    continue;
                };
                if let Some(body) = response.as_object_mut() {
                    let path = format!("responses/{}/body", status);
                    self.conform_entry(body, "body", schema, &path, diagnostics);
                }
            }
        }

        content
    }

    /// Conform `map[key]` in place, removing it when it does not fit.
    fn conform_entry(
        &self,
        map: &mut Map<String, Value>,
        key: &str,
        schema: &Schema,
        path: &str,
        diagnostics: &mut Diagnostics,
    ) {
        let Some(slot) = map.get_mut(key) else {
            return;
        };
        match self.conform(slot.take(), schema, path, diagnostics) {
            Some(value) => *slot = value,
            None => {
                map.shift_remove(key);
            }
        }
    }

    /// Definition a schema points at, or the schema itself.
    fn target<'s>(&'s self, schema: &'s Schema) -> Option<&'s Schema> {
        match &schema.reference {
            None => Some(schema),
            Some(Reference::Resolved(path)) => {
                let name = path.strip_prefix("#/definitions/")?;
                self.definitions.get(name)
            }
            Some(Reference::Pending(_)) => None,
        }
    }

    /// Properties of an object schema, including the ones inherited via `allOf`.
    fn properties<'s>(&'s self, schema: &'s Schema, seen: &mut BTreeSet<&'s str>) -> Vec<(&'s str, &'s Schema)> {
        let mut properties = Vec::new();
        for base in schema.all_of.iter().flatten() {
            if let Some(Reference::Resolved(path)) = &base.reference {
                if !seen.insert(path.as_str()) {
                    continue;
                }
            }
            if let Some(base) = self.target(base) {
                properties.extend(self.properties(base, seen));
            }
        }
        if let Some(own) = &schema.properties {
            properties.extend(own.0.iter().map(|(n, s)| (n.as_str(), s)));
        }
        properties
    }

    /// The conformed value, or `None` when the value does not fit at all.
    fn conform(&self, value: Value, schema: &Schema, path: &str, diagnostics: &mut Diagnostics) -> Option<Value> {
        // References outside this document cannot be checked.
        let Some(schema) = self.target(schema) else {
            return Some(value);
        };
        if value.is_null() && schema.nullable == Some(true) {
            return Some(value);
        }

        let is_object = schema.schema_type == Some(SchemaType::Object)
            || schema.properties.is_some()
            || schema.all_of.is_some();
        if is_object {
            let Value::Object(object) = value else {
                self.mismatch(path, "expected an object", diagnostics);
                return None;
            };
            let properties = self.properties(schema, &mut BTreeSet::new());
            let mut conformed = Map::new();
            for (key, item) in object {
                let item_schema = properties
                    .iter()
                    .find(|(n, _)| *n == key)
                    .map(|(_, s)| *s)
                    .or(schema.additional_properties.as_deref());
                let item_path = format!("{}/{}", path, key);
                let item = match item_schema {
                    Some(item_schema) => self.conform(item, item_schema, &item_path, diagnostics),
                    None => Some(item),
                };
                if let Some(item) = item {
                    conformed.insert(key, item);
                }
            }
            return Some(Value::Object(conformed));
        }

        if schema.schema_type == Some(SchemaType::Array) {
            let Value::Array(items) = value else {
                self.mismatch(path, "expected an array", diagnostics);
                return None;
            };
            let Some(item_schema) = schema.items.as_deref() else {
                return Some(Value::Array(items));
            };
            let conformed = items
                .into_iter()
                .enumerate()
                .filter_map(|(i, item)| self.conform(item, item_schema, &format!("{}/{}", path, i), diagnostics))
                .collect();
            return Some(Value::Array(conformed));
        }

        match leaf_validator(schema) {
            Some(leaf) => match jsonschema::validator_for(&leaf) {
                Ok(validator) => {
                    if let Some(error) = validator.iter_errors(&value).next() {
                        self.mismatch(path, &error.to_string(), diagnostics);
                        return None;
                    }
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!(path, error = %e, "cannot build leaf validator");
                    Some(value)
                }
            },
            None => Some(value),
        }
    }

    fn mismatch(&self, path: &str, detail: &str, diagnostics: &mut Diagnostics) {
        diagnostics.report(
            Code::ExampleValueMismatch,
            format!("{}#/{}", self.file, path),
            format!("Example value does not match its schema and was omitted: {}", detail),
        );
    }
}

/// JSON Schema for a leaf: only `type` and `enum` are checked.
fn leaf_validator(schema: &Schema) -> Option<Value> {
    let mut leaf = Map::new();
    if let Some(schema_type) = schema.schema_type {
        let name = serde_json::to_value(schema_type).ok()?;
        leaf.insert("type".to_string(), name);
    }
    if let Some(values) = &schema.enum_values {
        leaf.insert("enum".to_string(), Value::Array(values.clone()));
    }
    if leaf.is_empty() {
        None
    } else {
        Some(Value::Object(leaf))
    }
}
