//! Document assembly and serialization.
//!
//! Every map in [`Document`] is a `BTreeMap`, so definitions, paths, verbs
//! within a path, shared parameters and security definitions come out in
//! lexicographic order and two runs over the same graph are byte-identical.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::paths::{OperationObject, ParameterObject, PathsSection};
use crate::schema::Schema;
use crate::security::{SecurityRequirement, SecurityScheme, SecuritySection};
use crate::service::Service;
use crate::types::SWAGGER_VERSION;

const DEFAULT_TITLE: &str = "(title)";
const DEFAULT_VERSION: &str = "0000-00-00";
const JSON_MEDIA_TYPE: &str = "application/json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Generator {
    pub emitter: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "x-typespec-generated")]
    pub generated: Vec<Generator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub name: String,
}

pub type PathItem = BTreeMap<&'static str, OperationObject>;

/// A complete Swagger 2 document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub swagger: &'static str,
    pub info: Info,
    pub schemes: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub produces: Vec<&'static str>,
    pub consumes: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub security_definitions: BTreeMap<String, SecurityScheme>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(rename = "x-ms-paths", skip_serializing_if = "BTreeMap::is_empty")]
    pub ms_paths: BTreeMap<String, PathItem>,
    pub definitions: BTreeMap<String, Schema>,
    pub parameters: BTreeMap<String, ParameterObject>,
}

impl Document {
    /// Merge the lowered parts of one snapshot.
    pub fn assemble(
        service: &Service,
        version: Option<&str>,
        paths: PathsSection,
        security: SecuritySection,
        definitions: BTreeMap<String, Schema>,
    ) -> Self {
        let mut path_items: BTreeMap<String, PathItem> = BTreeMap::new();
        let mut ms_paths: BTreeMap<String, PathItem> = BTreeMap::new();
        for entry in paths.operations {
            let target = if entry.overload {
                &mut ms_paths
            } else {
                &mut path_items
            };
            target
                .entry(entry.path)
                .or_default()
                .insert(entry.verb.as_str(), entry.object);
        }

        Document {
            swagger: SWAGGER_VERSION,
            info: Info {
                title: service
                    .title
                    .clone()
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
                version: version.unwrap_or(DEFAULT_VERSION).to_string(),
                description: service.doc.clone(),
                generated: vec![Generator {
                    emitter: env!("CARGO_PKG_NAME"),
                }],
            },
            schemes: vec!["https"],
            host: service.host.clone(),
            produces: vec![JSON_MEDIA_TYPE],
            consumes: vec![JSON_MEDIA_TYPE],
            security: security.requirements,
            security_definitions: security.definitions,
            tags: paths.tags.into_iter().map(|name| Tag { name }).collect(),
            paths: path_items,
            ms_paths,
            definitions,
            parameters: paths.parameters,
        }
    }

    /// Pretty-printed JSON with exactly one trailing newline.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut text = serde_json::to_string_pretty(self)?;
        text.push('\n');
        Ok(text)
    }
}
