//! Emission orchestration: one snapshot per service and version.
//!
//! [`compile`] lowers everything and collects diagnostics without touching
//! the output. [`emit`] compiles and then writes documents and example files
//! only if no diagnostic of the whole compile is an error.

use std::path::PathBuf;

use crate::diagnostics::Diagnostics;
use crate::document::Document;
use crate::error::EmitError;
use crate::examples::{bind_examples, load_examples, BoundExample};
use crate::graph::TypeGraph;
use crate::host::{EmitHost, TemplateVars};
use crate::lower::LowerContext;
use crate::paths::lower_operations;
use crate::security::lower_security;
use crate::service::Service;
use crate::types::EmitterOptions;
use crate::versioning::{project_version, snapshots, version_status, Snapshot};

/// Fully lowered document for one (service, version) pair.
#[derive(Debug, Clone)]
pub struct SnapshotOutput {
    pub service: String,
    pub version: Option<String>,
    /// Resolved output path of the document.
    pub path: PathBuf,
    pub document: Document,
    pub examples: Vec<BoundExample>,
}

/// Result of lowering a whole graph.
#[derive(Debug, Clone, Default)]
pub struct Compilation {
    pub outputs: Vec<SnapshotOutput>,
    /// Upstream diagnostics first, then every snapshot's in order.
    pub diagnostics: Diagnostics,
}

/// What an emission run did.
#[derive(Debug, Clone, Default)]
pub struct EmitReport {
    pub diagnostics: Diagnostics,
    /// Files written, documents and examples; empty when the compile failed.
    pub written: Vec<PathBuf>,
}

impl EmitReport {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors()
    }
}

/// Lower every snapshot of every service in `graph`.
pub fn compile(graph: &TypeGraph, options: &EmitterOptions, host: &dyn EmitHost) -> Compilation {
    let mut compilation = Compilation {
        outputs: Vec::new(),
        diagnostics: Diagnostics::from(graph.diagnostics.clone()),
    };

    let dangling = graph.check_references();
    if !dangling.is_empty() {
        compilation.diagnostics.extend(Diagnostics::from(dangling));
        return compilation;
    }

    // A graph without services still gets a document for its types.
    let implicit = [Service::default()];
    let services: &[Service] = if graph.services.is_empty() {
        &implicit
    } else {
        &graph.services
    };
    let multiple_services = services.len() > 1;

    for service in services {
        for snapshot in snapshots(service, options.version.as_deref(), &mut compilation.diagnostics) {
            let output = lower_snapshot(
                graph,
                service,
                &snapshot,
                multiple_services,
                options,
                host,
                &mut compilation.diagnostics,
            );
            compilation.outputs.push(output);
        }
    }

    tracing::info!(
        documents = compilation.outputs.len(),
        errors = compilation.diagnostics.errors(),
        warnings = compilation.diagnostics.warnings(),
        "compile finished"
    );
    compilation
}

fn lower_snapshot(
    graph: &TypeGraph,
    service: &Service,
    snapshot: &Snapshot,
    multiple_services: bool,
    options: &EmitterOptions,
    host: &dyn EmitHost,
    diagnostics: &mut Diagnostics,
) -> SnapshotOutput {
    let _span = tracing::debug_span!(
        "snapshot",
        service = %service.name,
        version = snapshot.version.as_deref().unwrap_or("-")
    )
    .entered();

    let projected = project_version(graph, service, snapshot, diagnostics);
    let projected_service = &projected.services[0];

    let mut cx = LowerContext::new(&projected, options);
    let mut paths = lower_operations(&mut cx, projected_service);
    let security = lower_security(projected_service, &mut cx.diagnostics);
    if !options.omit_unreachable_types {
        cx.include_unreferenced();
    }
    let (finalized, mut snapshot_diagnostics) = cx.finish();
    paths.bind(&finalized);

    let mut examples = Vec::new();
    if let Some(base) = &options.examples_directory {
        let dir = match (&snapshot.version, snapshot.versioned) {
            (Some(version), true) => base.join(version),
            _ => base.clone(),
        };
        let loaded = load_examples(host, &dir, true, &mut snapshot_diagnostics);
        examples = bind_examples(&mut paths, &finalized.definitions, loaded, &mut snapshot_diagnostics);
    }

    let info_version = snapshot.version.clone().or_else(|| service.version.clone());
    let path = output_path(service, snapshot, multiple_services, options, host);
    let document = Document::assemble(
        service,
        info_version.as_deref(),
        paths,
        security,
        finalized.definitions,
    );

    tracing::debug!(
        path = %path.display(),
        definitions = document.definitions.len(),
        diagnostics = snapshot_diagnostics.len(),
        "snapshot lowered"
    );
    diagnostics.extend(snapshot_diagnostics);

    SnapshotOutput {
        service: service.name.clone(),
        version: snapshot.version.clone(),
        path,
        document,
        examples,
    }
}

/// Resolve the output file pattern for a snapshot.
fn output_path(
    service: &Service,
    snapshot: &Snapshot,
    multiple_services: bool,
    options: &EmitterOptions,
    host: &dyn EmitHost,
) -> PathBuf {
    let folder = options.azure_resource_provider_folder.clone();
    let version = match (&snapshot.version, &folder) {
        (Some(version), _) => Some(version.clone()),
        (None, Some(_)) => Some(
            service
                .version
                .clone()
                .unwrap_or_else(|| "0000-00-00".to_string()),
        ),
        (None, None) => None,
    };
    let service_name = (multiple_services || folder.is_some()).then(|| service.name.clone());
    let status = folder
        .as_ref()
        .and_then(|_| version_status(version.as_deref()))
        .map(str::to_string);

    let vars: TemplateVars = [
        ("azure-resource-provider-folder", folder),
        ("service-name", service_name),
        ("version-status", status),
        ("version", version),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    options
        .output_dir
        .join(host.resolve_template(&options.output_file, &vars))
}

/// Compile `graph` and, if the compile has no error, write every document and
/// bound example through `host`.
///
/// Diagnostics never turn into `Err`; only serialization and host failures do.
pub fn emit(
    graph: &TypeGraph,
    options: &EmitterOptions,
    host: &mut dyn EmitHost,
) -> Result<EmitReport, EmitError> {
    let compilation = compile(graph, options, &*host);
    let mut report = EmitReport {
        diagnostics: compilation.diagnostics,
        written: Vec::new(),
    };

    if report.has_errors() {
        tracing::info!(errors = report.diagnostics.errors(), "compile has errors, nothing written");
        return Ok(report);
    }

    // Serialize everything before the first write.
    let mut files = Vec::new();
    for output in &compilation.outputs {
        let text = output.document.to_json().map_err(|source| EmitError::Serialize {
            path: output.path.clone(),
            source,
        })?;
        files.push((output.path.clone(), text));

        let examples_dir = output
            .path
            .parent()
            .map(|p| p.join("examples"))
            .unwrap_or_else(|| PathBuf::from("examples"));
        for example in &output.examples {
            let path = examples_dir.join(&example.relative_path);
            let mut text = serde_json::to_string_pretty(&example.content)
                .map_err(|source| EmitError::Serialize {
                    path: path.clone(),
                    source,
                })?;
            text.push('\n');
            files.push((path, text));
        }
    }

    for (path, text) in files {
        host.write(&path, &text, options.new_line)?;
        tracing::info!(path = %path.display(), "wrote");
        report.written.push(path);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{Code, Diagnostic};
    use crate::graph::{Model, Property, Scalar};
    use crate::host::MemoryHost;
    use crate::service::{Operation, Response, Verb};
    use std::path::Path;

    fn service_graph() -> TypeGraph {
        let mut graph = TypeGraph::new();
        let s = graph.add(Scalar::std("string"));
        let widget = graph.add(Model::named("Widget").property(Property::new("name", s)));
        graph.service(
            Service::new("Contoso.Widgets")
                .versions(&["2023-01-01", "2024-01-01-preview"])
                .operation(Operation::new("get", Verb::Get, "/widgets").response(Response::ok(widget))),
        )
    }

    #[test]
    fn one_document_per_version() {
        let graph = service_graph();
        let options = EmitterOptions::new("out");
        let mut host = MemoryHost::new();
        let report = emit(&graph, &options, &mut host).unwrap();

        assert!(!report.has_errors());
        assert_eq!(
            report.written,
            vec![
                PathBuf::from("out/2023-01-01/openapi.json"),
                PathBuf::from("out/2024-01-01-preview/openapi.json"),
            ]
        );
    }

    #[test]
    fn provider_folder_adds_service_name_and_status() {
        let graph = service_graph();
        let options = EmitterOptions::new("out").azure_resource_provider_folder("resource-manager");
        let compilation = compile(&graph, &options, &MemoryHost::new());
        assert_eq!(
            compilation.outputs[1].path,
            Path::new("out/resource-manager/Contoso.Widgets/preview/2024-01-01-preview/openapi.json")
        );
    }

    #[test]
    fn upstream_error_blocks_every_write() {
        let mut graph = service_graph();
        graph
            .diagnostics
            .push(Diagnostic::new(Code::Upstream, "main.tsp", "type error"));
        let mut host = MemoryHost::new();
        let report = emit(&graph, &EmitterOptions::new("out"), &mut host).unwrap();

        assert!(report.has_errors());
        assert!(report.written.is_empty());
        assert!(host.files.is_empty());
    }

    #[test]
    fn dangling_references_stop_lowering() {
        let mut graph = TypeGraph::new();
        graph.add(Model::named("Broken").property(Property::new("x", crate::graph::TypeId(7))));
        let compilation = compile(&graph, &EmitterOptions::default(), &MemoryHost::new());
        assert!(compilation.outputs.is_empty());
        assert_eq!(compilation.diagnostics.with_code(Code::InvalidSchema).count(), 1);
    }

    #[test]
    fn graph_without_services_emits_its_types() {
        let mut graph = TypeGraph::new();
        graph.add(Model::named("Lonely"));
        let compilation = compile(&graph, &EmitterOptions::new("out"), &MemoryHost::new());
        assert_eq!(compilation.outputs.len(), 1);
        assert_eq!(compilation.outputs[0].path, Path::new("out/openapi.json"));
        assert!(compilation.outputs[0].document.definitions.contains_key("Lonely"));
    }
}
