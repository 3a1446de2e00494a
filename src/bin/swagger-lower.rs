//! Swagger Lowering CLI
//!
//! Command-line interface for emitting and checking Swagger 2.0 documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use swagger_lower::{
    compile, emit, load_graph, load_options, Diagnostics, EmitterOptions, FsHost, NewLine,
    Severity, TypeGraph,
};

#[derive(Parser)]
#[command(name = "swagger-lower")]
#[command(about = "Lower declaration graphs into versioned Swagger 2.0 documents")]
#[command(version)]
struct Cli {
    /// Log progress to stderr (-v for info, -vv for debug, -vvv for trace)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a graph and write one document per service and version
    Emit {
        /// Declaration graph (JSON)
        graph: PathBuf,

        #[command(flatten)]
        overrides: OptionArgs,
    },

    /// Lower a graph and report diagnostics without writing anything
    Check {
        /// Declaration graph (JSON)
        graph: PathBuf,

        #[command(flatten)]
        overrides: OptionArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Emitter options; flags override the options file.
#[derive(clap::Args)]
struct OptionArgs {
    /// Emitter options file (JSON, kebab-case keys)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Directory the output pattern is resolved against
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Output path pattern, e.g. "{version}/openapi.json"
    #[arg(long)]
    output_file: Option<String>,

    /// Line endings of written files
    #[arg(long, value_enum)]
    new_line: Option<NewLine>,

    /// Only emit this API version
    #[arg(long = "api-version")]
    api_version: Option<String>,

    #[arg(long)]
    azure_resource_provider_folder: Option<String>,

    /// Directory holding example files (`<dir>/<version>` for versioned services)
    #[arg(long)]
    examples_directory: Option<PathBuf>,

    /// Skip named types no operation reaches
    #[arg(long)]
    omit_unreachable_types: bool,
}

impl OptionArgs {
    fn resolve(self) -> Result<EmitterOptions, u8> {
        let mut options = match &self.options {
            Some(path) => load_options(path).map_err(|e| {
                eprintln!("Error: {}", e);
                e.exit_code() as u8
            })?,
            None => EmitterOptions::default(),
        };

        if let Some(dir) = self.output_dir {
            options.output_dir = dir;
        }
        if let Some(pattern) = self.output_file {
            options = options.output_file(pattern);
        }
        if let Some(new_line) = self.new_line {
            options = options.new_line(new_line);
        }
        if let Some(version) = self.api_version {
            options = options.version(version);
        }
        if let Some(folder) = self.azure_resource_provider_folder {
            options = options.azure_resource_provider_folder(folder);
        }
        if let Some(dir) = self.examples_directory {
            options = options.examples_directory(dir);
        }
        if self.omit_unreachable_types {
            options = options.omit_unreachable_types(true);
        }
        Ok(options)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Emit { graph, overrides } => run_emit(&graph, overrides),
        Commands::Check {
            graph,
            overrides,
            format,
        } => run_check(&graph, overrides, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn read_graph(path: &Path) -> Result<TypeGraph, u8> {
    load_graph(path).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })
}

fn run_emit(graph_path: &Path, overrides: OptionArgs) -> Result<(), u8> {
    let options = overrides.resolve()?;
    let graph = read_graph(graph_path)?;

    let mut host = FsHost;
    let report = emit(&graph, &options, &mut host).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    for diag in &report.diagnostics {
        eprintln!("{}", diag);
    }
    if report.has_errors() {
        eprintln!(
            "Error: {} error(s), nothing written",
            report.diagnostics.errors()
        );
        return Err(1);
    }

    for path in &report.written {
        println!("{}", path.display());
    }
    Ok(())
}

fn run_check(graph_path: &Path, overrides: OptionArgs, format: Format) -> Result<(), u8> {
    let options = overrides.resolve()?;
    let graph = read_graph(graph_path)?;

    let compilation = compile(&graph, &options, &FsHost);
    let diagnostics = &compilation.diagnostics;

    if format == Format::Json {
        let output = serde_json::json!({
            "ok": !diagnostics.has_errors(),
            "documents": compilation
                .outputs
                .iter()
                .map(|o| o.path.display().to_string())
                .collect::<Vec<_>>(),
            "errors": diagnostics.errors(),
            "warnings": diagnostics.warnings(),
            "diagnostics": diagnostics,
        });
        match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                return Err(2);
            }
        }
    } else {
        print_text_report(graph_path, compilation.outputs.len(), diagnostics);
    }

    if diagnostics.has_errors() {
        Err(1)
    } else {
        Ok(())
    }
}

fn print_text_report(graph_path: &Path, documents: usize, diagnostics: &Diagnostics) {
    println!("Checking {} ...\n", graph_path.display());

    for diag in diagnostics {
        let (color, level) = match diag.severity {
            Severity::Error => ("\x1b[31m", "error"),
            Severity::Warning => ("\x1b[33m", "warning"),
        };
        println!(
            "  {}{}[{}]\x1b[0m: {} - {}",
            color, level, diag.code, diag.target, diag.message
        );
    }

    if !diagnostics.is_empty() {
        println!();
    }
    if diagnostics.has_errors() {
        println!(
            "\x1b[31m✗ {} document(s): {} errors, {} warnings\x1b[0m",
            documents,
            diagnostics.errors(),
            diagnostics.warnings()
        );
    } else {
        println!(
            "\x1b[32m✓ {} document(s), {} warnings\x1b[0m",
            documents,
            diagnostics.warnings()
        );
    }
}
