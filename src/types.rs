//! Emitter options and shared constants.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::visibility::RequirednessPolicy;

/// Default output path pattern.
pub const DEFAULT_OUTPUT_FILE: &str =
    "{azure-resource-provider-folder}/{service-name}/{version-status}/{version}/openapi.json";

/// Swagger dialect version written into every document.
pub const SWAGGER_VERSION: &str = "2.0";

/// Line ending used for written files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum NewLine {
    #[default]
    Lf,
    Crlf,
}

impl NewLine {
    pub fn as_str(&self) -> &'static str {
        match self {
            NewLine::Lf => "\n",
            NewLine::Crlf => "\r\n",
        }
    }

    /// Rewrite `\n` line endings of `content` to this style.
    pub fn apply(&self, content: &str) -> String {
        match self {
            NewLine::Lf => content.to_string(),
            NewLine::Crlf => content.replace("\r\n", "\n").replace('\n', "\r\n"),
        }
    }
}

/// Options for one emission run.
///
/// Deserializable from a JSON options file (kebab-case keys); every field
/// has a default so partial files are fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EmitterOptions {
    /// Directory the templated output path is resolved against.
    pub output_dir: PathBuf,
    /// Output path pattern, see [`DEFAULT_OUTPUT_FILE`].
    pub output_file: String,
    pub new_line: NewLine,
    /// Only emit this API version.
    pub version: Option<String>,
    pub azure_resource_provider_folder: Option<String>,
    /// Root of example files; `<dir>/<version>` is used for versioned services.
    pub examples_directory: Option<PathBuf>,
    /// Skip named types no operation reaches.
    pub omit_unreachable_types: bool,
    /// Library name to the file its definitions live in, relative to the output.
    pub library_files: BTreeMap<String, String>,
    /// Contexts that relax requiredness (`relaxed-contexts`).
    #[serde(flatten)]
    pub requiredness: RequirednessPolicy,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            new_line: NewLine::Lf,
            version: None,
            azure_resource_provider_folder: None,
            examples_directory: None,
            omit_unreachable_types: false,
            library_files: BTreeMap::new(),
            requiredness: RequirednessPolicy::default(),
        }
    }
}

impl EmitterOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    pub fn output_file(mut self, pattern: impl Into<String>) -> Self {
        self.output_file = pattern.into();
        self
    }

    pub fn new_line(mut self, new_line: NewLine) -> Self {
        self.new_line = new_line;
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn azure_resource_provider_folder(mut self, folder: impl Into<String>) -> Self {
        self.azure_resource_provider_folder = Some(folder.into());
        self
    }

    pub fn examples_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.examples_directory = Some(dir.into());
        self
    }

    pub fn omit_unreachable_types(mut self, omit: bool) -> Self {
        self.omit_unreachable_types = omit;
        self
    }

    pub fn library_file(mut self, library: impl Into<String>, file: impl Into<String>) -> Self {
        self.library_files.insert(library.into(), file.into());
        self
    }

    /// File holding the definitions of `library`.
    pub fn library_file_for(&self, library: &str) -> String {
        self.library_files
            .get(library)
            .cloned()
            .unwrap_or_else(|| format!("{}.json", library))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn crlf_rewrites_line_endings() {
        assert_eq!(NewLine::Crlf.apply("a\nb\n"), "a\r\nb\r\n");
        assert_eq!(NewLine::Crlf.apply("a\r\nb\n"), "a\r\nb\r\n");
        assert_eq!(NewLine::Lf.apply("a\nb\n"), "a\nb\n");
    }

    #[test]
    fn options_deserialize_partial() {
        let options: EmitterOptions = serde_json::from_value(json!({
            "new-line": "crlf",
            "omit-unreachable-types": true,
            "library-files": { "common": "../common/types.json" },
            "relaxed-contexts": ["update", "create-or-update"]
        }))
        .unwrap();

        assert_eq!(options.new_line, NewLine::Crlf);
        assert!(options.omit_unreachable_types);
        assert_eq!(options.output_file, DEFAULT_OUTPUT_FILE);
        assert_eq!(options.library_file_for("common"), "../common/types.json");
        assert_eq!(options.library_file_for("other"), "other.json");
        assert!(options.requiredness.relaxes(crate::visibility::VisibilityContext::CreateOrUpdate));
    }
}
