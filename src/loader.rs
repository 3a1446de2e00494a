//! Input loading: the declaration graph and the options file.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::LoadError;
use crate::graph::TypeGraph;
use crate::types::EmitterOptions;

/// Load a declaration graph from a JSON file.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist,
/// or `LoadError::InvalidJson` if it isn't a valid graph.
pub fn load_graph(path: &Path) -> Result<TypeGraph, LoadError> {
    load_json(path)
}

/// Load a declaration graph from a JSON string.
///
/// # Errors
///
/// Returns `LoadError::InvalidJson` if the string isn't a valid graph.
pub fn load_graph_str(content: &str) -> Result<TypeGraph, LoadError> {
    serde_json::from_str(content).map_err(|source| LoadError::InvalidJson {
        path: PathBuf::from("<string>"),
        source,
    })
}

/// Load emitter options from a JSON file with kebab-case keys.
///
/// # Errors
///
/// Same as [`load_graph`].
pub fn load_options(path: &Path) -> Result<EmitterOptions, LoadError> {
    load_json(path)
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_str(&content).map_err(|source| LoadError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewLine;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_graph_valid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"types": [{{"kind": "model", "name": "Pet"}}], "services": [{{"name": "PetStore"}}]}}"#
        )
        .unwrap();

        let graph = load_graph(file.path()).unwrap();
        assert_eq!(graph.types.len(), 1);
        assert_eq!(graph.services[0].name, "PetStore");
    }

    #[test]
    fn load_graph_file_not_found() {
        let result = load_graph(Path::new("/nonexistent/graph.json"));
        assert!(matches!(result, Err(LoadError::FileNotFound { .. })));
    }

    #[test]
    fn load_graph_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "not valid json").unwrap();

        let result = load_graph(file.path());
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_graph_str_rejects_unknown_kind() {
        let result = load_graph_str(r#"{"types": [{"kind": "tuple"}]}"#);
        assert!(matches!(result, Err(LoadError::InvalidJson { .. })));
    }

    #[test]
    fn load_options_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"new-line": "crlf", "version": "v2"}}"#).unwrap();

        let options = load_options(file.path()).unwrap();
        assert_eq!(options.new_line, NewLine::Crlf);
        assert_eq!(options.version.as_deref(), Some("v2"));
    }
}
