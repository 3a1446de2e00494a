//! Host collaborator - everything that touches the outside world.
//!
//! Lowering is pure; writing documents, listing example directories and
//! reading example files go through [`EmitHost`]. [`FsHost`] is the real
//! file system, [`MemoryHost`] keeps everything in a map.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::HostError;
use crate::types::NewLine;

/// Values for the placeholders of an output path pattern.
///
/// A key mapped to `None` is known but unset: its placeholder resolves to
/// nothing and the path segment disappears if it becomes empty.
pub type TemplateVars = BTreeMap<String, Option<String>>;

pub trait EmitHost {
    /// Write `content` (with `\n` line endings) using the given newline style.
    fn write(&mut self, path: &Path, content: &str, new_line: NewLine) -> Result<(), HostError>;

    /// All files below `dir`, relative to it, using `/` separators, sorted.
    fn read_dir(&self, dir: &Path) -> Result<Vec<String>, HostError>;

    fn read_file(&self, path: &Path) -> Result<String, HostError>;

    fn is_dir(&self, path: &Path) -> bool;

    fn resolve_template(&self, pattern: &str, vars: &TemplateVars) -> String {
        interpolate_path(pattern, vars)
    }
}

/// Replace `{name}` placeholders segment by segment.
///
/// Segments that end up empty are dropped, so
/// `{service-name}/{version}/openapi.json` with no service name and version
/// `v1` becomes `v1/openapi.json`. Unknown placeholders are left untouched.
pub fn interpolate_path(pattern: &str, vars: &TemplateVars) -> String {
    pattern
        .split(['/', '\\'])
        .map(|segment| interpolate_segment(segment, vars))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn interpolate_segment(segment: &str, vars: &TemplateVars) -> String {
    let mut out = String::new();
    let mut rest = segment;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return out;
        };
        let key = &after[..close];
        match vars.get(key) {
            Some(Some(value)) => out.push_str(value),
            Some(None) => {}
            None => out.push_str(&rest[open..open + close + 2]),
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    out
}

/// Host backed by the real file system.
#[derive(Debug, Default)]
pub struct FsHost;

impl EmitHost for FsHost {
    fn write(&mut self, path: &Path, content: &str, new_line: NewLine) -> Result<(), HostError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| HostError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, new_line.apply(content)).map_err(|source| HostError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<String>, HostError> {
        let mut files = Vec::new();
        collect_files_recursive(dir, dir, &mut files)?;
        files.sort();
        Ok(files)
    }

    fn read_file(&self, path: &Path) -> Result<String, HostError> {
        std::fs::read_to_string(path).map_err(|source| HostError::Read {
            path: path.to_path_buf(),
            source,
        })
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

fn collect_files_recursive(root: &Path, dir: &Path, files: &mut Vec<String>) -> Result<(), HostError> {
    let entries = std::fs::read_dir(dir).map_err(|source| HostError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(root, &path, files)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let parts: Vec<_> = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect();
            files.push(parts.join("/"));
        }
    }
    Ok(())
}

/// Host that keeps files in memory. Writes are stored after newline conversion.
#[derive(Debug, Default, Clone)]
pub struct MemoryHost {
    pub files: BTreeMap<PathBuf, String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        self.files.insert(path.into(), content.into());
        self
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<&str> {
        self.files.get(path.as_ref()).map(String::as_str)
    }
}

impl EmitHost for MemoryHost {
    fn write(&mut self, path: &Path, content: &str, new_line: NewLine) -> Result<(), HostError> {
        self.files.insert(path.to_path_buf(), new_line.apply(content));
        Ok(())
    }

    fn read_dir(&self, dir: &Path) -> Result<Vec<String>, HostError> {
        Ok(self
            .files
            .keys()
            .filter_map(|path| path.strip_prefix(dir).ok())
            .map(|relative| {
                relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("/")
            })
            .collect())
    }

    fn read_file(&self, path: &Path) -> Result<String, HostError> {
        self.files.get(path).cloned().ok_or_else(|| HostError::Read {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        })
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.files.keys().any(|p| p != path && p.starts_with(path))
    }
}
