//! Diagnostics accumulated while lowering a declaration graph.
//!
//! Model problems never abort lowering through `Err`: every component pushes
//! a [`Diagnostic`] into the [`Diagnostics`] collector owned by the snapshot
//! and keeps going. Whether anything gets written is decided once, at the end
//! of the emission run, by looking at [`Diagnostics::has_errors`].

use serde::{Deserialize, Serialize};

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// Every condition the lowering passes can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Code {
    // Structural
    InlineCycle,
    DuplicateTypeName,
    DuplicateBody,
    UnionNull,
    UnsupportedStatusCodeRange,
    InvalidSchema,
    UnknownVersion,
    // Discriminators
    MissingDiscriminatorProperty,
    InvalidDiscriminatorValue,
    DuplicateDiscriminatorValue,
    // Compatibility loss
    UnsupportedAuth,
    UnsupportedHttpAuthScheme,
    NonspecificScalar,
    InvalidFormat,
    UnionUnsupported,
    // Examples
    DuplicateExample,
    DuplicateExampleFile,
    ExampleLoading,
    ExampleOperationNotFound,
    ExampleValueMismatch,
    // Anything reported by the front-end that produced the graph
    Upstream,
}

impl Code {
    /// Severity a diagnostic with this code is reported at.
    pub fn severity(&self) -> Severity {
        match self {
            Code::InlineCycle
            | Code::DuplicateTypeName
            | Code::DuplicateBody
            | Code::UnionNull
            | Code::UnsupportedStatusCodeRange
            | Code::InvalidSchema
            | Code::UnknownVersion
            | Code::MissingDiscriminatorProperty
            | Code::InvalidDiscriminatorValue
            | Code::DuplicateDiscriminatorValue
            | Code::Upstream => Severity::Error,
            Code::UnsupportedAuth
            | Code::UnsupportedHttpAuthScheme
            | Code::NonspecificScalar
            | Code::InvalidFormat
            | Code::UnionUnsupported
            | Code::DuplicateExample
            | Code::DuplicateExampleFile
            | Code::ExampleLoading
            | Code::ExampleOperationNotFound
            | Code::ExampleValueMismatch => Severity::Warning,
        }
    }

    /// Kebab-case name, as shown to users.
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InlineCycle => "inline-cycle",
            Code::DuplicateTypeName => "duplicate-type-name",
            Code::DuplicateBody => "duplicate-body",
            Code::UnionNull => "union-null",
            Code::UnsupportedStatusCodeRange => "unsupported-status-code-range",
            Code::InvalidSchema => "invalid-schema",
            Code::UnknownVersion => "unknown-version",
            Code::MissingDiscriminatorProperty => "missing-discriminator-property",
            Code::InvalidDiscriminatorValue => "invalid-discriminator-value",
            Code::DuplicateDiscriminatorValue => "duplicate-discriminator-value",
            Code::UnsupportedAuth => "unsupported-auth",
            Code::UnsupportedHttpAuthScheme => "unsupported-http-auth-scheme",
            Code::NonspecificScalar => "nonspecific-scalar",
            Code::InvalidFormat => "invalid-format",
            Code::UnionUnsupported => "union-unsupported",
            Code::DuplicateExample => "duplicate-example",
            Code::DuplicateExampleFile => "duplicate-example-file",
            Code::ExampleLoading => "example-loading",
            Code::ExampleOperationNotFound => "example-operation-not-found",
            Code::ExampleValueMismatch => "example-value-mismatch",
            Code::Upstream => "upstream",
        }
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Code,
    /// What the diagnostic is about (type name, operation id, file...)
    pub target: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(code: Code, target: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: code.severity(),
            code,
            target: target.into(),
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{}[{}] {}: {}", level, self.code, self.target, self.message)
    }
}

/// Ordered collection of diagnostics for one compile (or one snapshot).
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(code = %diagnostic.code, target = %diagnostic.target, "{}", diagnostic.message);
        self.items.push(diagnostic);
    }

    /// Shorthand for `push(Diagnostic::new(..))`.
    pub fn report(&mut self, code: Code, target: impl Into<String>, message: impl Into<String>) {
        self.push(Diagnostic::new(code, target, message));
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.items.extend(other.items);
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(Diagnostic::is_error)
    }

    pub fn errors(&self) -> usize {
        self.items.iter().filter(|d| d.is_error()).count()
    }

    pub fn warnings(&self) -> usize {
        self.items.len() - self.errors()
    }

    pub fn with_code(&self, code: Code) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter().filter(move |d| d.code == code)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<Diagnostic>> for Diagnostics {
    fn from(items: Vec<Diagnostic>) -> Self {
        Self { items }
    }
}

impl<'a> IntoIterator for &'a Diagnostics {
    type Item = &'a Diagnostic;
    type IntoIter = std::slice::Iter<'a, Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_follows_code() {
        let d = Diagnostic::new(Code::InlineCycle, "Node", "cycle");
        assert!(d.is_error());
        let d = Diagnostic::new(Code::NonspecificScalar, "numeric", "fallback");
        assert!(!d.is_error());
    }

    #[test]
    fn counts_errors_and_warnings() {
        let mut diags = Diagnostics::new();
        diags.report(Code::UnionNull, "U", "only null");
        diags.report(Code::InvalidFormat, "S", "bad format");
        diags.report(Code::ExampleLoading, "a.json", "bad json");
        assert!(diags.has_errors());
        assert_eq!(diags.errors(), 1);
        assert_eq!(diags.warnings(), 2);
        assert_eq!(diags.with_code(Code::InvalidFormat).count(), 1);
    }

    #[test]
    fn display_format() {
        let d = Diagnostic::new(Code::DuplicateBody, "Pets_Create", "Request has multiple body types");
        assert_eq!(
            d.to_string(),
            "error[duplicate-body] Pets_Create: Request has multiple body types"
        );
    }

    #[test]
    fn code_serializes_kebab_case() {
        let json = serde_json::to_value(Code::MissingDiscriminatorProperty).unwrap();
        assert_eq!(json, serde_json::json!("missing-discriminator-property"));
    }
}
