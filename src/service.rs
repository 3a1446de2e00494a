//! Services and their HTTP operations.

use serde::{Deserialize, Serialize};

use crate::graph::{Availability, TypeRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "get",
            Verb::Head => "head",
            Verb::Post => "post",
            Verb::Put => "put",
            Verb::Patch => "patch",
            Verb::Delete => "delete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterLocation {
    Path,
    Query,
    Header,
    Body,
}

impl ParameterLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterLocation::Path => "path",
            ParameterLocation::Query => "query",
            ParameterLocation::Header => "header",
            ParameterLocation::Body => "body",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: ParameterLocation,
    #[serde(rename = "type")]
    pub ty: TypeRef,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub doc: Option<String>,
    /// Key under the document's top-level `parameters`, for shared parameters.
    #[serde(default)]
    pub shared_name: Option<String>,
    #[serde(default)]
    pub availability: Availability,
}

impl Parameter {
    pub fn new(name: impl Into<String>, location: ParameterLocation, ty: impl Into<TypeRef>) -> Self {
        Self {
            name: name.into(),
            location,
            ty: ty.into(),
            optional: false,
            doc: None,
            shared_name: None,
            availability: Availability::default(),
        }
    }

    pub fn path(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ParameterLocation::Path, ty)
    }

    pub fn query(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ParameterLocation::Query, ty)
    }

    pub fn header(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ParameterLocation::Header, ty)
    }

    pub fn body(name: impl Into<String>, ty: impl Into<TypeRef>) -> Self {
        Self::new(name, ParameterLocation::Body, ty)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn shared(mut self, name: impl Into<String>) -> Self {
        self.shared_name = Some(name.into());
        self
    }

    pub fn added(mut self, version: impl Into<String>) -> Self {
        self.availability.added = Some(version.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    Code(u16),
    Range { start: u16, end: u16 },
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: StatusCode,
    #[serde(default)]
    pub body: Option<TypeRef>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Response {
    pub fn new(status: StatusCode, body: Option<TypeRef>) -> Self {
        Self {
            status,
            body,
            description: None,
        }
    }

    pub fn ok(body: impl Into<TypeRef>) -> Self {
        Self::new(StatusCode::Code(200), Some(body.into()))
    }

    pub fn no_content() -> Self {
        Self::new(StatusCode::Code(204), None)
    }
}

/// An example file attached to an operation in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleDeclaration {
    pub title: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Operation {
    pub name: String,
    /// Interface or namespace the operation is declared in, if not the service.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub operation_id: Option<String>,
    pub verb: Verb,
    pub path: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub responses: Vec<Response>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub doc: Option<String>,
    #[serde(default)]
    pub deprecated: bool,
    #[serde(default)]
    pub examples: Vec<ExampleDeclaration>,
    #[serde(default)]
    pub availability: Availability,
}

impl Operation {
    pub fn new(name: impl Into<String>, verb: Verb, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            group: None,
            operation_id: None,
            verb,
            path: path.into(),
            parameters: Vec::new(),
            responses: Vec::new(),
            tags: Vec::new(),
            summary: None,
            doc: None,
            deprecated: false,
            examples: Vec::new(),
            availability: Availability::default(),
        }
    }

    pub fn group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn response(mut self, response: Response) -> Self {
        self.responses.push(response);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn example(mut self, title: impl Into<String>, path: impl Into<String>) -> Self {
        self.examples.push(ExampleDeclaration {
            title: title.into(),
            path: path.into(),
        });
        self
    }

    pub fn added(mut self, version: impl Into<String>) -> Self {
        self.availability.added = Some(version.into());
        self
    }

    pub fn removed(mut self, version: impl Into<String>) -> Self {
        self.availability.removed = Some(version.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    Header,
    Query,
    Cookie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OAuth2FlowKind {
    AuthorizationCode,
    ClientCredentials,
    Implicit,
    Password,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OAuth2Flow {
    #[serde(rename = "type")]
    pub kind: OAuth2FlowKind,
    #[serde(default)]
    pub authorization_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// Authentication scheme as declared in the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AuthScheme {
    Http {
        id: String,
        scheme: String,
        #[serde(default)]
        description: Option<String>,
    },
    ApiKey {
        id: String,
        #[serde(rename = "in")]
        location: ApiKeyLocation,
        name: String,
        #[serde(default)]
        description: Option<String>,
    },
    Oauth2 {
        id: String,
        flows: Vec<OAuth2Flow>,
        #[serde(default)]
        description: Option<String>,
    },
    OpenIdConnect {
        id: String,
        url: String,
    },
}

impl AuthScheme {
    pub fn id(&self) -> &str {
        match self {
            AuthScheme::Http { id, .. }
            | AuthScheme::ApiKey { id, .. }
            | AuthScheme::Oauth2 { id, .. }
            | AuthScheme::OpenIdConnect { id, .. } => id,
        }
    }
}

/// One acceptable combination of schemes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthOption {
    pub schemes: Vec<AuthScheme>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Service {
    /// Fully qualified namespace name of the service.
    pub name: String,
    pub title: Option<String>,
    pub doc: Option<String>,
    /// Version of an unversioned service.
    pub version: Option<String>,
    /// Declared API versions, oldest first.
    pub versions: Vec<String>,
    pub host: Option<String>,
    pub auth: Vec<AuthOption>,
    pub operations: Vec<Operation>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn versions(mut self, versions: &[&str]) -> Self {
        self.versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    pub fn auth(mut self, option: AuthOption) -> Self {
        self.auth.push(option);
        self
    }

    pub fn is_versioned(&self) -> bool {
        !self.versions.is_empty()
    }
}
