//! Service authentication mapped to Swagger 2 security definitions.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::diagnostics::{Code, Diagnostics};
use crate::service::{ApiKeyLocation, AuthScheme, OAuth2FlowKind, Service};

/// A Swagger 2 security scheme object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum SecurityScheme {
    Basic {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    ApiKey {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(rename = "in")]
        location: &'static str,
        name: String,
    },
    #[serde(rename = "oauth2", rename_all = "camelCase")]
    OAuth2 {
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        flow: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        authorization_url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        token_url: Option<String>,
        scopes: BTreeMap<String, String>,
    },
}

/// One security requirement: scheme id to required scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// `securityDefinitions` and `security` of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SecuritySection {
    pub definitions: BTreeMap<String, SecurityScheme>,
    pub requirements: Vec<SecurityRequirement>,
}

/// Map every authentication option of `service`.
///
/// Schemes the dialect cannot express are reported as warnings and skipped;
/// an option left without any scheme is dropped.
pub fn lower_security(service: &Service, diagnostics: &mut Diagnostics) -> SecuritySection {
    let mut section = SecuritySection::default();

    for option in &service.auth {
        let mut requirement = SecurityRequirement::new();
        for scheme in &option.schemes {
            if let Some((definition, scopes)) = lower_scheme(service, scheme, diagnostics) {
                section.definitions.insert(scheme.id().to_string(), definition);
                requirement.insert(scheme.id().to_string(), scopes);
            }
        }
        if !requirement.is_empty() {
            section.requirements.push(requirement);
        }
    }

    section
}

fn lower_scheme(
    service: &Service,
    scheme: &AuthScheme,
    diagnostics: &mut Diagnostics,
) -> Option<(SecurityScheme, Vec<String>)> {
    match scheme {
        AuthScheme::Http {
            scheme: http,
            description,
            ..
        } => {
            if !http.eq_ignore_ascii_case("basic") {
                diagnostics.report(
                    Code::UnsupportedHttpAuthScheme,
                    &service.name,
                    format!("The specified HTTP authentication scheme is not supported by this emitter: {}.", http),
                );
                return None;
            }
            Some((
                SecurityScheme::Basic {
                    description: description.clone(),
                },
                Vec::new(),
            ))
        }
        AuthScheme::ApiKey {
            location,
            name,
            description,
            ..
        } => {
            let location = match location {
                ApiKeyLocation::Header => "header",
                ApiKeyLocation::Query => "query",
                ApiKeyLocation::Cookie => return None,
            };
            Some((
                SecurityScheme::ApiKey {
                    description: description.clone(),
                    location,
                    name: name.clone(),
                },
                Vec::new(),
            ))
        }
        AuthScheme::Oauth2 {
            flows, description, ..
        } => {
            let flow = flows.first()?;
            let flow_name = match flow.kind {
                OAuth2FlowKind::AuthorizationCode => "accessCode",
                OAuth2FlowKind::ClientCredentials => "application",
                OAuth2FlowKind::Implicit => "implicit",
                OAuth2FlowKind::Password => "password",
            };
            Some((
                SecurityScheme::OAuth2 {
                    description: description.clone(),
                    flow: flow_name,
                    authorization_url: flow.authorization_url.clone(),
                    token_url: flow.token_url.clone(),
                    scopes: flow.scopes.iter().map(|s| (s.clone(), String::new())).collect(),
                },
                flow.scopes.clone(),
            ))
        }
        AuthScheme::OpenIdConnect { .. } => {
            diagnostics.report(
                Code::UnsupportedAuth,
                &service.name,
                "Authentication \"openIdConnect\" is not a known authentication by the openapi2 target.",
            );
            None
        }
    }
}
