use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::errors::{KeycloakError, KeycloakResult};

/// OpenID provider metadata served at `.well-known/openid-configuration`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenIdConfiguration {
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub introspection_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

impl OpenIdConfiguration {
    fn endpoint<'a>(value: &'a Option<String>, name: &str) -> KeycloakResult<&'a str> {
        value
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| KeycloakError::Configuration {
                message: format!("OpenID configuration has no {name}"),
            })
    }

    pub fn token_endpoint(&self) -> KeycloakResult<&str> {
        Self::endpoint(&self.token_endpoint, "token_endpoint")
    }

    pub fn authorization_endpoint(&self) -> KeycloakResult<&str> {
        Self::endpoint(&self.authorization_endpoint, "authorization_endpoint")
    }

    pub fn introspection_endpoint(&self) -> KeycloakResult<&str> {
        Self::endpoint(&self.introspection_endpoint, "introspection_endpoint")
    }

    pub fn userinfo_endpoint(&self) -> KeycloakResult<&str> {
        Self::endpoint(&self.userinfo_endpoint, "userinfo_endpoint")
    }

    pub fn end_session_endpoint(&self) -> KeycloakResult<&str> {
        Self::endpoint(&self.end_session_endpoint, "end_session_endpoint")
    }
}
