use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::errors::KeycloakResult;

/// Role list as found under `realm_access` / `resource_access.<client>`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims carried by Keycloak access, refresh and id tokens
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(default)]
    pub azp: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub realm_access: Option<RoleAccess>,
    #[serde(default)]
    pub resource_access: HashMap<String, RoleAccess>,
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

impl TokenClaims {
    /// Decode the payload of a JWT without checking its signature or expiry.
    pub fn decode_unverified(token: &str) -> KeycloakResult<Self> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<TokenClaims>(token, &DecodingKey::from_secret(&[]), &validation)?;
        Ok(data.claims)
    }

    pub fn has_client_role(&self, client_id: &str, role: &str) -> bool {
        self.resource_access
            .get(client_id)
            .is_some_and(|access| access.roles.iter().any(|r| r == role))
    }

    pub fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access
            .as_ref()
            .is_some_and(|access| access.roles.iter().any(|r| r == role))
    }

    /// Look up a claim by name, typed fields included.
    pub fn attribute(&self, name: &str) -> Option<serde_json::Value> {
        if let Some(value) = self.other.get(name) {
            return Some(value.clone());
        }
        serde_json::to_value(self)
            .ok()?
            .get(name)
            .filter(|v| !v.is_null())
            .cloned()
    }
}
