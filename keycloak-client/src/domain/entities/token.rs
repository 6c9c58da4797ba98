use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const TOKEN_EXCHANGE_GRANT: &str = "urn:ietf:params:oauth:grant-type:token-exchange";
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Token endpoint response
///
/// When request errors are passed through instead of raised, an error body
/// lands here with `error` set and an empty `access_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(rename = "not-before-policy", default)]
    pub not_before_policy: Option<i64>,
    #[serde(default)]
    pub session_state: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl TokenResponse {
    pub fn bearer(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_in: None,
            refresh_expires_in: None,
            refresh_token: None,
            token_type: Some("Bearer".to_string()),
            id_token: None,
            not_before_policy: None,
            session_state: None,
            scope: None,
            error: None,
            error_description: None,
            received_at: Utc::now(),
        }
    }

    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_in
            .map(|secs| self.received_at + chrono::Duration::seconds(secs))
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at().is_some_and(|at| Utc::now() >= at)
    }

    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().collect())
            .unwrap_or_default()
    }
}

/// Token introspection response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenIntrospection {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iss: Option<String>,
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

/// Client id / secret pair sent to the token endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Fill empty fields from `defaults`.
    pub fn or(&self, defaults: &ClientCredentials) -> ClientCredentials {
        let pick = |value: &String, fallback: &String| {
            if value.is_empty() {
                fallback.clone()
            } else {
                value.clone()
            }
        };
        ClientCredentials {
            client_id: pick(&self.client_id, &defaults.client_id),
            client_secret: pick(&self.client_secret, &defaults.client_secret),
        }
    }
}

/// OAuth2 grant sent to the token endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    Password { username: String, password: String },
    AuthorizationCode { code: String, redirect_uri: String },
    RefreshToken { refresh_token: String },
    ClientCredentials,
    TokenExchange { issuer: String, subject_token: String },
}

impl Grant {
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::Password { .. } => "password",
            Grant::AuthorizationCode { .. } => "authorization_code",
            Grant::RefreshToken { .. } => "refresh_token",
            Grant::ClientCredentials => "client_credentials",
            Grant::TokenExchange { .. } => TOKEN_EXCHANGE_GRANT,
        }
    }

    /// Form payload for this grant. `client_secret` and `scope` are left out when empty.
    pub fn form(
        &self,
        credentials: &ClientCredentials,
        scope: &[&str],
    ) -> Vec<(&'static str, String)> {
        let mut form = vec![("client_id", credentials.client_id.clone())];
        if !credentials.client_secret.is_empty() {
            form.push(("client_secret", credentials.client_secret.clone()));
        }

        match self {
            Grant::Password { username, password } => {
                form.push(("username", username.clone()));
                form.push(("password", password.clone()));
            }
            Grant::AuthorizationCode { code, redirect_uri } => {
                form.push(("code", code.clone()));
                form.push(("redirect_uri", redirect_uri.clone()));
            }
            Grant::RefreshToken { refresh_token } => {
                form.push(("refresh_token", refresh_token.clone()));
            }
            Grant::ClientCredentials => {}
            Grant::TokenExchange {
                issuer,
                subject_token,
            } => {
                form.push(("audience", credentials.client_id.clone()));
                form.push(("subject_token_type", ACCESS_TOKEN_TYPE.to_string()));
                form.push(("subject_issuer", issuer.clone()));
                form.push(("subject_token", subject_token.clone()));
            }
        }

        form.push(("grant_type", self.grant_type().to_string()));
        if !scope.is_empty() {
            form.push(("scope", scope.join(" ")));
        }
        form
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> ClientCredentials {
        ClientCredentials::new("djhpyigvsbefpuydgcosjdhvv", "wxcqsdgqrgbhzrgdfsghgf")
    }

    #[test]
    fn password_grant_with_scope() {
        let grant = Grant::Password {
            username: "tester".to_string(),
            password: "some_password".to_string(),
        };

        let form = grant.form(&creds(), &["openid", "offline_access"]);
        assert!(form.contains(&("grant_type", "password".to_string())));
        assert!(form.contains(&("username", "tester".to_string())));
        assert!(form.contains(&("scope", "openid offline_access".to_string())));
        assert_eq!(form.len(), 6);
    }

    #[test]
    fn empty_secret_is_not_sent() {
        let form = Grant::ClientCredentials.form(&ClientCredentials::new("spa", ""), &[]);
        assert_eq!(
            form,
            vec![
                ("client_id", "spa".to_string()),
                ("grant_type", "client_credentials".to_string()),
            ]
        );
    }

    #[test]
    fn token_exchange_targets_own_client() {
        let grant = Grant::TokenExchange {
            issuer: "google".to_string(),
            subject_token: "external".to_string(),
        };

        let form = grant.form(&creds(), &[]);
        assert!(form.contains(&("audience", "djhpyigvsbefpuydgcosjdhvv".to_string())));
        assert!(form.contains(&("grant_type", TOKEN_EXCHANGE_GRANT.to_string())));
        assert!(form.contains(&("subject_token_type", ACCESS_TOKEN_TYPE.to_string())));
    }

    #[test]
    fn overrides_fall_back_per_field() {
        let defaults = creds();
        let merged = ClientCredentials::new("other", "").or(&defaults);
        assert_eq!(merged.client_id, "other");
        assert_eq!(merged.client_secret, defaults.client_secret);
    }

    #[test]
    fn error_body_parses_as_token_response() {
        let body = r#"{"error":"invalid_grant","error_description":"Invalid user credentials"}"#;
        let token: TokenResponse = serde_json::from_str(body).unwrap();
        assert!(token.is_error());
        assert!(token.access_token.is_empty());
        assert!(!token.is_expired());
    }

    #[test]
    fn expiry_is_relative_to_receipt() {
        let body = r#"{"access_token":"zerzer","expires_in":300,"scope":"openid email"}"#;
        let token: TokenResponse = serde_json::from_str(body).unwrap();
        assert!(!token.is_expired());
        assert_eq!(token.scopes(), vec!["openid", "email"]);
        assert!(token.expires_at().unwrap() > Utc::now());
    }
}
