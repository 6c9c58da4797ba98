#![allow(dead_code)]

use jsonwebtoken::{encode, EncodingKey, Header};
use keycloak_client::{Keycloak, KeycloakConfig};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const REALM: &str = "test";
pub const CLIENT_ID: &str = "web";
pub const CLIENT_SECRET: &str = "s3cr3t";

/// A mocked realm: the server publishes OpenID metadata for `test` and the
/// Keycloak handle is configured against it.
pub struct TestRealm {
    pub server: MockServer,
    pub keycloak: Keycloak,
    _root: TempDir,
}

impl TestRealm {
    pub async fn start() -> Self {
        Self::start_with(|config| config).await
    }

    pub async fn start_with(configure: impl FnOnce(KeycloakConfig) -> KeycloakConfig) -> Self {
        let server = MockServer::start().await;
        let root = tempfile::tempdir().unwrap();

        Mock::given(method("GET"))
            .and(path(format!("/realms/{REALM}/.well-known/openid-configuration")))
            .respond_with(ResponseTemplate::new(200).set_body_json(openid_document(&server.uri())))
            .mount(&server)
            .await;

        let config = KeycloakConfig::new()
            .with_installation_root(root.path())
            .with_realm(REALM, server.uri())
            .with_client(CLIENT_ID, CLIENT_SECRET);
        let keycloak = Keycloak::new(configure(config)).unwrap();

        Self {
            server,
            keycloak,
            _root: root,
        }
    }

    pub fn endpoint(&self, suffix: &str) -> String {
        format!("{}{}", self.server.uri(), oidc_path(suffix))
    }
}

pub fn oidc_path(suffix: &str) -> String {
    format!("/realms/{REALM}/protocol/openid-connect/{suffix}")
}

pub fn admin_path(service: &str) -> String {
    format!("/admin/realms/{REALM}/{service}")
}

pub fn openid_document(base: &str) -> Value {
    let oidc = format!("{base}/realms/{REALM}/protocol/openid-connect");
    json!({
        "issuer": format!("{base}/realms/{REALM}"),
        "authorization_endpoint": format!("{oidc}/auth"),
        "token_endpoint": format!("{oidc}/token"),
        "introspection_endpoint": format!("{oidc}/token/introspect"),
        "userinfo_endpoint": format!("{oidc}/userinfo"),
        "end_session_endpoint": format!("{oidc}/logout"),
        "jwks_uri": format!("{oidc}/certs"),
        "grant_types_supported": ["authorization_code", "password", "refresh_token"]
    })
}

pub fn token_body(access_token: &str, refresh_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access_token,
        "expires_in": 300,
        "refresh_expires_in": 1800,
        "token_type": "Bearer",
        "not-before-policy": 0,
        "session_state": "b4a1c2d3",
        "scope": "profile email"
    });
    if let Some(refresh_token) = refresh_token {
        body["refresh_token"] = json!(refresh_token);
    }
    body
}

/// An unsigned-for-our-purposes JWT carrying `claims`.
pub fn jwt(claims: Value) -> String {
    encode(&Header::default(), &claims, &EncodingKey::from_secret(b"unused")).unwrap()
}
