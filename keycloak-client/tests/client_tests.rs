mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::*;
use keycloak_client::{
    ClientCredentials, ExternalAttributes, Keycloak, KeycloakError, KeycloakResult,
    StaticTokenSource, TokenResponse,
};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn password_grant_posts_credentials_and_scope() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .and(body_string_contains("grant_type=password"))
        .and(body_string_contains("username=alice"))
        .and(body_string_contains("password=wonderland"))
        .and(body_string_contains("client_id=web"))
        .and(body_string_contains("client_secret=s3cr3t"))
        .and(body_string_contains("scope=openid+profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", Some("rt-1"))))
        .expect(1)
        .mount(&realm.server)
        .await;

    let token = realm
        .keycloak
        .client()
        .get_token("alice", "wonderland", None, &["openid", "profile"])
        .await
        .unwrap();

    assert_eq!(token.access_token, "at-1");
    assert_eq!(token.refresh_token.as_deref(), Some("rt-1"));
    assert_eq!(token.not_before_policy, Some(0));
    assert!(!token.is_error());
}

#[tokio::test]
async fn password_grant_without_scope_sends_no_scope_field() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-1", None)))
        .mount(&realm.server)
        .await;

    realm
        .keycloak
        .client()
        .get_token("alice", "wonderland", None, &[])
        .await
        .unwrap();

    let requests = realm.server.received_requests().await.unwrap();
    let token_request = requests
        .iter()
        .find(|r| r.url.path() == oidc_path("token"))
        .unwrap();
    let body = String::from_utf8_lossy(&token_request.body);
    assert!(body.contains("grant_type=password"));
    assert!(!body.contains("scope"));
}

#[tokio::test]
async fn per_call_credentials_override_realm_client() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=service"))
        .and(body_string_contains("client_secret=other"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("svc", None)))
        .expect(1)
        .mount(&realm.server)
        .await;

    let creds = ClientCredentials::new("service", "other");
    let token = realm
        .keycloak
        .client()
        .get_token_by_client_credentials(Some(&creds))
        .await
        .unwrap();

    assert_eq!(token.access_token, "svc");
}

#[tokio::test]
async fn authorization_code_and_refresh_grants() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=abc123"))
        .and(body_string_contains("redirect_uri=https%3A%2F%2Fapp.example.com%2Fcallback"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("from-code", Some("rt"))))
        .expect(1)
        .mount(&realm.server)
        .await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("refreshed", Some("rt2"))))
        .expect(1)
        .mount(&realm.server)
        .await;

    let client = realm.keycloak.client();
    let token = client
        .get_token_by_code("abc123", "https://app.example.com/callback", None, &[])
        .await
        .unwrap();
    assert_eq!(token.access_token, "from-code");

    let refreshed = client
        .get_token_by_refresh_token(token.refresh_token.as_deref(), None)
        .await
        .unwrap();
    assert_eq!(refreshed.access_token, "refreshed");
}

#[tokio::test]
async fn token_exchange_targets_given_endpoint() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path("/custom/token"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Atoken-exchange",
        ))
        .and(body_string_contains("subject_issuer=google"))
        .and(body_string_contains("subject_token=external-token"))
        .and(body_string_contains("audience=web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("exchanged", None)))
        .expect(1)
        .mount(&realm.server)
        .await;

    let token = realm
        .keycloak
        .client()
        .get_token_by_exchange(
            "google",
            "external-token",
            None,
            Some(&format!("{}/custom/token", realm.server.uri())),
        )
        .await
        .unwrap();

    assert_eq!(token.access_token, "exchanged");
}

#[tokio::test]
async fn token_errors_raise_by_default() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials"
        })))
        .mount(&realm.server)
        .await;

    let err = realm
        .keycloak
        .client()
        .get_token("alice", "wrong", None, &[])
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert!(matches!(err, KeycloakError::Http { ref body, .. } if body.contains("invalid_grant")));
}

#[tokio::test]
async fn token_errors_pass_through_when_exceptions_disabled() {
    let realm = TestRealm::start_with(|mut config| {
        config.generate_request_exception = false;
        config
    })
    .await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid user credentials"
        })))
        .mount(&realm.server)
        .await;

    let token = realm
        .keycloak
        .client()
        .get_token("alice", "wrong", None, &[])
        .await
        .unwrap();

    assert!(token.is_error());
    assert_eq!(token.error.as_deref(), Some("invalid_grant"));
    assert!(token.access_token.is_empty());
}

#[tokio::test]
async fn login_url_with_and_without_scope() {
    let realm = TestRealm::start().await;
    let client = realm.keycloak.client();
    let auth = realm.endpoint("auth");

    let plain = client
        .url_login_redirect("https://app.example.com/cb", None, None, None, &[])
        .await
        .unwrap();
    assert_eq!(
        plain,
        format!("{auth}?response_type=code&client_id=web&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb")
    );

    let scoped = client
        .url_login_redirect(
            "https://app.example.com/cb",
            Some("token"),
            Some("spa"),
            None,
            &["openid", "email"],
        )
        .await
        .unwrap();
    assert_eq!(
        scoped,
        format!(
            "{auth}?response_type=token&client_id=spa&redirect_uri=https%3A%2F%2Fapp.example.com%2Fcb&scope=openid+email"
        )
    );
}

#[tokio::test]
async fn openid_configuration_is_fetched_once() {
    let realm = TestRealm::start().await;
    let client = realm.keycloak.client();

    client
        .url_login_redirect("https://app.example.com/cb", None, None, None, &[])
        .await
        .unwrap();
    client
        .url_login_redirect("https://app.example.com/other", None, None, None, &[])
        .await
        .unwrap();

    let discovery_hits = realm
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path().ends_with("/.well-known/openid-configuration"))
        .count();
    assert_eq!(discovery_hits, 1);
}

#[tokio::test]
async fn introspection_uses_basic_auth() {
    let realm = TestRealm::start().await;

    // base64("web:s3cr3t")
    Mock::given(method("POST"))
        .and(path(oidc_path("token/introspect")))
        .and(header("authorization", "Basic d2ViOnMzY3IzdA=="))
        .and(body_string_contains("token=opaque"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "active": true,
            "client_id": "web",
            "username": "alice"
        })))
        .expect(2)
        .mount(&realm.server)
        .await;

    let client = realm.keycloak.client();
    let introspection = client
        .get_token_introspection(Some("opaque"), None, None)
        .await
        .unwrap();
    assert!(introspection.active);

    assert!(client.user_signed_in(Some("opaque"), None, None).await.unwrap());
}

#[tokio::test]
async fn user_signed_in_is_false_when_introspection_fails() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token/introspect")))
        .respond_with(ResponseTemplate::new(500))
        .mount(&realm.server)
        .await;

    let signed_in = realm
        .keycloak
        .client()
        .user_signed_in(Some("opaque"), None, None)
        .await
        .unwrap();
    assert!(!signed_in);
}

#[tokio::test]
async fn user_signed_in_without_token_source_is_a_local_error() {
    let realm = TestRealm::start().await;

    let err = realm
        .keycloak
        .client()
        .user_signed_in(None, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, KeycloakError::TokenSourceNotDefined));
}

#[tokio::test]
async fn logout_posts_refresh_token_to_end_session_endpoint() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("logout")))
        .and(query_param("redirect_uri", "https://app.example.com/bye"))
        .and(body_string_contains("refresh_token=rt-1"))
        .and(body_string_contains("client_id=web"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&realm.server)
        .await;

    let logged_out = realm
        .keycloak
        .client()
        .logout(Some("https://app.example.com/bye"), Some("rt-1"), None, None)
        .await
        .unwrap();
    assert!(logged_out);
}

#[tokio::test]
async fn logout_without_refresh_token_is_a_no_op() {
    let token = TokenResponse::bearer("at-only");
    let realm = TestRealm::start().await;
    let keycloak = Keycloak::builder(
        keycloak_client::KeycloakConfig::new()
            .with_realm(REALM, realm.server.uri())
            .with_client(CLIENT_ID, CLIENT_SECRET)
            .with_installation_root(tempfile::tempdir().unwrap().path()),
    )
    .token_source(Arc::new(StaticTokenSource::new(token)))
    .build()
    .unwrap();

    assert!(keycloak.client().logout(None, None, None, None).await.unwrap());

    let logout_hits = realm
        .server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == oidc_path("logout"))
        .count();
    assert_eq!(logout_hits, 0);
}

#[tokio::test]
async fn custom_host_header_is_sent() {
    let realm = TestRealm::start_with(|config| config.with_custom_host_header("sso.internal")).await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .and(header("host", "sso.internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("via-host", None)))
        .expect(1)
        .mount(&realm.server)
        .await;

    let token = realm
        .keycloak
        .client()
        .get_token_by_client_credentials(None)
        .await
        .unwrap();
    assert_eq!(token.access_token, "via-host");
}

#[tokio::test]
async fn userinfo_sends_access_token_form() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("userinfo")))
        .and(body_string_contains("access_token=at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sub": "5f1c",
            "preferred_username": "alice"
        })))
        .expect(1)
        .mount(&realm.server)
        .await;

    let userinfo = realm
        .keycloak
        .client()
        .get_userinfo(Some("at-1"))
        .await
        .unwrap();
    assert_eq!(userinfo["sub"], "5f1c");
}

#[tokio::test]
async fn has_role_reads_resource_access_from_token_source() {
    let access_token = jwt(json!({
        "sub": "5f1c",
        "exp": 4102444800u64,
        "resource_access": { "web": { "roles": ["editor"] } },
        "department": "sales"
    }));
    let realm = TestRealm::start().await;
    let keycloak = Keycloak::builder(
        keycloak_client::KeycloakConfig::new()
            .with_realm(REALM, realm.server.uri())
            .with_client(CLIENT_ID, CLIENT_SECRET)
            .with_installation_root(tempfile::tempdir().unwrap().path()),
    )
    .token_source(Arc::new(StaticTokenSource::new(TokenResponse::bearer(access_token))))
    .build()
    .unwrap();
    let client = keycloak.client();

    assert!(client.has_role("editor", None, None, None).await.unwrap());
    assert!(!client.has_role("admin", None, None, None).await.unwrap());
    assert_eq!(
        client.get_attribute("department", None).await.unwrap(),
        Some(json!("sales"))
    );
}

#[tokio::test]
async fn account_url_points_at_realm_account_console() {
    let realm = TestRealm::start().await;
    assert_eq!(
        realm.keycloak.client().url_user_account(),
        format!("{}/realms/{REALM}/account", realm.server.uri())
    );
}

struct Department;

#[async_trait]
impl ExternalAttributes for Department {
    async fn attributes(&self) -> KeycloakResult<HashMap<String, serde_json::Value>> {
        Ok(HashMap::from([("department".to_string(), json!("sales"))]))
    }
}

#[tokio::test]
async fn external_attributes_come_from_the_registered_provider() {
    let realm = TestRealm::start().await;
    let err = realm.keycloak.client().external_attributes().await.unwrap_err();
    assert!(matches!(err, KeycloakError::ExternalAttributesNotDefined));

    let keycloak = Keycloak::builder(
        keycloak_client::KeycloakConfig::new()
            .with_realm(REALM, realm.server.uri())
            .with_client(CLIENT_ID, CLIENT_SECRET)
            .with_installation_root(tempfile::tempdir().unwrap().path()),
    )
    .external_attributes(Arc::new(Department))
    .build()
    .unwrap();

    let attributes = keycloak.client().external_attributes().await.unwrap();
    assert_eq!(attributes["department"], json!("sales"));
}

fn keycloak_with_token(realm: &TestRealm, token: TokenResponse) -> Keycloak {
    Keycloak::builder(
        keycloak_client::KeycloakConfig::new()
            .with_realm(REALM, realm.server.uri())
            .with_client(CLIENT_ID, CLIENT_SECRET)
            .with_installation_root(tempfile::tempdir().unwrap().path()),
    )
    .token_source(Arc::new(StaticTokenSource::new(token)))
    .build()
    .unwrap()
}

fn exceptions_disabled(
    mut config: keycloak_client::KeycloakConfig,
) -> keycloak_client::KeycloakConfig {
    config.generate_request_exception = false;
    config
}

#[tokio::test]
async fn has_role_is_false_for_inactive_token_when_validation_enabled() {
    let realm = TestRealm::start_with(|mut config| {
        config.validate_token_when_call_has_role = true;
        config
    })
    .await;
    let access_token = jwt(json!({
        "sub": "5f1c",
        "resource_access": { "web": { "roles": ["editor"] } }
    }));

    Mock::given(method("POST"))
        .and(path(oidc_path("token/introspect")))
        .and(body_string_contains(format!("token={access_token}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": false })))
        .expect(1)
        .mount(&realm.server)
        .await;

    let has_role = realm
        .keycloak
        .client()
        .has_role("editor", Some(&access_token), None, None)
        .await
        .unwrap();
    assert!(!has_role);
}

#[tokio::test]
async fn has_role_checks_claims_once_introspection_reports_active() {
    let realm = TestRealm::start_with(|mut config| {
        config.validate_token_when_call_has_role = true;
        config
    })
    .await;
    let access_token = jwt(json!({
        "sub": "5f1c",
        "resource_access": { "web": { "roles": ["editor"] } }
    }));

    Mock::given(method("POST"))
        .and(path(oidc_path("token/introspect")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": true })))
        .expect(2)
        .mount(&realm.server)
        .await;

    let client = realm.keycloak.client();
    assert!(client.has_role("editor", Some(&access_token), None, None).await.unwrap());
    assert!(!client.has_role("admin", Some(&access_token), None, None).await.unwrap());
}

#[tokio::test]
async fn introspection_error_body_is_returned_when_exceptions_disabled() {
    let realm = TestRealm::start_with(exceptions_disabled).await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token/introspect")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "Invalid client credentials"
        })))
        .expect(1)
        .mount(&realm.server)
        .await;

    let introspection = realm
        .keycloak
        .client()
        .get_token_introspection(Some("opaque"), None, None)
        .await
        .unwrap();
    assert!(!introspection.active);
}

#[tokio::test]
async fn userinfo_error_body_is_returned_when_exceptions_disabled() {
    let realm = TestRealm::start_with(exceptions_disabled).await;

    Mock::given(method("POST"))
        .and(path(oidc_path("userinfo")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_token",
            "error_description": "Token verification failed"
        })))
        .expect(1)
        .mount(&realm.server)
        .await;

    let userinfo = realm
        .keycloak
        .client()
        .get_userinfo(Some("expired"))
        .await
        .unwrap();
    assert_eq!(userinfo["error"], "invalid_token");
}

#[tokio::test]
async fn userinfo_error_raises_by_default() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("userinfo")))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "error": "invalid_token" })))
        .mount(&realm.server)
        .await;

    let err = realm
        .keycloak
        .client()
        .get_userinfo(Some("expired"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}

#[tokio::test]
async fn rejected_logout_is_false_when_exceptions_disabled() {
    let realm = TestRealm::start_with(exceptions_disabled).await;

    Mock::given(method("POST"))
        .and(path(oidc_path("logout")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Invalid refresh token"
        })))
        .expect(1)
        .mount(&realm.server)
        .await;

    let logged_out = realm
        .keycloak
        .client()
        .logout(None, Some("stale"), None, None)
        .await
        .unwrap();
    assert!(!logged_out);
}

#[tokio::test]
async fn redirection_status_on_token_endpoint_is_parsed_as_success() {
    let realm = TestRealm::start().await;

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .respond_with(ResponseTemplate::new(300).set_body_json(token_body("at-300", None)))
        .expect(1)
        .mount(&realm.server)
        .await;

    let token = realm
        .keycloak
        .client()
        .get_token_by_client_credentials(None)
        .await
        .unwrap();
    assert_eq!(token.access_token, "at-300");
}

#[tokio::test]
async fn userinfo_issuer_uses_bearer_get() {
    let realm = TestRealm::start().await;
    let issuer_endpoint = format!("{}/issuer/userinfo", realm.server.uri());

    Mock::given(method("GET"))
        .and(path("/issuer/userinfo"))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "external-1" })))
        .expect(1)
        .mount(&realm.server)
        .await;

    Mock::given(method("GET"))
        .and(path(oidc_path("userinfo")))
        .and(header("authorization", "Bearer at-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sub": "5f1c" })))
        .expect(1)
        .mount(&realm.server)
        .await;

    let client = realm.keycloak.client();
    let external = client
        .get_userinfo_issuer(Some("at-1"), Some(&issuer_endpoint))
        .await
        .unwrap();
    assert_eq!(external["sub"], "external-1");

    let own = client.get_userinfo_issuer(Some("at-1"), None).await.unwrap();
    assert_eq!(own["sub"], "5f1c");
}

#[tokio::test]
async fn refresh_grant_falls_back_to_token_source() {
    let realm = TestRealm::start().await;
    let keycloak = keycloak_with_token(
        &realm,
        TokenResponse::bearer("at-src").with_refresh_token("rt-src"),
    );

    Mock::given(method("POST"))
        .and(path(oidc_path("token")))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=rt-src"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("at-new", Some("rt-new"))))
        .expect(1)
        .mount(&realm.server)
        .await;

    let token = keycloak
        .client()
        .get_token_by_refresh_token(None, None)
        .await
        .unwrap();
    assert_eq!(token.access_token, "at-new");
}

#[tokio::test]
async fn refresh_grant_without_refresh_token_in_source_is_invalid_token() {
    let realm = TestRealm::start().await;
    let keycloak = keycloak_with_token(&realm, TokenResponse::bearer("at-only"));

    let err = keycloak
        .client()
        .get_token_by_refresh_token(None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, KeycloakError::InvalidToken { .. }));
}

#[tokio::test]
async fn refresh_and_id_tokens_decode_from_token_source() {
    let realm = TestRealm::start().await;
    let mut token = TokenResponse::bearer("at-src")
        .with_refresh_token(jwt(json!({ "sub": "5f1c", "typ": "Refresh" })));
    token.id_token = Some(jwt(json!({ "sub": "5f1c", "email": "alice@example.com" })));
    let keycloak = keycloak_with_token(&realm, token);
    let client = keycloak.client();

    let refresh = client.decoded_refresh_token(None).await.unwrap();
    assert_eq!(refresh.sub.as_deref(), Some("5f1c"));
    assert_eq!(refresh.attribute("typ"), Some(json!("Refresh")));

    let id = client.decoded_id_token(None).await.unwrap();
    assert_eq!(id.email.as_deref(), Some("alice@example.com"));
}

#[tokio::test]
async fn id_token_missing_from_source_is_invalid_token() {
    let realm = TestRealm::start().await;
    let keycloak = keycloak_with_token(&realm, TokenResponse::bearer("at-only"));

    let err = keycloak.client().decoded_id_token(None).await.unwrap_err();
    assert!(matches!(err, KeycloakError::InvalidToken { ref reason } if reason.contains("id_token")));
}
