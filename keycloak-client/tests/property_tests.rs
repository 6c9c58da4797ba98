use keycloak_client::{ClientCredentials, Grant, Keycloak, KeycloakConfig};
use proptest::prelude::*;
use url::Url;

const AUTH_ENDPOINT: &str = "https://sso.example.com/realms/test/protocol/openid-connect/auth";

fn keycloak() -> Keycloak {
    let root = tempfile::tempdir().unwrap();
    Keycloak::new(
        KeycloakConfig::new()
            .with_installation_root(root.path())
            .with_realm("test", "https://sso.example.com")
            .with_client("web", "s3cr3t"),
    )
    .unwrap()
}

fn login_url(redirect_uri: &str, scope: &[&str]) -> String {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    runtime
        .block_on(keycloak().client().url_login_redirect(
            redirect_uri,
            None,
            None,
            Some(AUTH_ENDPOINT),
            scope,
        ))
        .unwrap()
}

proptest! {
    /// Whatever the redirect URI contains, it decodes back unchanged and the
    /// parameters keep their order.
    #[test]
    fn login_url_round_trips_redirect_uri(
        redirect_uri in "https://[a-z]{1,12}\\.example\\.com/[ -~]{0,40}",
        scope in proptest::collection::vec("[a-z_]{1,10}", 0..4),
    ) {
        let scope: Vec<&str> = scope.iter().map(String::as_str).collect();
        let url = Url::parse(&login_url(&redirect_uri, &scope)).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();

        prop_assert!(url.as_str().starts_with(AUTH_ENDPOINT));
        prop_assert_eq!(&pairs[0], &("response_type".to_string(), "code".to_string()));
        prop_assert_eq!(&pairs[1], &("client_id".to_string(), "web".to_string()));
        prop_assert_eq!(&pairs[2], &("redirect_uri".to_string(), redirect_uri.clone()));
        if scope.is_empty() {
            prop_assert_eq!(pairs.len(), 3);
        } else {
            prop_assert_eq!(&pairs[3], &("scope".to_string(), scope.join(" ")));
        }
    }

    /// The secret is only sent when there is one, and scope only when asked for.
    #[test]
    fn grant_form_omits_empty_fields(
        secret in "[a-zA-Z0-9]{0,8}",
        scope in proptest::collection::vec("[a-z]{1,6}", 0..3),
    ) {
        let creds = ClientCredentials::new("web", &secret);
        let scope: Vec<&str> = scope.iter().map(String::as_str).collect();
        let form = Grant::ClientCredentials.form(&creds, &scope);
        let keys: Vec<&str> = form.iter().map(|(k, _)| *k).collect();

        prop_assert_eq!(keys.contains(&"client_secret"), !secret.is_empty());
        prop_assert_eq!(keys.contains(&"scope"), !scope.is_empty());
        prop_assert!(keys.contains(&"grant_type"));
    }
}
