use serde::{Deserialize, Serialize};

/// Client credentials block of an installation descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationCredentials {
    #[serde(default)]
    pub secret: Option<String>,
}

/// Installation descriptor (`keycloak.json`) exported from the Keycloak admin console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Installation {
    pub realm: String,
    pub auth_server_url: String,
    pub resource: String,
    #[serde(default)]
    pub credentials: Option<InstallationCredentials>,
    #[serde(default)]
    pub realm_public_key: Option<String>,
    #[serde(default)]
    pub ssl_required: Option<String>,
    #[serde(default)]
    pub public_client: Option<bool>,
    #[serde(default)]
    pub confidential_port: Option<u16>,
}

impl Installation {
    pub fn secret(&self) -> Option<&str> {
        self.credentials
            .as_ref()
            .and_then(|c| c.secret.as_deref())
    }
}

/// Realm connection settings after installation file / explicit settings resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRealm {
    pub realm: String,
    pub auth_server_url: String,
    pub client_id: String,
    pub secret: String,
    pub public_key: Option<String>,
}

impl ResolvedRealm {
    fn base_url(&self) -> &str {
        self.auth_server_url.trim_end_matches('/')
    }

    pub fn openid_configuration_url(&self) -> String {
        format!(
            "{}/realms/{}/.well-known/openid-configuration",
            self.base_url(),
            self.realm
        )
    }

    pub fn admin_url(&self) -> String {
        format!("{}/admin/realms/{}/", self.base_url(), self.realm)
    }

    pub fn account_url(&self) -> String {
        format!("{}/realms/{}/account", self.base_url(), self.realm)
    }
}

impl From<Installation> for ResolvedRealm {
    fn from(installation: Installation) -> Self {
        let secret = installation.secret().unwrap_or_default().to_string();
        Self {
            realm: installation.realm,
            auth_server_url: installation.auth_server_url,
            client_id: installation.resource,
            secret,
            public_key: installation.realm_public_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_exported_descriptor() {
        let json = r#"{
            "realm": "realm_test",
            "auth-server-url": "https://test.org/auth/",
            "ssl-required": "external",
            "resource": "web",
            "credentials": { "secret": "s3cr3t" },
            "realm-public-key": "MIIBIjAN",
            "confidential-port": 0,
            "policy-enforcer": {}
        }"#;

        let installation: Installation = serde_json::from_str(json).unwrap();
        assert_eq!(installation.secret(), Some("s3cr3t"));

        let realm = ResolvedRealm::from(installation);
        assert_eq!(realm.client_id, "web");
        assert_eq!(realm.public_key.as_deref(), Some("MIIBIjAN"));
        assert_eq!(
            realm.openid_configuration_url(),
            "https://test.org/auth/realms/realm_test/.well-known/openid-configuration"
        );
        assert_eq!(realm.admin_url(), "https://test.org/auth/admin/realms/realm_test/");
        assert_eq!(realm.account_url(), "https://test.org/auth/realms/realm_test/account");
    }

    #[test]
    fn public_client_has_empty_secret() {
        let json = r#"{
            "realm": "demo",
            "auth-server-url": "http://localhost:8080",
            "resource": "spa",
            "public-client": true
        }"#;

        let realm = ResolvedRealm::from(serde_json::from_str::<Installation>(json).unwrap());
        assert_eq!(realm.secret, "");
    }
}
