use std::fs;
use std::path::Path;

use tracing::debug;

use crate::application::ports::KeycloakConfig;
use crate::domain::entities::{Installation, ResolvedRealm};
use crate::domain::errors::{ConfigError, KeycloakError, KeycloakResult};

/// Read and parse an installation descriptor
pub fn load_installation(path: &Path) -> KeycloakResult<Installation> {
    let raw = fs::read_to_string(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => KeycloakError::InstallationFileNotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::FileError {
            message: format!("Failed to read {}: {}", path.display(), e),
        }
        .into(),
    })?;

    serde_json::from_str(&raw).map_err(|e| {
        ConfigError::FileError {
            message: format!("Invalid installation file {}: {}", path.display(), e),
        }
        .into()
    })
}

/// Resolve realm connection settings.
///
/// The installation file is authoritative when it exists. Without it the
/// explicit realm name and server URL are required.
pub fn resolve_realm(config: &KeycloakConfig) -> KeycloakResult<ResolvedRealm> {
    let file = config.installation_file();

    if file.is_file() {
        debug!(file = %file.display(), "Loading Keycloak installation file");
        return Ok(load_installation(&file)?.into());
    }

    match (config.realm_name(), config.server_url()) {
        (Some(realm), Some(auth_server_url)) => {
            debug!(realm, auth_server_url, "Using explicit Keycloak realm settings");
            Ok(ResolvedRealm {
                realm: realm.to_string(),
                auth_server_url: auth_server_url.to_string(),
                client_id: config.resource.clone().unwrap_or_default(),
                secret: config.secret.clone().unwrap_or_default(),
                public_key: None,
            })
        }
        (realm, auth_server_url) => {
            let missing: Vec<&str> = [
                ("KEYCLOAK_REALM", realm.is_none()),
                ("KEYCLOAK_AUTH_SERVER_URL", auth_server_url.is_none()),
            ]
            .into_iter()
            .filter_map(|(key, absent)| absent.then_some(key))
            .collect();
            Err(ConfigError::MissingRequired {
                key: format!(
                    "{} ({} and realm settings not found)",
                    missing.join(", "),
                    file.display()
                ),
            }
            .into())
        }
    }
}
