use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by Keycloak client operations
#[derive(Error, Debug)]
pub enum KeycloakError {
    #[error("Installation file not found: {}", path.display())]
    InstallationFileNotFound { path: PathBuf },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("User login not found: {login}")]
    UserLoginNotFound { login: String },

    #[error("Client not found: {client_id}")]
    ClientNotFound { client_id: String },

    #[error("No token source registered to supply the current user's token")]
    TokenSourceNotDefined,

    #[error("No external attributes provider registered")]
    ExternalAttributesNotDefined,

    #[error("HTTP error {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Transport error: {message}")]
    Transport { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("Invalid token: {reason}")]
    InvalidToken { reason: String },
}

impl KeycloakError {
    /// Errors produced by the library itself rather than by the remote server.
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            KeycloakError::InstallationFileNotFound { .. }
                | KeycloakError::Configuration { .. }
                | KeycloakError::UserLoginNotFound { .. }
                | KeycloakError::TokenSourceNotDefined
                | KeycloakError::ExternalAttributesNotDefined
        )
    }

    /// HTTP status of a passed-through error response, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            KeycloakError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for Keycloak operations
pub type KeycloakResult<T> = Result<T, KeycloakError>;

impl From<reqwest::Error> for KeycloakError {
    fn from(err: reqwest::Error) -> Self {
        KeycloakError::Transport {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for KeycloakError {
    fn from(err: serde_json::Error) -> Self {
        KeycloakError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for KeycloakError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        KeycloakError::InvalidToken {
            reason: err.to_string(),
        }
    }
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}")]
    MissingRequired { key: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Configuration file error: {message}")]
    FileError { message: String },
}

impl From<ConfigError> for KeycloakError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::MissingRequired { key } => KeycloakError::Configuration {
                message: format!("Missing required configuration: {key}"),
            },
            ConfigError::InvalidValue { key, message } => KeycloakError::Configuration {
                message: format!("Invalid value for {key}: {message}"),
            },
            ConfigError::FileError { message } => KeycloakError::Configuration { message },
        }
    }
}
