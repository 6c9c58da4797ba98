use crate::domain::errors::{ConfigError, KeycloakError, KeycloakResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current default location of the installation descriptor
pub const KEYCLOAK_JSON_FILE: &str = "config/keycloak.json";

/// Legacy default location of the installation descriptor
pub const OLD_KEYCLOAK_JSON_FILE: &str = "keycloak.json";

/// Configuration port for accessing client configuration
pub trait ConfigurationPort: Send + Sync {
    /// Get Keycloak connection configuration
    fn get_keycloak_config(&self) -> &KeycloakConfig;

    /// Get logging configuration
    fn get_logging_config(&self) -> &LoggingConfig;

    /// Validate all configuration
    fn validate(&self) -> KeycloakResult<()>;
}

/// Keycloak connection configuration
///
/// The realm settings (`realm`, `auth_server_url`, `resource`, `secret`) are
/// only consulted when no installation file is found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeycloakConfig {
    pub realm: Option<String>,
    pub auth_server_url: Option<String>,
    pub resource: Option<String>,
    pub secret: Option<String>,
    installation_file: Option<PathBuf>,
    pub installation_root: PathBuf,
    pub proxy: Option<String>,
    pub custom_host_header: Option<String>,
    pub generate_request_exception: bool,
    pub validate_token_when_call_has_role: bool,
    pub http: HttpConfig,
}

impl Default for KeycloakConfig {
    fn default() -> Self {
        Self {
            realm: None,
            auth_server_url: None,
            resource: None,
            secret: None,
            installation_file: None,
            installation_root: PathBuf::new(),
            proxy: None,
            custom_host_header: None,
            generate_request_exception: true,
            validate_token_when_call_has_role: false,
            http: HttpConfig::default(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl KeycloakConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Explicit realm settings, used when there is no installation file.
    pub fn with_realm(
        mut self,
        realm: impl Into<String>,
        auth_server_url: impl Into<String>,
    ) -> Self {
        self.realm = Some(realm.into());
        self.auth_server_url = Some(auth_server_url.into());
        self
    }

    pub fn with_client(mut self, resource: impl Into<String>, secret: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self.secret = Some(secret.into());
        self
    }

    pub fn with_installation_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.installation_root = root.into();
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_custom_host_header(mut self, host: impl Into<String>) -> Self {
        self.custom_host_header = Some(host.into());
        self
    }

    /// Installation descriptor path.
    ///
    /// An explicitly set file wins; otherwise `config/keycloak.json` when it
    /// exists, falling back to the legacy `keycloak.json`.
    pub fn installation_file(&self) -> PathBuf {
        if let Some(file) = &self.installation_file {
            return file.clone();
        }

        let current = self.installation_root.join(KEYCLOAK_JSON_FILE);
        if current.exists() {
            current
        } else {
            self.installation_root.join(OLD_KEYCLOAK_JSON_FILE)
        }
    }

    /// Point at a specific installation file. Fails when it does not exist.
    pub fn set_installation_file(&mut self, path: impl AsRef<Path>) -> KeycloakResult<()> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(KeycloakError::InstallationFileNotFound {
                path: path.to_path_buf(),
            });
        }
        self.installation_file = Some(path.to_path_buf());
        Ok(())
    }

    pub fn has_explicit_installation_file(&self) -> bool {
        self.installation_file.is_some()
    }

    pub fn realm_name(&self) -> Option<&str> {
        non_empty(&self.realm)
    }

    pub fn server_url(&self) -> Option<&str> {
        non_empty(&self.auth_server_url)
    }

    pub fn proxy_url(&self) -> Option<&str> {
        non_empty(&self.proxy)
    }

    pub fn host_header(&self) -> Option<&str> {
        non_empty(&self.custom_host_header)
    }

    pub fn validate(&self) -> KeycloakResult<()> {
        if let Some(url) = self.server_url() {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::InvalidValue {
                    key: "KEYCLOAK_AUTH_SERVER_URL".to_string(),
                    message: "Must start with http:// or https://".to_string(),
                }
                .into());
            }
        }

        if let Some(proxy) = self.proxy_url() {
            if url::Url::parse(proxy).is_err() {
                return Err(ConfigError::InvalidValue {
                    key: "KEYCLOAK_PROXY".to_string(),
                    message: format!("Not a valid URL: {proxy}"),
                }
                .into());
            }
        }

        self.http.validate()
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
    pub connect_timeout_seconds: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            user_agent: concat!("keycloak-client/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> KeycloakResult<()> {
        if self.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timeout_seconds".to_string(),
                message: "Must be greater than 0".to_string(),
            }
            .into());
        }

        if self.connect_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                key: "connect_timeout_seconds".to_string(),
                message: "Must be greater than 0".to_string(),
            }
            .into());
        }

        Ok(())
    }

    pub fn get_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn get_connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
        }
    }
}

/// Log level enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Log format enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Complete configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub keycloak: KeycloakConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> KeycloakResult<()> {
        self.keycloak.validate()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> KeycloakResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> KeycloakResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|v| v.trim().to_lowercase().parse().ok())
                .unwrap_or(default)
        };
        let seconds = |key: &str, default: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let http_defaults = HttpConfig::default();
        let http = HttpConfig {
            timeout_seconds: seconds("HTTP_TIMEOUT_SECONDS", http_defaults.timeout_seconds),
            connect_timeout_seconds: seconds(
                "HTTP_CONNECT_TIMEOUT_SECONDS",
                http_defaults.connect_timeout_seconds,
            ),
            user_agent: lookup("HTTP_USER_AGENT").unwrap_or(http_defaults.user_agent),
        };

        let mut keycloak = KeycloakConfig {
            realm: lookup("KEYCLOAK_REALM"),
            auth_server_url: lookup("KEYCLOAK_AUTH_SERVER_URL"),
            resource: lookup("KEYCLOAK_RESOURCE"),
            secret: lookup("KEYCLOAK_SECRET"),
            proxy: lookup("KEYCLOAK_PROXY"),
            custom_host_header: lookup("KEYCLOAK_CUSTOM_HOST_HEADER"),
            generate_request_exception: flag("KEYCLOAK_GENERATE_REQUEST_EXCEPTION", true),
            validate_token_when_call_has_role: flag(
                "KEYCLOAK_VALIDATE_TOKEN_WHEN_CALL_HAS_ROLE",
                false,
            ),
            http,
            ..KeycloakConfig::default()
        };

        if let Some(file) = lookup("KEYCLOAK_INSTALLATION_FILE").filter(|f| !f.is_empty()) {
            keycloak.set_installation_file(file)?;
        }

        let logging = LoggingConfig {
            level: lookup("LOG_LEVEL")
                .and_then(|v| v.parse().ok())
                .unwrap_or(LogLevel::Info),
            format: lookup("LOG_FORMAT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(LogFormat::Compact),
        };

        let config = AppConfig { keycloak, logging };
        config.validate()?;
        Ok(config)
    }
}

/// String parsing implementations
impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {s}")),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {s}")),
        }
    }
}
