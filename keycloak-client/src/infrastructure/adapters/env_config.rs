use crate::application::ports::{AppConfig, ConfigurationPort, KeycloakConfig, LoggingConfig};
use crate::domain::errors::KeycloakResult;

/// Environment-based configuration adapter
pub struct EnvConfigurationAdapter {
    config: AppConfig,
}

impl EnvConfigurationAdapter {
    pub fn new() -> KeycloakResult<Self> {
        let config = AppConfig::from_env()?;
        Ok(Self { config })
    }

    pub fn from_config(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }
}

impl ConfigurationPort for EnvConfigurationAdapter {
    fn get_keycloak_config(&self) -> &KeycloakConfig {
        &self.config.keycloak
    }

    fn get_logging_config(&self) -> &LoggingConfig {
        &self.config.logging
    }

    fn validate(&self) -> KeycloakResult<()> {
        self.config.validate()
    }
}
