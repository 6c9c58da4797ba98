use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Method;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};

use crate::application::ports::{ExternalAttributes, KeycloakConfig, TokenSource};
use crate::application::services::{AdminClient, InternalClient, KeycloakClient};
use crate::domain::entities::{ClientCredentials, OpenIdConfiguration, ResolvedRealm, TokenResponse};
use crate::domain::errors::{KeycloakError, KeycloakResult};
use crate::infrastructure::adapters::http::HttpTransport;
use crate::infrastructure::adapters::installation::resolve_realm;

/// Resolved connection state shared by the client, admin and internal services
pub struct KeycloakContext {
    realm: ResolvedRealm,
    transport: HttpTransport,
    openid: OnceCell<OpenIdConfiguration>,
    validate_token_when_call_has_role: bool,
    token_source: Option<Arc<dyn TokenSource>>,
    external_attributes: Option<Arc<dyn ExternalAttributes>>,
}

impl KeycloakContext {
    pub fn realm(&self) -> &ResolvedRealm {
        &self.realm
    }

    pub fn transport(&self) -> &HttpTransport {
        &self.transport
    }

    pub fn validate_token_when_call_has_role(&self) -> bool {
        self.validate_token_when_call_has_role
    }

    /// Realm client credentials, with per-call overrides applied field by field.
    pub fn credentials(&self, overrides: Option<&ClientCredentials>) -> ClientCredentials {
        let defaults = ClientCredentials::new(&self.realm.client_id, &self.realm.secret);
        match overrides {
            Some(creds) => creds.or(&defaults),
            None => defaults,
        }
    }

    /// OpenID provider metadata, fetched on first use.
    pub async fn openid_configuration(&self) -> KeycloakResult<&OpenIdConfiguration> {
        self.openid
            .get_or_try_init(|| self.fetch_openid_configuration())
            .await
    }

    #[instrument(skip(self), fields(realm = %self.realm.realm))]
    async fn fetch_openid_configuration(&self) -> KeycloakResult<OpenIdConfiguration> {
        let url = self.realm.openid_configuration_url();
        debug!(%url, "Fetching OpenID configuration");

        let response = self
            .transport
            .send(self.transport.request(Method::GET, &url))
            .await?;
        HttpTransport::json(response).await
    }

    /// Token of the current user from the registered token source.
    pub async fn current_token(&self) -> KeycloakResult<TokenResponse> {
        match &self.token_source {
            Some(source) => source.current_token().await,
            None => Err(KeycloakError::TokenSourceNotDefined),
        }
    }

    /// The given access token, or the current user's when none is given.
    pub async fn access_token(&self, explicit: Option<&str>) -> KeycloakResult<String> {
        match explicit.filter(|t| !t.is_empty()) {
            Some(token) => Ok(token.to_string()),
            None => Ok(self.current_token().await?.access_token),
        }
    }

    pub async fn external_attributes(&self) -> KeycloakResult<HashMap<String, serde_json::Value>> {
        match &self.external_attributes {
            Some(provider) => provider.attributes().await,
            None => Err(KeycloakError::ExternalAttributesNotDefined),
        }
    }
}

/// Builder for [`Keycloak`]
pub struct KeycloakBuilder {
    config: KeycloakConfig,
    http_client: Option<reqwest::Client>,
    token_source: Option<Arc<dyn TokenSource>>,
    external_attributes: Option<Arc<dyn ExternalAttributes>>,
}

impl KeycloakBuilder {
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.token_source = Some(source);
        self
    }

    pub fn external_attributes(mut self, provider: Arc<dyn ExternalAttributes>) -> Self {
        self.external_attributes = Some(provider);
        self
    }

    pub fn build(self) -> KeycloakResult<Keycloak> {
        self.config.validate()?;
        let realm = resolve_realm(&self.config)?;

        let transport = match self.http_client {
            Some(client) => HttpTransport::with_client(client, &self.config),
            None => HttpTransport::new(&self.config)?,
        };

        debug!(
            realm = %realm.realm,
            auth_server_url = %realm.auth_server_url,
            client_id = %realm.client_id,
            "Keycloak realm resolved"
        );

        Ok(Keycloak {
            context: Arc::new(KeycloakContext {
                realm,
                transport,
                openid: OnceCell::new(),
                validate_token_when_call_has_role: self.config.validate_token_when_call_has_role,
                token_source: self.token_source,
                external_attributes: self.external_attributes,
            }),
        })
    }
}

/// Entry point: a resolved realm connection handing out the client, admin and
/// internal services.
#[derive(Clone)]
pub struct Keycloak {
    context: Arc<KeycloakContext>,
}

impl Keycloak {
    pub fn builder(config: KeycloakConfig) -> KeycloakBuilder {
        KeycloakBuilder {
            config,
            http_client: None,
            token_source: None,
            external_attributes: None,
        }
    }

    pub fn new(config: KeycloakConfig) -> KeycloakResult<Self> {
        Self::builder(config).build()
    }

    pub fn context(&self) -> &Arc<KeycloakContext> {
        &self.context
    }

    pub fn realm(&self) -> &ResolvedRealm {
        self.context.realm()
    }

    pub fn client(&self) -> KeycloakClient {
        KeycloakClient::new(self.context.clone())
    }

    pub fn admin(&self) -> AdminClient {
        AdminClient::new(self.context.clone())
    }

    pub fn internal(&self) -> InternalClient {
        InternalClient::new(self.context.clone())
    }
}
