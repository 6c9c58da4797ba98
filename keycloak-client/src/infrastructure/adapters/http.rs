use reqwest::header::HOST;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::application::ports::KeycloakConfig;
use crate::domain::errors::{KeycloakError, KeycloakResult};

/// reqwest-backed transport shared by every Keycloak call
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    host_header: Option<String>,
    raise_request_errors: bool,
}

impl HttpTransport {
    pub fn new(config: &KeycloakConfig) -> KeycloakResult<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.http.get_timeout())
            .connect_timeout(config.http.get_connect_timeout())
            .user_agent(config.http.user_agent.clone());

        if let Some(proxy) = config.proxy_url() {
            let invalid = |e: &dyn std::fmt::Display| KeycloakError::Configuration {
                message: format!("Invalid proxy {proxy}: {e}"),
            };
            url::Url::parse(proxy).map_err(|e| invalid(&e))?;
            debug!(proxy, "Routing Keycloak traffic through proxy");
            builder = builder.proxy(reqwest::Proxy::all(proxy).map_err(|e| invalid(&e))?);
        }

        let client = builder.build().map_err(|e| KeycloakError::Configuration {
            message: format!("Failed to build HTTP client: {e}"),
        })?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &KeycloakConfig) -> Self {
        Self {
            client,
            host_header: config.host_header().map(str::to_string),
            raise_request_errors: config.generate_request_exception,
        }
    }

    pub fn raises_request_errors(&self) -> bool {
        self.raise_request_errors
    }

    /// Start a request, applying the custom `Host` header when configured.
    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.host_header {
            Some(host) => builder.header(HOST, host.as_str()),
            None => builder,
        }
    }

    pub async fn send(&self, builder: RequestBuilder) -> KeycloakResult<Response> {
        let response = builder.send().await?;
        debug!(status = %response.status(), url = %response.url(), "Keycloak responded");
        Ok(response)
    }

    /// Status in 200..=399 or a passed-through `Http` error.
    pub async fn expect_success(response: Response) -> KeycloakResult<Response> {
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            return Ok(response);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        Err(KeycloakError::Http {
            status: status.as_u16(),
            url,
            body,
        })
    }

    /// Parse a JSON body, always raising on error statuses.
    pub async fn json<T: DeserializeOwned>(response: Response) -> KeycloakResult<T> {
        let response = Self::expect_success(response).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Parse a JSON body from a token-style endpoint.
    ///
    /// Statuses in 200..=399 parse as success. With request errors disabled,
    /// an error response whose body parses as `T` is handed back instead of
    /// raised.
    pub async fn passthrough<T: DeserializeOwned>(
        &self,
        response: Response,
    ) -> KeycloakResult<T> {
        let status = response.status();
        if status.is_success() || status.is_redirection() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let url = response.url().to_string();
        let body = response.text().await.unwrap_or_default();
        if !self.raise_request_errors {
            if let Ok(value) = serde_json::from_str::<T>(&body) {
                warn!(status = status.as_u16(), url, "Returning Keycloak error response to caller");
                return Ok(value);
            }
        }

        Err(KeycloakError::Http {
            status: status.as_u16(),
            url,
            body,
        })
    }
}
