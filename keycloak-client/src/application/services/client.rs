use std::collections::HashMap;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use tracing::{debug, instrument, warn};

use crate::domain::entities::*;
use crate::domain::errors::{KeycloakError, KeycloakResult};
use crate::infrastructure::adapters::http::HttpTransport;
use crate::infrastructure::adapters::keycloak::KeycloakContext;

fn given(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// OpenID Connect operations against the realm's token, authorization,
/// introspection, userinfo and end-session endpoints
#[derive(Clone)]
pub struct KeycloakClient {
    context: Arc<KeycloakContext>,
}

impl KeycloakClient {
    pub fn new(context: Arc<KeycloakContext>) -> Self {
        Self { context }
    }

    pub fn realm(&self) -> &ResolvedRealm {
        self.context.realm()
    }

    pub fn client_id(&self) -> &str {
        &self.context.realm().client_id
    }

    pub async fn openid_configuration(&self) -> KeycloakResult<&OpenIdConfiguration> {
        self.context.openid_configuration().await
    }

    async fn request_token(
        &self,
        token_endpoint: Option<&str>,
        grant: Grant,
        credentials: Option<&ClientCredentials>,
        scope: &[&str],
    ) -> KeycloakResult<TokenResponse> {
        let endpoint = match given(token_endpoint) {
            Some(endpoint) => endpoint.to_string(),
            None => self.openid_configuration().await?.token_endpoint()?.to_string(),
        };
        let credentials = self.context.credentials(credentials);
        let form = grant.form(&credentials, scope);

        debug!(grant_type = grant.grant_type(), %endpoint, "Requesting token");
        let transport = self.context.transport();
        let response = transport
            .send(transport.request(Method::POST, &endpoint).form(&form))
            .await?;
        transport.passthrough(response).await
    }

    /// Resource owner password grant
    #[instrument(skip(self, password, credentials))]
    pub async fn get_token(
        &self,
        username: &str,
        password: &str,
        credentials: Option<&ClientCredentials>,
        scope: &[&str],
    ) -> KeycloakResult<TokenResponse> {
        let grant = Grant::Password {
            username: username.to_string(),
            password: password.to_string(),
        };
        self.request_token(None, grant, credentials, scope).await
    }

    /// Authorization code grant
    #[instrument(skip(self, code, credentials))]
    pub async fn get_token_by_code(
        &self,
        code: &str,
        redirect_uri: &str,
        credentials: Option<&ClientCredentials>,
        scope: &[&str],
    ) -> KeycloakResult<TokenResponse> {
        let grant = Grant::AuthorizationCode {
            code: code.to_string(),
            redirect_uri: redirect_uri.to_string(),
        };
        self.request_token(None, grant, credentials, scope).await
    }

    /// Exchange a token issued by an external identity provider for one of
    /// this realm. `token_endpoint` overrides the discovered endpoint.
    #[instrument(skip(self, issuer_token, credentials))]
    pub async fn get_token_by_exchange(
        &self,
        issuer: &str,
        issuer_token: &str,
        credentials: Option<&ClientCredentials>,
        token_endpoint: Option<&str>,
    ) -> KeycloakResult<TokenResponse> {
        let grant = Grant::TokenExchange {
            issuer: issuer.to_string(),
            subject_token: issuer_token.to_string(),
        };
        self.request_token(token_endpoint, grant, credentials, &[]).await
    }

    /// Refresh grant. Without an explicit refresh token the current user's is used.
    #[instrument(skip_all)]
    pub async fn get_token_by_refresh_token(
        &self,
        refresh_token: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<TokenResponse> {
        let refresh_token = match given(refresh_token) {
            Some(token) => token.to_string(),
            None => self.current_refresh_token().await?,
        };
        let grant = Grant::RefreshToken { refresh_token };
        self.request_token(None, grant, credentials, &[]).await
    }

    /// Client credentials grant (service account token)
    #[instrument(skip_all)]
    pub async fn get_token_by_client_credentials(
        &self,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<TokenResponse> {
        self.request_token(None, Grant::ClientCredentials, credentials, &[])
            .await
    }

    /// Introspect a token, authenticating with HTTP Basic client credentials.
    #[instrument(skip_all)]
    pub async fn get_token_introspection(
        &self,
        token: Option<&str>,
        credentials: Option<&ClientCredentials>,
        introspection_endpoint: Option<&str>,
    ) -> KeycloakResult<TokenIntrospection> {
        let token = self.context.access_token(token).await?;
        let endpoint = match given(introspection_endpoint) {
            Some(endpoint) => endpoint.to_string(),
            None => self
                .openid_configuration()
                .await?
                .introspection_endpoint()?
                .to_string(),
        };
        let credentials = self.context.credentials(credentials);
        let basic = STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));

        let transport = self.context.transport();
        let response = transport
            .send(
                transport
                    .request(Method::POST, &endpoint)
                    .header(AUTHORIZATION, format!("Basic {basic}"))
                    .form(&[("token", token.as_str())]),
            )
            .await?;
        transport.passthrough(response).await
    }

    /// Login page URL: the authorization endpoint with `response_type`,
    /// `client_id`, `redirect_uri` and an optional `scope` query.
    pub async fn url_login_redirect(
        &self,
        redirect_uri: &str,
        response_type: Option<&str>,
        client_id: Option<&str>,
        authorization_endpoint: Option<&str>,
        scope: &[&str],
    ) -> KeycloakResult<String> {
        let endpoint = match given(authorization_endpoint) {
            Some(endpoint) => endpoint.to_string(),
            None => self
                .openid_configuration()
                .await?
                .authorization_endpoint()?
                .to_string(),
        };
        let client_id = given(client_id).unwrap_or_else(|| self.client_id());

        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("response_type", given(response_type).unwrap_or("code"))
            .append_pair("client_id", client_id)
            .append_pair("redirect_uri", redirect_uri);
        if !scope.is_empty() {
            query.append_pair("scope", &scope.join(" "));
        }

        Ok(format!("{}?{}", endpoint, query.finish()))
    }

    /// End the session behind a refresh token.
    ///
    /// Returns `true` without contacting the server when there is no refresh
    /// token to revoke.
    #[instrument(skip(self, refresh_token, credentials))]
    pub async fn logout(
        &self,
        redirect_uri: Option<&str>,
        refresh_token: Option<&str>,
        credentials: Option<&ClientCredentials>,
        end_session_endpoint: Option<&str>,
    ) -> KeycloakResult<bool> {
        let refresh_token = match given(refresh_token) {
            Some(token) => Some(token.to_string()),
            None => self.context.current_token().await?.refresh_token,
        };
        let Some(refresh_token) = refresh_token.filter(|t| !t.is_empty()) else {
            return Ok(true);
        };

        let endpoint = match given(end_session_endpoint) {
            Some(endpoint) => endpoint.to_string(),
            None => self
                .openid_configuration()
                .await?
                .end_session_endpoint()?
                .to_string(),
        };
        let url = match given(redirect_uri) {
            Some(redirect_uri) => {
                let query = url::form_urlencoded::Serializer::new(String::new())
                    .append_pair("redirect_uri", redirect_uri)
                    .finish();
                format!("{endpoint}?{query}")
            }
            None => endpoint,
        };

        let credentials = self.context.credentials(credentials);
        let mut form = vec![("client_id", credentials.client_id.as_str())];
        if !credentials.client_secret.is_empty() {
            form.push(("client_secret", credentials.client_secret.as_str()));
        }
        form.push(("refresh_token", refresh_token.as_str()));

        let transport = self.context.transport();
        let response = transport
            .send(transport.request(Method::POST, &url).form(&form))
            .await?;

        match HttpTransport::expect_success(response).await {
            Ok(_) => Ok(true),
            Err(err) if !transport.raises_request_errors() => {
                warn!(error = %err, "Logout rejected by Keycloak");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Userinfo of the token's subject (token sent as a form parameter)
    #[instrument(skip_all)]
    pub async fn get_userinfo(
        &self,
        access_token: Option<&str>,
    ) -> KeycloakResult<serde_json::Value> {
        let access_token = self.context.access_token(access_token).await?;
        let endpoint = self
            .openid_configuration()
            .await?
            .userinfo_endpoint()?
            .to_string();

        let transport = self.context.transport();
        let response = transport
            .send(
                transport
                    .request(Method::POST, &endpoint)
                    .form(&[("access_token", access_token.as_str())]),
            )
            .await?;
        transport.passthrough(response).await
    }

    /// Userinfo from an arbitrary issuer's endpoint, using bearer authentication
    #[instrument(skip(self, access_token))]
    pub async fn get_userinfo_issuer(
        &self,
        access_token: Option<&str>,
        userinfo_endpoint: Option<&str>,
    ) -> KeycloakResult<serde_json::Value> {
        let access_token = self.context.access_token(access_token).await?;
        let endpoint = match given(userinfo_endpoint) {
            Some(endpoint) => endpoint.to_string(),
            None => self
                .openid_configuration()
                .await?
                .userinfo_endpoint()?
                .to_string(),
        };

        let transport = self.context.transport();
        let response = transport
            .send(
                transport
                    .request(Method::GET, &endpoint)
                    .bearer_auth(&access_token),
            )
            .await?;
        transport.passthrough(response).await
    }

    /// Account console URL of the realm
    pub fn url_user_account(&self) -> String {
        self.context.realm().account_url()
    }

    /// Whether the token is active according to introspection.
    ///
    /// Server and transport failures count as "not signed in"; local
    /// configuration failures are returned.
    pub async fn user_signed_in(
        &self,
        access_token: Option<&str>,
        credentials: Option<&ClientCredentials>,
        introspection_endpoint: Option<&str>,
    ) -> KeycloakResult<bool> {
        match self
            .get_token_introspection(access_token, credentials, introspection_endpoint)
            .await
        {
            Ok(introspection) => Ok(introspection.active),
            Err(err) if err.is_local() => Err(err),
            Err(err) => {
                debug!(error = %err, "Token introspection failed, treating user as signed out");
                Ok(false)
            }
        }
    }

    /// Whether the token grants `role` on the client.
    ///
    /// The token is only introspected first when
    /// `validate_token_when_call_has_role` is enabled.
    pub async fn has_role(
        &self,
        role: &str,
        access_token: Option<&str>,
        credentials: Option<&ClientCredentials>,
        introspection_endpoint: Option<&str>,
    ) -> KeycloakResult<bool> {
        let access_token = self.context.access_token(access_token).await?;

        if self.context.validate_token_when_call_has_role()
            && !self
                .user_signed_in(Some(&access_token), credentials, introspection_endpoint)
                .await?
        {
            return Ok(false);
        }

        let client_id = self.context.credentials(credentials).client_id;
        let claims = TokenClaims::decode_unverified(&access_token)?;
        Ok(claims.has_client_role(&client_id, role))
    }

    /// A single claim of the access token
    pub async fn get_attribute(
        &self,
        attribute_name: &str,
        access_token: Option<&str>,
    ) -> KeycloakResult<Option<serde_json::Value>> {
        Ok(self
            .decoded_access_token(access_token)
            .await?
            .attribute(attribute_name))
    }

    /// Current user's token from the registered token source
    pub async fn token(&self) -> KeycloakResult<TokenResponse> {
        self.context.current_token().await
    }

    /// Attributes from the registered external attributes provider
    pub async fn external_attributes(&self) -> KeycloakResult<HashMap<String, serde_json::Value>> {
        self.context.external_attributes().await
    }

    pub async fn decoded_access_token(
        &self,
        access_token: Option<&str>,
    ) -> KeycloakResult<TokenClaims> {
        let access_token = self.context.access_token(access_token).await?;
        TokenClaims::decode_unverified(&access_token)
    }

    pub async fn decoded_refresh_token(
        &self,
        refresh_token: Option<&str>,
    ) -> KeycloakResult<TokenClaims> {
        let refresh_token = match given(refresh_token) {
            Some(token) => token.to_string(),
            None => self.current_refresh_token().await?,
        };
        TokenClaims::decode_unverified(&refresh_token)
    }

    pub async fn decoded_id_token(&self, id_token: Option<&str>) -> KeycloakResult<TokenClaims> {
        let id_token = match given(id_token) {
            Some(token) => token.to_string(),
            None => self
                .context
                .current_token()
                .await?
                .id_token
                .ok_or_else(|| KeycloakError::InvalidToken {
                    reason: "Current token carries no id_token".to_string(),
                })?,
        };
        TokenClaims::decode_unverified(&id_token)
    }

    async fn current_refresh_token(&self) -> KeycloakResult<String> {
        self.context
            .current_token()
            .await?
            .refresh_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| KeycloakError::InvalidToken {
                reason: "Current token carries no refresh_token".to_string(),
            })
    }
}
