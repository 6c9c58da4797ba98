use std::sync::Arc;

use reqwest::header::LOCATION;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::domain::entities::*;
use crate::domain::errors::{KeycloakError, KeycloakResult};
use crate::infrastructure::adapters::http::HttpTransport;
use crate::infrastructure::adapters::keycloak::KeycloakContext;

/// Query parameters appended to an admin resource path
pub type Query<'a> = &'a [(&'a str, &'a str)];

/// Outcome of an admin call that does not return a body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminResponse {
    pub status: u16,
    pub location: Option<String>,
}

impl AdminResponse {
    /// Id of a created resource, taken from the `Location` header.
    pub fn created_id(&self) -> Option<&str> {
        self.location
            .as_deref()
            .and_then(|location| location.trim_end_matches('/').rsplit('/').next())
            .filter(|id| !id.is_empty())
    }
}

/// Admin REST API of the realm (`{server}/admin/realms/{realm}/…`)
///
/// Calls need a token whose user or service account holds the
/// `realm-management` client roles. Bind one with [`AdminClient::with_access_token`];
/// otherwise the registered token source supplies it.
#[derive(Clone)]
pub struct AdminClient {
    context: Arc<KeycloakContext>,
    access_token: Option<String>,
}

impl AdminClient {
    pub fn new(context: Arc<KeycloakContext>) -> Self {
        Self {
            context,
            access_token: None,
        }
    }

    pub fn with_access_token(&self, access_token: impl Into<String>) -> Self {
        Self {
            context: self.context.clone(),
            access_token: Some(access_token.into()),
        }
    }

    pub fn base_url(&self) -> String {
        self.context.realm().admin_url()
    }

    pub fn full_url(&self, service: &str, query: Option<Query<'_>>) -> String {
        let mut url = format!("{}{}", self.base_url(), service);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            let encoded = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(query)
                .finish();
            url.push('?');
            url.push_str(&encoded);
        }
        url
    }

    async fn generic_request(
        &self,
        method: Method,
        service: &str,
        query: Option<Query<'_>>,
        body: Option<serde_json::Value>,
    ) -> KeycloakResult<reqwest::Response> {
        let access_token = self.context.access_token(self.access_token.as_deref()).await?;
        let url = self.full_url(service, query);
        debug!(%method, %url, "Admin request");

        let transport = self.context.transport();
        let mut request = transport.request(method, &url).bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = transport.send(request).await?;
        HttpTransport::expect_success(response).await
    }

    async fn write(
        &self,
        method: Method,
        service: &str,
        query: Option<Query<'_>>,
        body: Option<serde_json::Value>,
    ) -> KeycloakResult<AdminResponse> {
        let response = self.generic_request(method, service, query, body).await?;
        Ok(AdminResponse {
            status: response.status().as_u16(),
            location: response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }

    pub async fn generic_get<T: DeserializeOwned>(
        &self,
        service: &str,
        query: Option<Query<'_>>,
    ) -> KeycloakResult<T> {
        let response = self.generic_request(Method::GET, service, query, None).await?;
        HttpTransport::json(response).await
    }

    pub async fn generic_post<B: Serialize + ?Sized>(
        &self,
        service: &str,
        query: Option<Query<'_>>,
        body: Option<&B>,
    ) -> KeycloakResult<AdminResponse> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.write(Method::POST, service, query, body).await
    }

    pub async fn generic_put<B: Serialize + ?Sized>(
        &self,
        service: &str,
        query: Option<Query<'_>>,
        body: Option<&B>,
    ) -> KeycloakResult<AdminResponse> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.write(Method::PUT, service, query, body).await
    }

    pub async fn generic_delete<B: Serialize + ?Sized>(
        &self,
        service: &str,
        query: Option<Query<'_>>,
        body: Option<&B>,
    ) -> KeycloakResult<AdminResponse> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.write(Method::DELETE, service, query, body).await
    }

    // Users

    pub async fn get_users(
        &self,
        query: Option<Query<'_>>,
    ) -> KeycloakResult<Vec<UserRepresentation>> {
        self.generic_get("users/", query).await
    }

    #[instrument(skip(self, user), fields(username = ?user.username))]
    pub async fn create_user(&self, user: &UserRepresentation) -> KeycloakResult<AdminResponse> {
        let response = self.generic_post("users/", None, Some(user)).await?;
        info!(id = ?response.created_id(), "User created");
        Ok(response)
    }

    pub async fn count_users(&self) -> KeycloakResult<u64> {
        self.generic_get("users/count/", None).await
    }

    pub async fn get_group_per_user(&self, id: &str) -> KeycloakResult<Vec<GroupRepresentation>> {
        self.generic_get(&format!("users/{}/groups", segment(id)), None).await
    }

    pub async fn get_user(&self, id: &str) -> KeycloakResult<UserRepresentation> {
        self.generic_get(&format!("users/{}", segment(id)), None).await
    }

    pub async fn update_user(
        &self,
        id: &str,
        user: &UserRepresentation,
    ) -> KeycloakResult<AdminResponse> {
        self.generic_put(&format!("users/{}", segment(id)), None, Some(user)).await
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: &str) -> KeycloakResult<AdminResponse> {
        self.generic_delete::<()>(&format!("users/{}", segment(id)), None, None)
            .await
    }

    /// Revoke the consent and offline tokens a user granted to a client
    /// (the realm client when `client_id` is not given).
    pub async fn revoke_consent_user(
        &self,
        id: &str,
        client_id: Option<&str>,
    ) -> KeycloakResult<AdminResponse> {
        let client_id = client_id
            .filter(|c| !c.is_empty())
            .unwrap_or(self.context.realm().client_id.as_str());
        let service = format!("users/{}/consents/{}", segment(id), segment(client_id));
        self.generic_delete::<()>(&service, None, None).await
    }

    /// Email the user a link to perform `actions`.
    pub async fn update_account_email(
        &self,
        id: &str,
        actions: &[RequiredAction],
        redirect_uri: Option<&str>,
        client_id: Option<&str>,
    ) -> KeycloakResult<AdminResponse> {
        let client_id = client_id
            .filter(|c| !c.is_empty())
            .unwrap_or(self.context.realm().client_id.as_str());
        let mut query = Vec::with_capacity(2);
        if let Some(redirect_uri) = redirect_uri.filter(|r| !r.is_empty()) {
            query.push(("redirect_uri", redirect_uri));
        }
        query.push(("client_id", client_id));

        self.generic_put(
            &format!("users/{}/execute-actions-email", segment(id)),
            Some(query.as_slice()),
            Some(actions),
        )
        .await
    }

    pub async fn get_role_mappings(&self, id: &str) -> KeycloakResult<MappingsRepresentation> {
        self.generic_get(&format!("users/{}/role-mappings", segment(id)), None)
            .await
    }

    pub async fn reset_password(
        &self,
        id: &str,
        credential: &CredentialRepresentation,
    ) -> KeycloakResult<AdminResponse> {
        self.generic_put(&format!("users/{}/reset-password", segment(id)), None, Some(credential))
            .await
    }

    // Groups and clients

    pub async fn get_groups(
        &self,
        query: Option<Query<'_>>,
    ) -> KeycloakResult<Vec<GroupRepresentation>> {
        self.generic_get("groups/", query).await
    }

    pub async fn get_clients(
        &self,
        query: Option<Query<'_>>,
    ) -> KeycloakResult<Vec<ClientRepresentation>> {
        self.generic_get("clients/", query).await
    }

    /// Look up a client by its `clientId` and return its representation
    /// (whose `id` is the UUID the admin API expects).
    pub async fn find_client(&self, client_id: &str) -> KeycloakResult<ClientRepresentation> {
        self.get_clients(Some(&[("clientId", client_id)]))
            .await?
            .into_iter()
            .find(|c| c.client_id.as_deref() == Some(client_id))
            .ok_or_else(|| KeycloakError::ClientNotFound {
                client_id: client_id.to_string(),
            })
    }

    async fn client_uuid(&self, client_id: &str) -> KeycloakResult<String> {
        self.find_client(client_id)
            .await?
            .id
            .ok_or_else(|| KeycloakError::ClientNotFound {
                client_id: client_id.to_string(),
            })
    }

    // Client roles

    pub async fn get_all_roles_client(&self, id: &str) -> KeycloakResult<Vec<RoleRepresentation>> {
        self.generic_get(&format!("clients/{}/roles", segment(id)), None).await
    }

    pub async fn get_roles_client_by_name(
        &self,
        id: &str,
        role_name: &str,
    ) -> KeycloakResult<RoleRepresentation> {
        self.generic_get(&format!("clients/{}/roles/{}", segment(id), segment(role_name)), None)
            .await
    }

    pub async fn get_users_client_by_role_name(
        &self,
        id: &str,
        role_name: &str,
    ) -> KeycloakResult<Vec<UserRepresentation>> {
        let service = format!("clients/{}/roles/{}/users", segment(id), segment(role_name));
        self.generic_get(&service, None).await
    }

    pub async fn add_client_level_roles_to_user(
        &self,
        id: &str,
        client: &str,
        roles: &[RoleRepresentation],
    ) -> KeycloakResult<AdminResponse> {
        self.generic_post(
            &format!("users/{}/role-mappings/clients/{}", segment(id), segment(client)),
            None,
            Some(roles),
        )
        .await
    }

    pub async fn delete_client_level_roles_from_user(
        &self,
        id: &str,
        client: &str,
        roles: &[RoleRepresentation],
    ) -> KeycloakResult<AdminResponse> {
        self.generic_delete(
            &format!("users/{}/role-mappings/clients/{}", segment(id), segment(client)),
            None,
            Some(roles),
        )
        .await
    }

    pub async fn get_client_level_role_for_user_and_app(
        &self,
        id: &str,
        client: &str,
    ) -> KeycloakResult<Vec<RoleRepresentation>> {
        let service = format!("users/{}/role-mappings/clients/{}", segment(id), segment(client));
        self.generic_get(&service, None).await
    }

    pub async fn get_effective_client_level_role_composite_user(
        &self,
        id: &str,
        client: &str,
    ) -> KeycloakResult<Vec<RoleRepresentation>> {
        self.generic_get(
            &format!("users/{}/role-mappings/clients/{}/composite", segment(id), segment(client)),
            None,
        )
        .await
    }

    /// Make the user's client-level roles on `client_id` exactly `role_names`:
    /// stale mappings are removed, missing ones added. Blank names are ignored.
    #[instrument(skip(self))]
    pub async fn update_effective_user_roles(
        &self,
        id: &str,
        client_id: &str,
        role_names: &[&str],
    ) -> KeycloakResult<()> {
        let client = self.client_uuid(client_id).await?;
        let current = self.get_client_level_role_for_user_and_app(id, &client).await?;
        let wanted: Vec<&str> = role_names
            .iter()
            .copied()
            .filter(|name| !name.trim().is_empty())
            .collect();

        let mut missing = Vec::new();
        for name in &wanted {
            if !current.iter().any(|role| role.is_named(name)) {
                missing.push(self.get_roles_client_by_name(&client, name).await?);
            }
        }

        let stale: Vec<RoleRepresentation> = current
            .into_iter()
            .filter(|role| !wanted.iter().any(|name| role.is_named(name)))
            .collect();

        debug!(added = missing.len(), removed = stale.len(), "Reconciling client roles");
        if !stale.is_empty() {
            self.delete_client_level_roles_from_user(id, &client, &stale)
                .await?;
        }
        if !missing.is_empty() {
            self.add_client_level_roles_to_user(id, &client, &missing)
                .await?;
        }
        Ok(())
    }

    // Realm roles

    pub async fn get_realm_role_by_name(
        &self,
        role_name: &str,
    ) -> KeycloakResult<RoleRepresentation> {
        self.generic_get(&format!("roles/{}", segment(role_name)), None).await
    }

    pub async fn add_realm_level_roles_to_user(
        &self,
        id: &str,
        roles: &[RoleRepresentation],
    ) -> KeycloakResult<AdminResponse> {
        self.generic_post(&format!("users/{}/role-mappings/realm", segment(id)), None, Some(roles))
            .await
    }

    // Sessions

    pub async fn list_offline_session(
        &self,
        client_id: &str,
    ) -> KeycloakResult<Vec<UserSessionRepresentation>> {
        self.generic_get(&format!("clients/{}/offline-sessions", segment(client_id)), None)
            .await
    }

    pub async fn get_user_sessions(
        &self,
        id: &str,
    ) -> KeycloakResult<Vec<UserSessionRepresentation>> {
        self.generic_get(&format!("users/{}/sessions", segment(id)), None).await
    }

    #[instrument(skip(self))]
    pub async fn logout_user(&self, id: &str) -> KeycloakResult<AdminResponse> {
        self.generic_post::<()>(&format!("users/{}/logout", segment(id)), None, None)
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete_session(&self, session_id: &str) -> KeycloakResult<AdminResponse> {
        self.generic_delete::<()>(&format!("sessions/{}", segment(session_id)), None, None)
            .await
    }
}

/// Percent-encode a value for use as one path segment.
fn segment(value: &str) -> String {
    // form encoding leaves only `*-._` and alphanumerics bare and turns
    // spaces into `+`; a literal `+` is already `%2B`
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
