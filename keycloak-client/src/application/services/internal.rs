use std::future::Future;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::application::services::admin::{AdminClient, AdminResponse, Query};
use crate::application::services::client::KeycloakClient;
use crate::domain::entities::*;
use crate::domain::errors::{KeycloakError, KeycloakResult};
use crate::infrastructure::adapters::keycloak::KeycloakContext;

/// Service-account workflows: each call obtains a client-credentials token,
/// runs admin operations with it and ends the service session afterwards.
#[derive(Clone)]
pub struct InternalClient {
    context: Arc<KeycloakContext>,
}

impl InternalClient {
    pub fn new(context: Arc<KeycloakContext>) -> Self {
        Self { context }
    }

    fn client(&self) -> KeycloakClient {
        KeycloakClient::new(self.context.clone())
    }

    /// Run `call` with an admin client bound to a fresh service-account token.
    ///
    /// The service session is closed whether or not `call` succeeds; a failed
    /// logout is logged and does not mask the call's outcome.
    pub async fn default_call<T, F, Fut>(
        &self,
        credentials: Option<&ClientCredentials>,
        call: F,
    ) -> KeycloakResult<T>
    where
        F: FnOnce(AdminClient) -> Fut,
        Fut: Future<Output = KeycloakResult<T>>,
    {
        let credentials = self.context.credentials(credentials);
        let client = self.client();

        let token = client
            .get_token_by_client_credentials(Some(&credentials))
            .await?;
        if let Some(error) = token.error.as_deref() {
            return Err(KeycloakError::InvalidToken {
                reason: token
                    .error_description
                    .clone()
                    .unwrap_or_else(|| error.to_string()),
            });
        }

        let admin = AdminClient::new(self.context.clone()).with_access_token(&token.access_token);
        let result = call(admin).await;

        if let Some(refresh_token) = token.refresh_token.as_deref().filter(|t| !t.is_empty()) {
            match client
                .logout(None, Some(refresh_token), Some(&credentials), None)
                .await
            {
                Ok(true) => debug!("Service account session closed"),
                Ok(false) => warn!("Keycloak refused to close the service account session"),
                Err(err) => warn!(error = %err, "Failed to close the service account session"),
            }
        }

        result
    }

    pub async fn get_users(
        &self,
        query: Option<Query<'_>>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<Vec<UserRepresentation>> {
        self.default_call(credentials, |admin| async move { admin.get_users(query).await })
            .await
    }

    pub async fn get_groups(
        &self,
        query: Option<Query<'_>>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<Vec<GroupRepresentation>> {
        self.default_call(credentials, |admin| async move { admin.get_groups(query).await })
            .await
    }

    /// Email the user an update-password link.
    #[instrument(skip(self, credentials))]
    pub async fn change_password(
        &self,
        user_id: &str,
        redirect_uri: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<AdminResponse> {
        let client_id = self.context.credentials(credentials).client_id;
        self.default_call(credentials, |admin| async move {
            admin
                .update_account_email(
                    user_id,
                    &[RequiredAction::UpdatePassword],
                    redirect_uri,
                    Some(client_id.as_str()),
                )
                .await
        })
        .await
    }

    /// The user whose username or email is exactly `login`.
    pub async fn get_user_info(
        &self,
        login: &str,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<UserRepresentation> {
        self.default_call(credentials, |admin| async move {
            find_user(&admin, login).await
        })
        .await
    }

    /// Users matching `login` by email (when it contains `@`) or username.
    pub async fn search_user_info(
        &self,
        login: &str,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<Vec<UserRepresentation>> {
        self.default_call(credentials, |admin| async move {
            let users = search_users(&admin, login).await?;
            if users.is_empty() {
                return Err(KeycloakError::UserLoginNotFound {
                    login: login.to_string(),
                });
            }
            Ok(users)
        })
        .await
    }

    #[instrument(skip(self, credentials))]
    pub async fn forgot_password(
        &self,
        login: &str,
        redirect_uri: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<AdminResponse> {
        let user = self.get_user_info(login, credentials).await?;
        let user_id = user.id.unwrap_or_default();
        self.change_password(&user_id, redirect_uri, credentials)
            .await
    }

    /// Full representation of the user behind an access token.
    pub async fn get_logged_user_info(
        &self,
        access_token: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<UserRepresentation> {
        let userinfo = self.client().get_userinfo(access_token).await?;
        let sub = userinfo
            .get("sub")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| KeycloakError::InvalidToken {
                reason: "userinfo response carries no subject".to_string(),
            })?
            .to_string();

        self.default_call(credentials, |admin| async move {
            admin.get_user(&sub).await
        })
        .await
    }

    /// Whether `value` is taken by a user other than `user_id`. Lookup
    /// failures count as not taken.
    pub async fn exists_name_or_email(
        &self,
        value: &str,
        user_id: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> bool {
        match self.get_user_info(value, credentials).await {
            Ok(user) => match user_id.filter(|id| !id.is_empty()) {
                Some(user_id) => user.id.as_deref() != Some(user_id),
                None => true,
            },
            Err(err) => {
                debug!(error = %err, "Name or email lookup failed");
                false
            }
        }
    }

    pub async fn logged_federation_user(
        &self,
        access_token: Option<&str>,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<bool> {
        Ok(self
            .get_logged_user_info(access_token, credentials)
            .await?
            .is_federated())
    }

    /// Create the user unless it exists, set its password (non-federated users
    /// only when newly created) and grant the requested roles.
    #[instrument(skip(self, new_user, credentials), fields(username = %new_user.username))]
    pub async fn create_simple_user(
        &self,
        new_user: &NewUser,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<UserRepresentation> {
        let client_id = self.context.credentials(credentials).client_id;
        let username = new_user.username.to_lowercase();

        self.default_call(credentials, |admin| async move {
            let created = match find_user(&admin, &username).await {
                Ok(_) => false,
                Err(KeycloakError::UserLoginNotFound { .. }) => {
                    let mut user = UserRepresentation::new(&username);
                    if !new_user.email.is_empty() {
                        user = user.with_email(&new_user.email);
                    }
                    if !new_user.first_name.is_empty() || !new_user.last_name.is_empty() {
                        user = user.with_name(&new_user.first_name, &new_user.last_name);
                    }
                    admin.create_user(&user).await?;
                    true
                }
                Err(err) => return Err(err),
            };

            let user = find_user(&admin, &username).await?;
            let user_id = user.id.clone().unwrap_or_default();

            if created && !user.is_federated() {
                admin
                    .reset_password(
                        &user_id,
                        &CredentialRepresentation::password(&new_user.password, false),
                    )
                    .await?;
            }

            let client_roles = non_blank(&new_user.client_roles);
            if !client_roles.is_empty() {
                let client = admin.find_client(&client_id).await?;
                let client_uuid = client.id.unwrap_or_default();
                let mut roles = Vec::with_capacity(client_roles.len());
                for name in client_roles {
                    roles.push(admin.get_roles_client_by_name(&client_uuid, name).await?);
                }
                admin
                    .add_client_level_roles_to_user(&user_id, &client_uuid, &roles)
                    .await?;
            }

            let realm_roles = non_blank(&new_user.realm_roles);
            if !realm_roles.is_empty() {
                let mut roles = Vec::with_capacity(realm_roles.len());
                for name in realm_roles {
                    roles.push(admin.get_realm_role_by_name(name).await?);
                }
                admin.add_realm_level_roles_to_user(&user_id, &roles).await?;
            }

            info!(user_id = %user_id, created, "User provisioned");
            Ok(user)
        })
        .await
    }

    pub async fn create_starter_user(
        &self,
        username: &str,
        password: &str,
        email: &str,
        client_roles: &[&str],
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<UserRepresentation> {
        let new_user = NewUser {
            username: username.to_string(),
            password: password.to_string(),
            email: email.to_string(),
            client_roles: client_roles.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        };
        self.create_simple_user(&new_user, credentials).await
    }

    /// Roles defined on the configured client.
    pub async fn get_client_roles(
        &self,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<Vec<RoleRepresentation>> {
        let client_id = self.context.credentials(credentials).client_id;
        self.default_call(credentials, |admin| async move {
            let client = admin.find_client(&client_id).await?;
            admin
                .get_all_roles_client(client.id.as_deref().unwrap_or_default())
                .await
        })
        .await
    }

    /// Effective (composite-expanded) roles of a user on the configured client.
    pub async fn get_client_user_roles(
        &self,
        user_id: &str,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<Vec<RoleRepresentation>> {
        let client_id = self.context.credentials(credentials).client_id;
        self.default_call(credentials, |admin| async move {
            let client = admin.find_client(&client_id).await?;
            admin
                .get_effective_client_level_role_composite_user(
                    user_id,
                    client.id.as_deref().unwrap_or_default(),
                )
                .await
        })
        .await
    }

    pub async fn has_role(
        &self,
        user_id: &str,
        role: &str,
        credentials: Option<&ClientCredentials>,
    ) -> KeycloakResult<bool> {
        Ok(self
            .get_client_user_roles(user_id, credentials)
            .await?
            .iter()
            .any(|r| r.is_named(role)))
    }
}

async fn search_users(
    admin: &AdminClient,
    login: &str,
) -> KeycloakResult<Vec<UserRepresentation>> {
    let key = if login.contains('@') { "email" } else { "username" };
    admin.get_users(Some(&[(key, login)])).await
}

async fn find_user(admin: &AdminClient, login: &str) -> KeycloakResult<UserRepresentation> {
    search_users(admin, login)
        .await?
        .into_iter()
        .find(|user| user.matches_login(login))
        .ok_or_else(|| KeycloakError::UserLoginNotFound {
            login: login.to_string(),
        })
}

fn non_blank(names: &[String]) -> Vec<&str> {
    names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .collect()
}
