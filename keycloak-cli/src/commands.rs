use anyhow::{Context, Result};
use keycloak_client::Keycloak;
use serde_json::{json, Value};
use tracing::info;

use crate::cli::Command;

pub async fn run(keycloak: &Keycloak, command: Command) -> Result<Value> {
    match command {
        Command::Config => {
            let realm = keycloak.realm();
            Ok(json!({
                "realm": realm.realm,
                "auth_server_url": realm.auth_server_url,
                "client_id": realm.client_id,
                "has_secret": !realm.secret.is_empty(),
                "account_url": realm.account_url(),
            }))
        }
        Command::LoginUrl {
            redirect_uri,
            response_type,
            scope,
        } => {
            let scope: Vec<&str> = scope.iter().map(String::as_str).collect();
            let url = keycloak
                .client()
                .url_login_redirect(&redirect_uri, response_type.as_deref(), None, None, &scope)
                .await?;
            Ok(Value::String(url))
        }
        Command::Token {
            username,
            password,
            scope,
        } => {
            let scope: Vec<&str> = scope.iter().map(String::as_str).collect();
            let token = keycloak
                .client()
                .get_token(&username, &password, None, &scope)
                .await
                .with_context(|| format!("password grant for {username} failed"))?;
            Ok(serde_json::to_value(token)?)
        }
        Command::ClientToken => {
            let token = keycloak.client().get_token_by_client_credentials(None).await?;
            Ok(serde_json::to_value(token)?)
        }
        Command::Introspect { token } => {
            let introspection = keycloak
                .client()
                .get_token_introspection(Some(&token), None, None)
                .await?;
            Ok(serde_json::to_value(introspection)?)
        }
        Command::Users {
            search,
            username,
            email,
        } => {
            let mut query = Vec::new();
            if let Some(search) = search.as_deref() {
                query.push(("search", search));
            }
            if let Some(username) = username.as_deref() {
                query.push(("username", username));
            }
            if let Some(email) = email.as_deref() {
                query.push(("email", email));
            }
            let users = keycloak
                .internal()
                .get_users(Some(query.as_slice()), None)
                .await?;
            info!(count = users.len(), "Users fetched");
            Ok(serde_json::to_value(users)?)
        }
        Command::DeleteUser { id } => {
            let response = keycloak
                .internal()
                .default_call(None, |admin| async move { admin.delete_user(&id).await })
                .await?;
            Ok(json!({ "status": response.status }))
        }
        Command::OfflineSessions { client } => {
            let sessions = keycloak
                .internal()
                .default_call(None, |admin| async move {
                    admin.list_offline_session(&client).await
                })
                .await?;
            Ok(serde_json::to_value(sessions)?)
        }
    }
}
