use async_trait::async_trait;
use std::collections::HashMap;

use crate::domain::entities::TokenResponse;
use crate::domain::errors::KeycloakResult;

/// Supplies the token of the user the application is currently serving
/// (for instance one kept in a session cookie). Consulted whenever an
/// operation is called without an explicit token.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn current_token(&self) -> KeycloakResult<TokenResponse>;
}

/// Supplies application-defined attributes of the current user
#[async_trait]
pub trait ExternalAttributes: Send + Sync {
    async fn attributes(&self) -> KeycloakResult<HashMap<String, serde_json::Value>>;
}

/// Fixed token, handy for scripts and tests
pub struct StaticTokenSource {
    token: TokenResponse,
}

impl StaticTokenSource {
    pub fn new(token: TokenResponse) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn current_token(&self) -> KeycloakResult<TokenResponse> {
        Ok(self.token.clone())
    }
}
