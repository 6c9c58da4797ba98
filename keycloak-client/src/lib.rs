/*!
# Keycloak Client

Client library for a Keycloak OpenID Connect server, laid out along
hexagonal architecture lines.

This crate provides:
- Token acquisition (password, authorization code, refresh, client
  credentials and token exchange grants), introspection, userinfo and logout
- Login redirect URL construction
- Admin REST operations on users, clients, roles and sessions
- Service-account workflows that wrap admin calls in a short-lived session
- Realm resolution from a `keycloak.json` installation file or explicit settings

## Architecture

```text
┌─────────────────────────────────────────────────────────────┐
│                    Keycloak facade                          │
│         (resolved realm, transport, OpenID metadata)        │
└─────────────────────────────────────────────────────────────┘
                              │
┌─────────────────────────────────────────────────────────────┐
│                Application Layer                            │
├─────────────────────────────────────────────────────────────┤
│  • KeycloakClient     • AdminClient     • InternalClient    │
└─────────────────────────────────────────────────────────────┘
                              │
┌─────────────────────────────────────────────────────────────┐
│                 Application Ports                           │
├─────────────────────────────────────────────────────────────┤
│  • ConfigurationPort  • TokenSource  • ExternalAttributes   │
└─────────────────────────────────────────────────────────────┘
                              │
┌─────────────────────────────────────────────────────────────┐
│              Infrastructure Layer (Adapters)                │
├─────────────────────────────────────────────────────────────┤
│  • HttpTransport      • EnvConfigurationAdapter             │
│  • installation file loading                                │
└─────────────────────────────────────────────────────────────┘
```

## Usage

```rust,no_run
use keycloak_client::{Keycloak, KeycloakConfig};

# async fn run() -> keycloak_client::KeycloakResult<()> {
let config = KeycloakConfig::default()
    .with_realm("master", "https://sso.example.com")
    .with_client("my-app", "s3cr3t");
let keycloak = Keycloak::new(config)?;

let token = keycloak
    .client()
    .get_token("alice", "password", None, &[])
    .await?;

let users = keycloak
    .admin()
    .with_access_token(&token.access_token)
    .get_users(Some(&[("username", "alice")]))
    .await?;
# let _ = users;
# Ok(())
# }
```
*/

pub mod application;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use application::ports::*;
pub use application::services::*;
pub use domain::entities::*;
pub use domain::errors::*;
pub use infrastructure::adapters::{EnvConfigurationAdapter, Keycloak, KeycloakBuilder};
