pub mod env_config;
pub mod http;
pub mod installation;
pub mod keycloak;

pub use env_config::*;
pub use http::HttpTransport;
pub use installation::{load_installation, resolve_realm};
pub use keycloak::*;
