pub mod admin;
pub mod client;
pub mod internal;

pub use admin::{AdminClient, AdminResponse, Query};
pub use client::KeycloakClient;
pub use internal::InternalClient;
