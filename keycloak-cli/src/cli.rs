//! Command-line arguments.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "keycloak-cli")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Talk to a Keycloak realm from the command line")]
pub struct Cli {
    /// Installation file to use instead of config/keycloak.json or keycloak.json
    #[arg(long, global = true, env = "KEYCLOAK_INSTALLATION_FILE")]
    pub installation_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the resolved realm settings
    Config,
    /// Print the login page URL for a redirect URI
    LoginUrl {
        redirect_uri: String,
        #[arg(long)]
        response_type: Option<String>,
        /// Requested scopes, repeatable
        #[arg(long = "scope")]
        scope: Vec<String>,
    },
    /// Obtain a token with the resource owner password grant
    Token {
        username: String,
        #[arg(long, env = "KEYCLOAK_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long = "scope")]
        scope: Vec<String>,
    },
    /// Obtain a service account token
    ClientToken,
    /// Introspect an access token
    Introspect { token: String },
    /// Search users through the service account
    Users {
        /// Free-text search over username, email and names
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Delete a user by id through the service account
    DeleteUser { id: String },
    /// List offline sessions of a client (by client UUID)
    OfflineSessions { client: String },
}
