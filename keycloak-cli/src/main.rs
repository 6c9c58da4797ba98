mod cli;
mod commands;
mod logging;

use anyhow::{Context, Result};
use clap::Parser;
use keycloak_client::{ConfigurationPort, EnvConfigurationAdapter, Keycloak};
use tracing::debug;

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let adapter = EnvConfigurationAdapter::new().context("invalid configuration")?;
    logging::init(adapter.get_logging_config());

    let mut config = adapter.into_config().keycloak;
    if let Some(file) = cli.installation_file.as_deref() {
        config.set_installation_file(file)?;
    }
    let keycloak = Keycloak::new(config).context("could not resolve the Keycloak realm")?;
    debug!(realm = %keycloak.realm().realm, "Realm resolved");

    let output = commands::run(&keycloak, cli.command).await?;
    match output {
        serde_json::Value::String(text) => println!("{text}"),
        value => println!("{}", serde_json::to_string_pretty(&value)?),
    }

    Ok(())
}
