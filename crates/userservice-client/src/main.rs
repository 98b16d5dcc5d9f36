#![doc = include_str!("../README.md")]

mod config;
mod driver;

use clap::Parser;
use config::{CliArgs, ClientConfig};
use tracing_subscriber::EnvFilter;
use userservice_core::proto::user_service_client::UserServiceClient;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let config = ClientConfig::try_from(CliArgs::parse())?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    let mut client = UserServiceClient::new(config.channel()?);

    let failures = driver::run(&mut client).await;
    if failures > 0 {
        anyhow::bail!("{failures} of 4 RPCs failed against {}", config.server_addr);
    }
    Ok(())
}
