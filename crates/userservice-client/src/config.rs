use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use tonic::transport::{Channel, Endpoint};
use userservice_core::types::DEFAULT_CLIENT_ENDPOINT;

/// Runtime configuration for the `userservice-client` binary.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "userservice-client",
    version,
    about = "Calls every user service RPC once and prints the results"
)]
pub struct CliArgs {
    /// Endpoint of the user service.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from(DEFAULT_CLIENT_ENDPOINT))]
    pub server_addr: String,

    /// Deadline applied to every call, in seconds.
    ///
    /// Environment variable: `TIMEOUT_SECS`
    #[arg(long, env = "TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: String,
    pub timeout: Duration,
}

impl TryFrom<CliArgs> for ClientConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.timeout_secs == 0 {
            bail!("TIMEOUT_SECS must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            timeout: Duration::from_secs(args.timeout_secs),
        })
    }
}

impl ClientConfig {
    /// Builds a channel to the configured endpoint.
    ///
    /// The connection is established on first use, so an unreachable server
    /// fails each call separately instead of aborting the run up front.
    pub fn channel(&self) -> anyhow::Result<Channel> {
        Ok(Endpoint::from_shared(self.server_addr.clone())?
            .connect_timeout(self.timeout)
            .timeout(self.timeout)
            .connect_lazy())
    }
}
