use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use userservice_core::types::DEFAULT_SERVER_ADDR;

/// Runtime configuration for the `userservice-server` binary.
///
/// These settings control the listener, the size of the worker pool and the
/// buffering between workers and the gRPC transport. All values are parsed
/// from CLI arguments or environment variables, and the defaults reproduce
/// the reference service: port 50051 with ten workers.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "userservice-server",
    version,
    about = "A gRPC user service exercising unary and streaming RPCs"
)]
pub struct CliArgs {
    /// Address to listen on.
    ///
    /// Example: "[::]:50051" or "127.0.0.1:0"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from(DEFAULT_SERVER_ADDR))]
    pub server_addr: String,

    /// Number of worker tasks servicing calls concurrently.
    ///
    /// Each worker runs one call at a time to completion. A streaming call
    /// holds its worker until the stream ends, so this bounds the number of
    /// calls in progress across all connections.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 10)]
    pub num_workers: usize,

    /// Capacity of the shared queue in front of the workers.
    ///
    /// Calls wait here while every worker is busy. Once the queue is full,
    /// new calls wait for a slot instead of being rejected.
    ///
    /// Environment variable: `QUEUE_DEPTH`
    #[arg(long, env = "QUEUE_DEPTH", default_value_t = 64)]
    pub queue_depth: usize,

    /// Capacity of the response buffer between a worker and a gRPC stream.
    ///
    /// Bounds how many outbound messages can be buffered before the worker
    /// waits for the client to consume more.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight calls to drain on shutdown before they
    /// are cancelled. `0` stops immediately.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 5)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub num_workers: usize,
    pub queue_depth: usize,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.num_workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        if args.queue_depth == 0 {
            bail!("QUEUE_DEPTH must be greater than 0");
        }

        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            num_workers: args.num_workers,
            queue_depth: args.queue_depth,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
        })
    }
}
