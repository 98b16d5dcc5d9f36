//! Server-side components of the user service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration.
//! - [`host`] - Wires the service, health and reflection into a tonic server.
//! - [`pool`] - Bounded worker pool executing calls.
//! - [`service`] - The `UserService` gRPC implementation.
//! - [`streaming`] - Call payloads and per-RPC behavior.
//! - [`telemetry`] - Logging setup and optional OpenTelemetry export.

pub mod config;
pub mod host;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;
