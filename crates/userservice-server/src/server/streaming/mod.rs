//! Call payloads and per-RPC execution.
//!
//! - [`request`] - Messages exchanged between the handler, pool and workers.
//! - [`processor`] - What each RPC does once a worker picks it up.

pub mod processor;
pub mod request;
