//! Worker pool that executes dispatched RPC calls.
//!
//! - [`manager`] - [`manager::WorkerPool`]: dispatch, in-flight tracking and
//!   shutdown.
//! - [`worker`] - The per-worker event loop.

pub mod manager;
pub mod worker;
