//! Shared types and error definitions for the user service.
//!
//! ## Submodules
//!
//! - [`error`] - Service error type and its mapping to `tonic::Status`.
//! - [`types`] - Contract constants shared by server and client.
//! - [`proto`] - Generated protobuf messages and gRPC bindings.

pub mod error;
pub mod types;

pub use error::{Error, Result};

pub mod proto {
    tonic::include_proto!("users");

    /// Encoded file descriptor set for gRPC server reflection.
    pub const FILE_DESCRIPTOR_SET: &[u8] =
        tonic::include_file_descriptor_set!("users_descriptor");
}
