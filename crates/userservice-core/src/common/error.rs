//! Error types for the user service.
//!
//! This module defines the central `Error` enum for failures that happen
//! inside the server host while a call is being dispatched or executed. It
//! implements `From<Error>` for `tonic::Status` so failures reach clients as
//! gRPC status codes; payloads never carry error fields.
//!
//! ## Error Cases
//! - `ChannelError`: An internal channel between the handler and a worker
//!   closed unexpectedly.
//! - `RequestCancelled`: The client went away mid-call.
//! - `ServiceShutdown`: A call arrived, or was still queued, while the service
//!   was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the user service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Internal channel send/receive failure (e.g., closed channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The client aborted the call.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {context}"))
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_status_codes() {
        let status: Status = Error::ServiceShutdown.into();
        assert_eq!(status.code(), Code::Unavailable);

        let status: Status = Error::RequestCancelled.into();
        assert_eq!(status.code(), Code::Cancelled);

        let status: Status = Error::ChannelError {
            context: "worker 3 gone".to_string(),
        }
        .into();
        assert_eq!(status.code(), Code::Internal);
        assert!(status.message().contains("worker 3 gone"));
    }
}
