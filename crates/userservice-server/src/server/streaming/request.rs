use crate::server::pool::manager::InflightGuard;
use core::pin::Pin;
use futures::{
    FutureExt, Stream,
    future::{self, BoxFuture},
};
use tokio::sync::{mpsc, oneshot};
use tonic::Status;
use userservice_core::{
    Error,
    proto::{ChatMessage, UploadSummary, User, UserRequest, UserResponse},
};

/// Inbound half of a client-streaming or bidirectional call.
///
/// Boxed so the pool does not depend on `tonic::Streaming` and tests can feed
/// plain in-memory streams.
pub type InboundStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Sender for an outbound message stream surfaced to the client.
pub type OutboundSender<T> = mpsc::Sender<Result<T, Status>>;

/// Terminates a running call's response stream with a status.
///
/// Holds a reserved slot in the response channel, so the status is delivered
/// even when the client has stopped reading and the buffer is full.
pub type StreamFailer = Box<dyn FnOnce(Status) + Send>;

/// A message sent from the worker pool to a worker task.
///
/// [`WorkRequest`]s travel over the pool's shared bounded queue and are
/// consumed by whichever worker is free next.
pub enum WorkRequest {
    /// Execute a single RPC call to completion.
    ///
    /// - `call`: The call and the channels its results go back on.
    /// - `guard`: Keeps the call counted as in flight until the worker drops
    ///   it.
    Call { call: Call, guard: InflightGuard },

    /// Request the worker to shut down gracefully.
    ///
    /// - `response`: One-shot channel for acknowledging that the worker has
    ///   stopped taking work.
    Shutdown { response: oneshot::Sender<()> },
}

/// One dispatched RPC, carrying its inputs and the way back to the handler.
pub enum Call {
    GetUser {
        request: UserRequest,
        response: oneshot::Sender<Result<UserResponse, Status>>,
    },
    ListUsers {
        tx: OutboundSender<User>,
    },
    UploadUsers {
        users: InboundStream<User>,
        response: oneshot::Sender<Result<UploadSummary, Status>>,
    },
    Chat {
        inbound: InboundStream<ChatMessage>,
        tx: OutboundSender<ChatMessage>,
    },
}

impl Call {
    /// RPC method name, used for logs and metric attributes.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::GetUser { .. } => "GetUser",
            Self::ListUsers { .. } => "ListUsers",
            Self::UploadUsers { .. } => "UploadUsers",
            Self::Chat { .. } => "Chat",
        }
    }

    /// Reserves a hook that ends the call's response stream with an error
    /// status, for calls that have one.
    ///
    /// Must be awaited before the call starts sending, while its response
    /// channel still has room. The hook holds its own permit, so it stays
    /// usable after the call itself has been dropped mid-flight. Resolves to
    /// `None` for unary responses or when the client is already gone.
    pub fn reserve_failer(&self) -> BoxFuture<'static, Option<StreamFailer>> {
        match self {
            Self::ListUsers { tx } => failer(tx.clone()).boxed(),
            Self::Chat { tx, .. } => failer(tx.clone()).boxed(),
            Self::GetUser { .. } | Self::UploadUsers { .. } => future::ready(None).boxed(),
        }
    }

    /// Fails the call with `err` without running it.
    ///
    /// Used when the call is dequeued after shutdown has cancelled remaining
    /// work. Delivery is best effort: the client may already be gone.
    pub fn abort(self, err: Error) {
        let status = Status::from(err);
        match self {
            Self::GetUser { response, .. } => {
                let _ = response.send(Err(status));
            }
            Self::UploadUsers { response, .. } => {
                let _ = response.send(Err(status));
            }
            Self::ListUsers { tx } => {
                let _ = tx.try_send(Err(status));
            }
            Self::Chat { tx, .. } => {
                let _ = tx.try_send(Err(status));
            }
        }
    }
}

async fn failer<T: Send + 'static>(tx: OutboundSender<T>) -> Option<StreamFailer> {
    let permit = tx.reserve_owned().await.ok()?;
    let fail: StreamFailer = Box::new(move |status| {
        permit.send(Err(status));
    });
    Some(fail)
}
