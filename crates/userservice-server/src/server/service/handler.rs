//! gRPC service implementation for the user service.
//!
//! This module defines [`UserServiceImpl`], the concrete implementation of the
//! [`UserService`] gRPC service defined in `users.proto`. Every RPC is
//! packaged as a [`Call`] and handed to the [`WorkerPool`]; the handler only
//! wires request and response channels to the transport.
//!
//! ## Responsibilities
//!
//! - Spawn and own the background worker pool.
//! - Translate each RPC into a [`Call`] and dispatch it.
//! - Surface results as unary responses or `ReceiverStream`s.
//! - Propagate shutdown to the pool.

use crate::server::{
    config::ServerConfig,
    pool::manager::WorkerPool,
    streaming::request::Call,
    telemetry::{increment_call_errors, increment_requests},
};
use core::pin::Pin;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};
use userservice_core::{
    Error,
    proto::{
        ChatMessage, UploadSummary, User, UserRequest, UserResponse,
        user_service_server::UserService,
    },
};

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// gRPC user service backed by a bounded worker pool.
///
/// Cloning is cheap: clones share the same pool.
#[derive(Clone)]
pub struct UserServiceImpl {
    config: ServerConfig,
    worker_pool: Arc<WorkerPool>,
}

impl UserServiceImpl {
    /// Creates a new `UserServiceImpl` and spawns its worker pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(config: ServerConfig) -> Self {
        let worker_pool = WorkerPool::new(&config);
        Self {
            config,
            worker_pool: Arc::new(worker_pool),
        }
    }

    /// Initiates a graceful shutdown of the worker pool.
    ///
    /// New calls are refused immediately; in-flight calls get the configured
    /// drain timeout before they are cancelled.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.worker_pool.shutdown().await
    }

    async fn dispatch(&self, call: Call) -> Result<(), Status> {
        let rpc = call.name();
        increment_requests(rpc);
        self.worker_pool.dispatch(call).await.map_err(|e| {
            tracing::warn!("Failed to dispatch {rpc}: {e}");
            increment_call_errors(rpc);
            Status::from(e)
        })
    }

    /// Waits for a worker's single reply.
    ///
    /// Workers always answer unless shutdown cancelled the call mid-flight,
    /// so a dropped reply is reported as the service going away.
    async fn reply<T>(rx: oneshot::Receiver<Result<T, Status>>) -> Result<Response<T>, Status> {
        match rx.await {
            Ok(result) => result.map(Response::new),
            Err(_) => Err(Error::ServiceShutdown.into()),
        }
    }

    fn stream_channel<T>(&self) -> (mpsc::Sender<Result<T, Status>>, ResponseStream<T>)
    where
        T: Send + 'static,
    {
        // One extra slot is held back by the worker for a terminal status.
        let (tx, rx) = mpsc::channel(self.config.stream_buffer_size + 1);
        (tx, Box::pin(ReceiverStream::new(rx)))
    }
}

#[tonic::async_trait]
impl UserService for UserServiceImpl {
    type ListUsersStream = ResponseStream<User>;
    type ChatStream = ResponseStream<ChatMessage>;

    #[tracing::instrument(skip_all, fields(id = req.get_ref().id))]
    async fn get_user(&self, req: Request<UserRequest>) -> Result<Response<UserResponse>, Status> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Call::GetUser {
            request: req.into_inner(),
            response: tx,
        })
        .await?;
        Self::reply(rx).await
    }

    #[tracing::instrument(skip_all)]
    async fn list_users(&self, _req: Request<()>) -> Result<Response<Self::ListUsersStream>, Status> {
        let (tx, stream) = self.stream_channel();
        self.dispatch(Call::ListUsers { tx }).await?;
        Ok(Response::new(stream))
    }

    #[tracing::instrument(skip_all)]
    async fn upload_users(
        &self,
        req: Request<Streaming<User>>,
    ) -> Result<Response<UploadSummary>, Status> {
        let (tx, rx) = oneshot::channel();
        self.dispatch(Call::UploadUsers {
            users: Box::pin(req.into_inner()),
            response: tx,
        })
        .await?;
        Self::reply(rx).await
    }

    #[tracing::instrument(skip_all)]
    async fn chat(
        &self,
        req: Request<Streaming<ChatMessage>>,
    ) -> Result<Response<Self::ChatStream>, Status> {
        let (tx, stream) = self.stream_channel();
        self.dispatch(Call::Chat {
            inbound: Box::pin(req.into_inner()),
            tx,
        })
        .await?;
        Ok(Response::new(stream))
    }
}
