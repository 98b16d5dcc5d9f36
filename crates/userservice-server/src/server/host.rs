//! Tonic server assembly.
//!
//! [`serve_with_incoming`] binds a [`UserServiceImpl`] together with the gRPC
//! health and reflection services behind gRPC-Web and CORS layers, and runs
//! it over any stream of accepted connections until `signal` resolves. The
//! binary feeds it a TCP listener; tests feed it an ephemeral loopback one.

use crate::server::{config::ServerConfig, service::handler::UserServiceImpl};
use core::future::Future;
use futures::Stream;
use tokio::io::{AsyncRead, AsyncWrite};
use tonic::transport::server::Connected;
use tonic::{codec::CompressionEncoding, transport::Server};
use tonic_reflection::server::Builder;
use tonic_web::GrpcWebLayer;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use userservice_core::proto::{FILE_DESCRIPTOR_SET, user_service_server::UserServiceServer};

/// Runs the user service until `signal` completes, then shuts it down.
///
/// Shutdown order: health flips to `NOT_SERVING`, the worker pool stops
/// admitting calls and drains (bounded by `config.shutdown_timeout`), and
/// finally tonic closes the remaining connections.
pub async fn serve_with_incoming<I, IO, IE, F>(
    incoming: I,
    config: ServerConfig,
    signal: F,
) -> anyhow::Result<()>
where
    I: Stream<Item = Result<IO, IE>>,
    IO: AsyncRead + AsyncWrite + Connected + Unpin + Send + 'static,
    IE: Into<tower::BoxError>,
    F: Future<Output = ()>,
{
    let (health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_serving::<UserServiceServer<UserServiceImpl>>()
        .await;

    let service = UserServiceImpl::new(config);

    let reflection = Builder::configure()
        .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
        .build_v1()?;

    let shutdown = {
        let service = service.clone();
        async move {
            signal.await;
            tracing::info!("Shutdown signal received, terminating gracefully...");

            // 1. Publish the status
            health_reporter
                .set_not_serving::<UserServiceServer<UserServiceImpl>>()
                .await;

            // 2. Drain and stop the worker pool
            if let Err(e) = service.shutdown().await {
                tracing::error!("Error during service shutdown: {e:?}");
            }
        }
    };

    Server::builder()
        .accept_http1(true)
        .http2_adaptive_window(Some(true))
        .layer(
            ServiceBuilder::new()
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .layer(GrpcWebLayer::new()),
        )
        .add_service(health_service)
        .add_service(reflection)
        .add_service(build_user_service(service))
        .serve_with_incoming_shutdown(incoming, shutdown)
        .await?;

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn build_user_service(service: UserServiceImpl) -> UserServiceServer<UserServiceImpl> {
    UserServiceServer::new(service)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .send_compressed(CompressionEncoding::Deflate)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Deflate)
}
