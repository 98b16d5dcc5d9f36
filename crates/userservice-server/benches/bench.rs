use core::time::Duration;
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::{
    net::TcpListener,
    runtime::{Builder, Runtime},
};
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Channel;
use userservice_core::proto::{
    ChatMessage, User, UserRequest, user_service_client::UserServiceClient,
};
use userservice_server::server::{config::ServerConfig, host::serve_with_incoming};

const CONCURRENCY: [usize; 3] = [1, 10, 50];

/// Runs the server in-process on an ephemeral port and connects to it.
fn start_server(rt: &Runtime) -> UserServiceClient<Channel> {
    rt.block_on(async {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("missing local addr");
        let config = ServerConfig {
            server_addr: addr.to_string(),
            num_workers: 10,
            queue_depth: 64,
            stream_buffer_size: 8,
            shutdown_timeout: Duration::ZERO,
        };
        tokio::spawn(serve_with_incoming(
            TcpListenerStream::new(listener),
            config,
            futures::future::pending::<()>(),
        ));
        UserServiceClient::connect(format!("http://{addr}"))
            .await
            .expect("Failed to connect")
    })
}

fn grpc_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    let client = start_server(&rt);

    let mut group = c.benchmark_group("grpc");
    for concurrency in CONCURRENCY {
        group.throughput(Throughput::Elements(concurrency as u64));

        group.bench_function(format!("get_user/x{concurrency}"), |b| {
            b.to_async(&rt)
                .iter(|| fan_out(client.clone(), concurrency, get_user));
        });

        group.bench_function(format!("list_users/x{concurrency}"), |b| {
            b.to_async(&rt)
                .iter(|| fan_out(client.clone(), concurrency, list_users));
        });

        group.bench_function(format!("chat/x{concurrency}"), |b| {
            b.to_async(&rt)
                .iter(|| fan_out(client.clone(), concurrency, chat));
        });
    }
    group.finish();
}

async fn fan_out<F, Fut>(client: UserServiceClient<Channel>, concurrency: usize, call: F)
where
    F: Fn(UserServiceClient<Channel>) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut tasks: FuturesUnordered<_> = (0..concurrency).map(|_| call(client.clone())).collect();
    while tasks.next().await.is_some() {}
}

async fn get_user(mut client: UserServiceClient<Channel>) {
    client
        .get_user(UserRequest { id: 1 })
        .await
        .expect("GetUser failed");
}

async fn list_users(mut client: UserServiceClient<Channel>) {
    let mut stream = client
        .list_users(())
        .await
        .expect("ListUsers failed")
        .into_inner();
    while stream.message().await.expect("stream error").is_some() {}
}

async fn chat(mut client: UserServiceClient<Channel>) {
    let outbound = (0..8).map(|i| ChatMessage {
        sender: "Client".to_string(),
        text: format!("message {i}"),
    });
    let mut replies = client
        .chat(tokio_stream::iter(outbound.collect::<Vec<_>>()))
        .await
        .expect("Chat failed")
        .into_inner();
    while replies.message().await.expect("stream error").is_some() {}
}

// Uploading keeps the request side busy instead of the response side.
fn upload_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime");

    let client = start_server(&rt);

    let mut group = c.benchmark_group("upload");
    for batch in [1_i32, 100, 1_000] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(format!("upload_users/{batch}"), |b| {
            b.to_async(&rt).iter(|| {
                let mut client = client.clone();
                async move {
                    let users: Vec<User> = (0..batch)
                        .map(|id| User {
                            id,
                            name: format!("UploadedUser{id}"),
                            is_active: true,
                        })
                        .collect();
                    let summary = client
                        .upload_users(tokio_stream::iter(users))
                        .await
                        .expect("UploadUsers failed")
                        .into_inner();
                    assert_eq!(summary.count, batch);
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, grpc_bench, upload_bench);
criterion_main!(benches);
