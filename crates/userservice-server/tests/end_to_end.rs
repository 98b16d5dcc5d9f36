use core::time::Duration;
use prost::Message;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_stream::{StreamExt, wrappers::TcpListenerStream};
use tonic::{Code, transport::Channel};
use tonic_health::pb::{
    HealthCheckRequest, health_check_response::ServingStatus, health_client::HealthClient,
};
use tonic_reflection::pb::v1::{
    ServerReflectionRequest, server_reflection_client::ServerReflectionClient,
    server_reflection_request::MessageRequest, server_reflection_response::MessageResponse,
};
use userservice_core::proto::{
    ChatMessage, User, UserRequest, user_service_client::UserServiceClient,
};
use userservice_server::server::{config::ServerConfig, host::serve_with_incoming};

struct TestServer {
    channel: Channel,
    client: UserServiceClient<Channel>,
    stop: oneshot::Sender<()>,
    handle: JoinHandle<anyhow::Result<()>>,
}

impl TestServer {
    async fn start(num_workers: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ServerConfig {
            server_addr: addr.to_string(),
            num_workers,
            queue_depth: 16,
            stream_buffer_size: 4,
            shutdown_timeout: Duration::from_secs(1),
        };

        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve_with_incoming(
            TcpListenerStream::new(listener),
            config,
            async {
                let _ = stopped.await;
            },
        ));

        let channel = connect(addr).await;
        let client = UserServiceClient::new(channel.clone());

        Self {
            channel,
            client,
            stop,
            handle,
        }
    }

    async fn stop(self) {
        let Self {
            channel,
            client,
            stop,
            handle,
        } = self;
        drop(client);
        drop(channel);
        let _ = stop.send(());
        handle.await.unwrap().unwrap();
    }
}

async fn connect(addr: std::net::SocketAddr) -> Channel {
    Channel::from_shared(format!("http://{addr}"))
        .unwrap()
        .connect()
        .await
        .unwrap()
}

async fn health_of(health: &mut HealthClient<Channel>) -> ServingStatus {
    health
        .check(HealthCheckRequest {
            service: "users.UserService".to_string(),
        })
        .await
        .unwrap()
        .into_inner()
        .status()
}

fn uploaded(n: i32) -> Vec<User> {
    (0..n)
        .map(|id| User {
            id,
            name: format!("UploadedUser{id}"),
            is_active: true,
        })
        .collect()
}

fn said(text: &str) -> ChatMessage {
    ChatMessage {
        sender: "Client".to_string(),
        text: text.to_string(),
    }
}

#[tokio::test]
async fn get_user_returns_requested_identifier() {
    let mut server = TestServer::start(2).await;

    let user = server
        .client
        .get_user(UserRequest { id: 1 })
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap();
    assert_eq!(
        user,
        User {
            id: 1,
            name: "Alice".to_string(),
            is_active: true,
        }
    );

    for id in [0, 17, -3, i32::MAX] {
        let user = server
            .client
            .get_user(UserRequest { id })
            .await
            .unwrap()
            .into_inner()
            .user
            .unwrap();
        assert_eq!(user.id, id);
        assert!(user.is_active);
    }

    server.stop().await;
}

#[tokio::test]
async fn get_user_is_idempotent() {
    let mut server = TestServer::start(2).await;

    let first = server
        .client
        .get_user(UserRequest { id: 42 })
        .await
        .unwrap()
        .into_inner();
    let second = server
        .client
        .get_user(UserRequest { id: 42 })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(first.encode_to_vec(), second.encode_to_vec());

    server.stop().await;
}

#[tokio::test]
async fn list_users_streams_three_in_order() {
    let mut server = TestServer::start(2).await;

    let users: Vec<User> = server
        .client
        .list_users(())
        .await
        .unwrap()
        .into_inner()
        .map(|user| user.unwrap())
        .collect()
        .await;

    let ids: Vec<_> = users.iter().map(|u| u.id).collect();
    let active: Vec<_> = users.iter().map(|u| u.is_active).collect();
    assert_eq!(ids, [1, 2, 3]);
    assert_eq!(active, [true, false, true]);

    server.stop().await;
}

#[tokio::test]
async fn upload_users_counts_received_items() {
    let mut server = TestServer::start(2).await;

    for n in [0, 1, 3] {
        let summary = server
            .client
            .upload_users(tokio_stream::iter(uploaded(n)))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(summary.count, n);
    }

    server.stop().await;
}

#[tokio::test]
async fn chat_echoes_each_message_in_order() {
    let mut server = TestServer::start(2).await;

    let outbound = ["Hi", "How are you?", "Goodbye!"].map(said);
    let replies: Vec<ChatMessage> = server
        .client
        .chat(tokio_stream::iter(outbound))
        .await
        .unwrap()
        .into_inner()
        .map(|reply| reply.unwrap())
        .collect()
        .await;

    assert_eq!(
        replies,
        [
            ChatMessage {
                sender: "Server".to_string(),
                text: "Echo: Hi".to_string(),
            },
            ChatMessage {
                sender: "Server".to_string(),
                text: "Echo: How are you?".to_string(),
            },
            ChatMessage {
                sender: "Server".to_string(),
                text: "Echo: Goodbye!".to_string(),
            },
        ]
    );

    server.stop().await;
}

#[tokio::test]
async fn chat_replies_before_next_message_is_sent() {
    let mut server = TestServer::start(2).await;

    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let mut replies = server
        .client
        .chat(tokio_stream::wrappers::ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();

    for text in ["one", "two", "three"] {
        tx.send(said(text)).await.unwrap();
        let reply = replies.message().await.unwrap().unwrap();
        assert_eq!(reply.text, format!("Echo: {text}"));
    }

    drop(tx);
    assert!(replies.message().await.unwrap().is_none());

    server.stop().await;
}

#[tokio::test]
async fn calls_queue_behind_a_busy_pool() {
    let mut server = TestServer::start(1).await;

    // Hold the single worker with an open chat.
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let mut replies = server
        .client
        .chat(tokio_stream::wrappers::ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    tx.send(said("hold")).await.unwrap();
    assert_eq!(replies.message().await.unwrap().unwrap().text, "Echo: hold");

    let mut client = server.client.clone();
    let queued = tokio::spawn(async move { client.get_user(UserRequest { id: 9 }).await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!queued.is_finished());

    drop(tx);
    assert!(replies.message().await.unwrap().is_none());

    let user = queued.await.unwrap().unwrap().into_inner().user.unwrap();
    assert_eq!(user.id, 9);

    server.stop().await;
}

#[tokio::test]
async fn refuses_new_calls_once_shutdown_starts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let config = ServerConfig {
        server_addr: addr.to_string(),
        num_workers: 1,
        queue_depth: 4,
        stream_buffer_size: 4,
        shutdown_timeout: Duration::from_secs(5),
    };

    let (stop, stopped) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve_with_incoming(
        TcpListenerStream::new(listener),
        config,
        async {
            let _ = stopped.await;
        },
    ));
    let channel = connect(addr).await;
    let mut client = UserServiceClient::new(channel.clone());
    let mut health = HealthClient::new(channel.clone());
    assert_eq!(health_of(&mut health).await, ServingStatus::Serving);

    // An open chat keeps the pool draining, so the server stays up while we
    // probe it.
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    let mut replies = client
        .chat(tokio_stream::wrappers::ReceiverStream::new(rx))
        .await
        .unwrap()
        .into_inner();
    tx.send(said("hold")).await.unwrap();
    replies.message().await.unwrap().unwrap();

    stop.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let status = client
        .get_user(UserRequest { id: 1 })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(health_of(&mut health).await, ServingStatus::NotServing);

    drop(tx);
    assert!(replies.message().await.unwrap().is_none());
    drop(replies);
    drop(client);
    drop(health);
    drop(channel);
    handle.await.unwrap().unwrap();
}

#[tokio::test]
async fn reflection_lists_user_service() {
    let server = TestServer::start(1).await;

    let mut reflection = ServerReflectionClient::new(server.channel.clone());
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(MessageRequest::ListServices(String::new())),
    };
    let response = reflection
        .server_reflection_info(tokio_stream::iter([request]))
        .await
        .unwrap()
        .into_inner()
        .message()
        .await
        .unwrap()
        .unwrap();

    let Some(MessageResponse::ListServicesResponse(list)) = response.message_response else {
        panic!("unexpected reflection response: {:?}", response.message_response);
    };
    assert!(list.service.iter().any(|s| s.name == "users.UserService"));

    drop(reflection);
    server.stop().await;
}
