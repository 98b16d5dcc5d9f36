//! The fixed demo sequence: one call of each RPC shape, printed to stdout.
//!
//! Each step is independent. A failed step is reported and the remaining
//! steps still run; [`run`] returns how many steps failed.

use tokio_stream::StreamExt;
use tonic::transport::Channel;
use userservice_core::proto::{
    ChatMessage, User, UserRequest, user_service_client::UserServiceClient,
};

type Client = UserServiceClient<Channel>;

/// Texts sent on the `Chat` step, in order.
pub const CHAT_SCRIPT: [&str; 3] = ["Hi", "How are you?", "Goodbye!"];

/// Users sent on the `UploadUsers` step.
pub fn upload_batch() -> Vec<User> {
    (0..3)
        .map(|i| User {
            id: i,
            name: format!("UploadedUser{i}"),
            is_active: true,
        })
        .collect()
}

/// Messages sent on the `Chat` step.
pub fn chat_script() -> Vec<ChatMessage> {
    CHAT_SCRIPT
        .iter()
        .map(|text| ChatMessage {
            sender: "Client".to_string(),
            text: (*text).to_string(),
        })
        .collect()
}

fn describe(user: &User) -> String {
    format!("User: {}, {}, Active={}", user.id, user.name, user.is_active)
}

/// Runs every step in order and returns the number that failed.
pub async fn run(client: &mut Client) -> usize {
    let mut failures = 0;

    println!("\n=== Unary RPC: GetUser ===");
    if let Err(e) = get_user(client).await {
        tracing::error!("GetUser failed: {e:#}");
        failures += 1;
    }

    println!("\n=== Server Streaming RPC: ListUsers ===");
    if let Err(e) = list_users(client).await {
        tracing::error!("ListUsers failed: {e:#}");
        failures += 1;
    }

    println!("\n=== Client Streaming RPC: UploadUsers ===");
    if let Err(e) = upload_users(client).await {
        tracing::error!("UploadUsers failed: {e:#}");
        failures += 1;
    }

    println!("\n=== Bidirectional Streaming RPC: Chat ===");
    if let Err(e) = chat(client).await {
        tracing::error!("Chat failed: {e:#}");
        failures += 1;
    }

    failures
}

async fn get_user(client: &mut Client) -> anyhow::Result<()> {
    let response = client.get_user(UserRequest { id: 1 }).await?.into_inner();
    let user = response
        .user
        .ok_or_else(|| anyhow::anyhow!("response carried no user"))?;
    println!("{}", describe(&user));
    Ok(())
}

async fn list_users(client: &mut Client) -> anyhow::Result<()> {
    let mut users = client.list_users(()).await?.into_inner();
    while let Some(user) = users.next().await {
        println!("{}", describe(&user?));
    }
    Ok(())
}

async fn upload_users(client: &mut Client) -> anyhow::Result<()> {
    let summary = client
        .upload_users(tokio_stream::iter(upload_batch()))
        .await?
        .into_inner();
    println!("Uploaded {} users", summary.count);
    Ok(())
}

async fn chat(client: &mut Client) -> anyhow::Result<()> {
    let mut replies = client
        .chat(tokio_stream::iter(chat_script()))
        .await?
        .into_inner();
    while let Some(reply) = replies.next().await {
        println!("Server replied: {}", reply?.text);
    }
    Ok(())
}
