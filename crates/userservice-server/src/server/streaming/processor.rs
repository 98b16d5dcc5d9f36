//! Call execution for the four `UserService` RPC shapes.
//!
//! The pure contract (`get_user`, `list_users`, `echo`) is kept separate
//! from the channel plumbing (`stream_users`, `upload_users`, `chat`) so each
//! behavior can be exercised without a transport. [`handle_call`] is the
//! entry point used by pool workers.

use super::request::{Call, OutboundSender};
use crate::server::telemetry::{increment_call_errors, increment_messages_streamed};
use futures::{Stream, StreamExt};
use tonic::Status;
use userservice_core::{
    Error,
    proto::{ChatMessage, UploadSummary, User, UserRequest, UserResponse},
    types::{ECHO_PREFIX, LIST_USERS_COUNT, PLACEHOLDER_NAME, SERVER_SENDER},
};

/// Builds the unary response: the requested id echoed back as an active
/// placeholder user.
pub fn get_user(request: &UserRequest) -> UserResponse {
    UserResponse {
        user: Some(User {
            id: request.id,
            name: PLACEHOLDER_NAME.to_string(),
            is_active: true,
        }),
    }
}

/// The fixed listing served by `ListUsers`: ids `1..=3`, odd ids active.
pub fn list_users() -> impl Iterator<Item = User> {
    (1..=LIST_USERS_COUNT).map(|id| User {
        id,
        name: format!("User {id}"),
        is_active: id % 2 == 1,
    })
}

/// The server's reply to one inbound chat message.
pub fn echo(msg: &ChatMessage) -> ChatMessage {
    ChatMessage {
        sender: SERVER_SENDER.to_string(),
        text: format!("{ECHO_PREFIX}{}", msg.text),
    }
}

/// Sends the [`list_users`] listing down `tx`, one message at a time.
///
/// Returns the number of users delivered, or [`Error::RequestCancelled`] if
/// the client stopped listening before the listing completed.
pub async fn stream_users(tx: &OutboundSender<User>) -> Result<usize, Error> {
    let mut sent = 0;
    for user in list_users() {
        if tx.send(Ok(user)).await.is_err() {
            return Err(Error::RequestCancelled);
        }
        sent += 1;
    }
    Ok(sent)
}

/// Drains an uploaded user stream and counts what arrived.
///
/// Items are accepted as they are; the first transport error ends the upload
/// and is returned to the caller unchanged.
pub async fn upload_users<S>(mut users: S) -> Result<UploadSummary, Status>
where
    S: Stream<Item = Result<User, Status>> + Unpin,
{
    let mut count: i32 = 0;
    while let Some(user) = users.next().await {
        let user = user?;
        tracing::info!("Received user: {}", user.name);
        count = count.saturating_add(1);
    }
    Ok(UploadSummary { count })
}

/// Echoes every inbound chat message, strictly one reply per message.
///
/// Each reply is sent before the next inbound message is read. Returns the
/// number of replies sent; a closed outbound channel or an inbound transport
/// error abandons the conversation with [`Error::RequestCancelled`].
pub async fn chat<S>(mut inbound: S, tx: &OutboundSender<ChatMessage>) -> Result<usize, Error>
where
    S: Stream<Item = Result<ChatMessage, Status>> + Unpin,
{
    let mut replies = 0;
    while let Some(msg) = inbound.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(status) => {
                tracing::debug!("Chat inbound stream failed: {status}");
                return Err(Error::RequestCancelled);
            }
        };
        tracing::info!("{}: {}", msg.sender, msg.text);

        if tx.send(Ok(echo(&msg))).await.is_err() {
            return Err(Error::RequestCancelled);
        }
        replies += 1;
    }
    Ok(replies)
}

/// Runs a dispatched call to completion on the current worker.
///
/// Cancellation by the client is not an error from the server's point of
/// view: the call is abandoned, logged at debug level and counted.
pub async fn handle_call(worker_id: usize, call: Call) {
    let rpc = call.name();
    tracing::trace!("Worker {worker_id} handling {rpc}");

    match call {
        Call::GetUser { request, response } => {
            if response.send(Ok(get_user(&request))).is_err() {
                tracing::debug!("Worker {worker_id}: GetUser caller went away");
                increment_call_errors(rpc);
            }
        }
        Call::ListUsers { tx } => match stream_users(&tx).await {
            Ok(sent) => increment_messages_streamed(rpc, sent as u64),
            Err(e) => {
                tracing::debug!("Worker {worker_id}: ListUsers abandoned: {e}");
                increment_call_errors(rpc);
            }
        },
        Call::UploadUsers { users, response } => {
            let summary = upload_users(users).await;
            match &summary {
                Ok(summary) => increment_messages_streamed(rpc, summary.count as u64),
                Err(status) => {
                    tracing::debug!("Worker {worker_id}: UploadUsers abandoned: {status}");
                    increment_call_errors(rpc);
                }
            }
            if response.send(summary).is_err() {
                tracing::debug!("Worker {worker_id}: UploadUsers caller went away");
            }
        }
        Call::Chat { inbound, tx } => match chat(inbound, &tx).await {
            Ok(replies) => increment_messages_streamed(rpc, replies as u64),
            Err(e) => {
                tracing::debug!("Worker {worker_id}: Chat abandoned: {e}");
                increment_call_errors(rpc);
            }
        },
    }
}
