//! # Contract Constants
//!
//! Fixed values that both ends of the user service agree on. The server uses
//! them to synthesize responses, and the client driver and tests use them to
//! check what comes back.

/// Name given to every user returned by `GetUser`.
pub const PLACEHOLDER_NAME: &str = "Alice";

/// Sender of every outbound `Chat` message.
pub const SERVER_SENDER: &str = "Server";

/// Prefix prepended to the inbound text of each `Chat` echo.
pub const ECHO_PREFIX: &str = "Echo: ";

/// Number of users emitted by `ListUsers`, with ids `1..=LIST_USERS_COUNT`.
pub const LIST_USERS_COUNT: i32 = 3;

/// Listen address used by the server binary by default.
pub const DEFAULT_SERVER_ADDR: &str = "[::]:50051";

/// Endpoint the client driver connects to by default.
pub const DEFAULT_CLIENT_ENDPOINT: &str = "http://localhost:50051";
