//! Request-scoped logging context.
//!
//! Each chat request runs inside a [`REQUEST_ID`] scope so that any log line,
//! including those emitted from the spawned relay task, can be correlated with
//! the `x-request-id` header returned to the client.

tokio::task_local! {
    /// Request ID of the chat request the current task works for.
    pub static REQUEST_ID: String;
}

/// Header used to propagate the request ID to and from clients.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Longest client-supplied request ID that is echoed back.
pub const MAX_REQUEST_ID_LEN: usize = 128;

/// Request ID of the enclosing scope, if any.
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Request ID of the enclosing scope, or a fresh one outside any scope.
///
/// The relay task is spawned with this ID so its logs line up with the handler's.
pub fn request_id_or_new() -> String {
    current_request_id().unwrap_or_else(generate_request_id)
}

/// Accept a client-supplied ID when it is non-blank and short enough to echo.
pub fn accept_request_id(raw: &str) -> Option<String> {
    let id = raw.trim();
    (!id.is_empty() && id.len() <= MAX_REQUEST_ID_LEN).then(|| id.to_string())
}

pub fn generate_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
