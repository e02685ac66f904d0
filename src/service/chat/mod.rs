pub mod slack;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{HistoryMessage, Void};

// Errors.

/// Failures reported by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChatError {
    /// Missing scopes, not a channel member, bad credentials, etc.
    #[error("permission denied by chat platform: {0}")]
    Permission(String),
    /// The channel, thread, or message does not exist (anymore).
    #[error("not found on chat platform: {0}")]
    NotFound(String),
    #[error("rate limited by chat platform: {0}")]
    RateLimited(String),
    /// The request never got a well-formed answer.
    #[error("chat platform transport failure: {0}")]
    Transport(String),
    /// Any other error code returned by the platform API.
    #[error("chat platform API error: {0}")]
    Api(String),
}

impl ChatError {
    /// Whether repeating the same call later could succeed without outside intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::RateLimited(_) | ChatError::Transport(_))
    }
}

// Traits.

/// Generic "chat" trait that clients must implement.
///
/// This trait defines the calls the mention pipeline needs from a chat platform
/// like Slack. Implementing this trait allows different chat services to be used
/// with the mention-bot.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Get the bot user ID.
    ///
    /// Returns the unique identifier for the bot in the chat platform,
    /// which is used to recognize (and skip) the bot's own messages.
    fn bot_user_id(&self) -> &str;

    /// Start the chat client listener.
    ///
    /// This sets up event listeners for the chat platform and runs a mention
    /// pipeline for every mention, until the listener is shut down.
    async fn start(&self) -> Void;

    /// Get the raw messages of a thread, parent included.
    async fn get_thread_history(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<HistoryMessage>, ChatError>;

    /// Resolve a user ID to a human readable name.
    ///
    /// This is best-effort: `None` when the platform will not say.
    async fn get_user_name(&self, user_id: &str) -> Option<String>;

    /// Send a message, visible to the whole channel, to a thread.
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Result<(), ChatError>;

    /// Send a message to a thread that only `user_id` can see.
    async fn send_ephemeral(&self, channel_id: &str, thread_ts: &str, user_id: &str, text: &str) -> Result<(), ChatError>;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(ChatError::RateLimited("ratelimited".into()).is_retryable());
        assert!(ChatError::Transport("connection reset".into()).is_retryable());
        assert!(!ChatError::Permission("missing_scope".into()).is_retryable());
        assert!(!ChatError::NotFound("thread_not_found".into()).is_retryable());
        assert!(!ChatError::Api("invalid_blocks".into()).is_retryable());
    }
}
