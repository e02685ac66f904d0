//! Shared result aliases and the data that flows through a single mention run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The crate-wide error type.
pub type Err = anyhow::Error;
/// A result carrying the crate-wide error.
pub type Res<T> = Result<T, Err>;
/// A result with no value.
pub type Void = Res<()>;

// Inbound.

/// A single @-mention of the bot, as delivered by the chat platform.
///
/// Consumed once per pipeline run, and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionEvent {
    /// The channel in which the bot was mentioned.
    pub channel_id: String,
    /// The thread the mention was posted in, if any.
    ///
    /// `None` means the mention is a top-level message (and would start a new thread).
    pub thread_ts: Option<String>,
    /// The user who mentioned the bot.
    pub sender_id: String,
    /// The raw message text, including platform markup such as `<@U123>`.
    pub raw_text: String,
    /// The platform timestamp of the mention message itself.
    pub ts: String,
}

impl MentionEvent {
    /// The thread any reply to this mention must be anchored to.
    ///
    /// Top-level mentions anchor to their own timestamp, which starts a thread.
    pub fn reply_thread_ts(&self) -> &str {
        self.thread_ts.as_deref().unwrap_or(&self.ts)
    }
}

// Classification.

/// What the mentioning user asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    /// Summarize the thread for the whole channel.
    PublicSummary,
    /// Summarize the thread for the requester only.
    PrivateSummary,
    /// Answer the message as a question.
    GeneralChat,
}

impl Intent {
    /// Whether this intent needs the thread history to do anything useful.
    pub fn requires_thread(&self) -> bool {
        matches!(self, Intent::PublicSummary | Intent::PrivateSummary)
    }

    /// The visibility every reply for this intent (success or failure) must use.
    pub fn visibility(&self) -> Visibility {
        match self {
            Intent::PrivateSummary => Visibility::EphemeralToSender,
            Intent::PublicSummary | Intent::GeneralChat => Visibility::Public,
        }
    }
}

/// Who gets to see a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    /// An ordinary channel message.
    Public,
    /// A message only the mention sender can see.
    EphemeralToSender,
}

// Context.

/// A raw message as returned by the platform's thread history call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// The authoring user, if the message came from a user.
    pub user_id: Option<String>,
    /// The authoring bot integration, if the message came from a bot.
    pub bot_id: Option<String>,
    /// The message text, still carrying platform markup.
    pub text: String,
    /// The platform timestamp (e.g., `1712345678.000100`).
    pub ts: String,
}

/// A normalized message that is safe to present to the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadMessage {
    /// The authoring user or bot ID.
    pub author_id: String,
    /// The resolved display name of the author.
    pub author_name: String,
    /// The text, with platform markup turned into plain text.
    pub text: String,
    /// When the message was posted.
    pub timestamp: DateTime<Utc>,
}

/// The ordered (non-decreasing by timestamp) messages of a thread, minus the bot's own.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadContext {
    /// Messages, oldest first.
    pub messages: Vec<ThreadMessage>,
}

impl ThreadContext {
    /// Wrap already ordered messages.
    pub fn new(messages: Vec<ThreadMessage>) -> Self {
        Self { messages }
    }

    /// Whether there is nothing to present.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Keep only the last `n` messages.
    pub fn tail(mut self, n: usize) -> Self {
        let skip = self.messages.len().saturating_sub(n);
        self.messages.drain(..skip);
        self
    }
}

// Inference.

/// A fully rendered request for the inference engine.
///
/// `instructions` holds the template (system role); `prompt` holds the delimited
/// data block (user role).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to run.
    pub model: String,
    /// The template, sent with the system role.
    pub instructions: String,
    /// The delimited data, sent with the user role.
    pub prompt: String,
}

/// A successful generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The generated text, verbatim.
    pub text: String,
    /// The model identifier the engine reports having used.
    pub model: String,
}

// Outbound.

/// The one reply a mention run produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyDirective {
    /// The channel to post in.
    pub channel_id: String,
    /// The thread to anchor the reply to.
    pub thread_ts: String,
    /// The user an ephemeral reply is shown to (the mention sender).
    pub recipient_id: String,
    /// Who gets to see the reply.
    pub visibility: Visibility,
    /// The reply text.
    pub body: String,
}

impl ReplyDirective {
    /// Build a reply to `event` anchored to its thread.
    pub fn to_event(event: &MentionEvent, visibility: Visibility, body: impl Into<String>) -> Self {
        Self {
            channel_id: event.channel_id.clone(),
            thread_ts: event.reply_thread_ts().to_string(),
            recipient_id: event.sender_id.clone(),
            visibility,
            body: body.into(),
        }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn event(thread_ts: Option<&str>) -> MentionEvent {
        MentionEvent {
            channel_id: "C1".to_string(),
            thread_ts: thread_ts.map(str::to_string),
            sender_id: "U1".to_string(),
            raw_text: "<@UBOT> hi".to_string(),
            ts: "1700000100.000200".to_string(),
        }
    }

    #[test]
    fn test_reply_anchors_to_existing_thread() {
        let reply = ReplyDirective::to_event(&event(Some("1700000000.000100")), Visibility::Public, "ok");

        assert_eq!(reply.thread_ts, "1700000000.000100");
        assert_eq!(reply.recipient_id, "U1");
    }

    #[test]
    fn test_reply_starts_thread_on_top_level_mention() {
        let reply = ReplyDirective::to_event(&event(None), Visibility::EphemeralToSender, "ok");

        assert_eq!(reply.thread_ts, "1700000100.000200");
        assert_eq!(reply.visibility, Visibility::EphemeralToSender);
    }

    #[test]
    fn test_only_private_summary_is_ephemeral() {
        assert_eq!(Intent::PrivateSummary.visibility(), Visibility::EphemeralToSender);
        assert_eq!(Intent::PublicSummary.visibility(), Visibility::Public);
        assert_eq!(Intent::GeneralChat.visibility(), Visibility::Public);
        assert!(!Intent::GeneralChat.requires_thread());
    }

    #[test]
    fn test_thread_message_serializes_timestamp() {
        let message = ThreadMessage {
            author_id: "U1".to_string(),
            author_name: "Alice".to_string(),
            text: "hello".to_string(),
            timestamp: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["timestamp"], "2023-11-14T22:13:20Z");

        let parsed: ThreadMessage = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_context_tail_keeps_latest() {
        let messages = (0..5)
            .map(|i| ThreadMessage {
                author_id: format!("U{i}"),
                author_name: format!("User {i}"),
                text: format!("message {i}"),
                timestamp: DateTime::from_timestamp(1_700_000_000 + i, 0).unwrap(),
            })
            .collect();

        let tail = ThreadContext::new(messages).tail(2);

        assert_eq!(tail.len(), 2);
        assert_eq!(tail.messages[0].text, "message 3");
        assert_eq!(ThreadContext::default().tail(3).len(), 0);
    }
}
