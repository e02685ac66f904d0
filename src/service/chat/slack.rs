//! Slack implementation of the chat client.
//!
//! This module provides functionality for interacting with Slack:
//! - Receiving `app_mention` events over socket mode
//! - Reading thread history and resolving user names
//! - Sending public and ephemeral thread replies

use crate::{
    base::{
        config::Config,
        types::{HistoryMessage, MentionEvent, Res, Void},
    },
    interaction::mention::{MentionPipeline, handle_mention},
    service::llm::LlmClient,
};
use async_trait::async_trait;
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use slack_morphism::{errors::SlackClientError, prelude::*};
use tokio_util::task::TaskTracker;
use tracing::{info, instrument, warn};

use std::sync::Arc;

use super::{ChatClient, ChatError, GenericChatClient};

// Type aliases.

type FullClient = slack_morphism::SlackClient<SlackClientHyperConnector<HttpsConnector<HttpConnector>>>;

/// Upper bound on `conversations.replies` pages read for one thread.
const MAX_HISTORY_PAGES: usize = 20;

/// Page size for `conversations.replies`.
const HISTORY_PAGE_SIZE: u16 = 200;

// Extra methods on `ChatClient` applied by the slack implementation.

impl ChatClient {
    /// Creates a new Slack chat client.
    pub async fn slack(config: &Config, llm: LlmClient) -> Res<Self> {
        let client = SlackChatClient::new(config, llm).await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

impl From<SlackChatClient> for ChatClient {
    fn from(client: SlackChatClient) -> Self {
        Self { inner: Arc::new(client) }
    }
}

// Structs.

/// User state for the slack socket client.
struct SlackUserState {
    pipeline: MentionPipeline,
    tracker: TaskTracker,
    bot_user_id: String,
}

/// Slack client implementation.
#[derive(Clone)]
struct SlackChatClient {
    pub app_token: SlackApiToken,
    pub bot_token: SlackApiToken,
    pub bot_user_id: String,
    pub client: Arc<FullClient>,
    pub config: Config,
    pub llm: LlmClient,
}

impl SlackChatClient {
    /// Create a new Slack chat client.
    #[instrument(name = "SlackChatClient::new", skip_all)]
    pub async fn new(config: &Config, llm: LlmClient) -> Res<Self> {
        // Initialize tokens.

        let app_token = SlackApiToken::new(SlackApiTokenValue(config.slack_app_token.clone()));
        let bot_token = SlackApiToken::new(SlackApiTokenValue(config.slack_bot_token.clone()));

        // Initialize the Slack client.

        let https_connector = HttpsConnector::<HttpConnector>::builder().with_native_roots()?.https_only().enable_all_versions().build();
        let connector = SlackClientHyperConnector::with_connector(https_connector);
        let client = Arc::new(slack_morphism::SlackClient::new(connector));

        // Get the bot's user ID.

        let session = client.open_session(&bot_token);
        let bot_user = session.auth_test().await?;
        let bot_user_id = bot_user.user_id.0;

        info!("Slack bot user ID: {}", bot_user_id);

        Ok(Self {
            app_token,
            bot_token,
            bot_user_id,
            client,
            config: config.clone(),
            llm,
        })
    }

    fn session(&self) -> SlackClientSession<'_, SlackClientHyperConnector<HttpsConnector<HttpConnector>>> {
        self.client.open_session(&self.bot_token)
    }
}

#[async_trait]
impl GenericChatClient for SlackChatClient {
    fn bot_user_id(&self) -> &str {
        &self.bot_user_id
    }

    async fn start(&self) -> Void {
        // Initialize the socket mode listener.

        let socket_mode_callbacks = SlackSocketModeListenerCallbacks::new()
            .with_command_events(handle_command_event)
            .with_interaction_events(handle_interaction_event)
            .with_push_events(handle_push_event);

        // Initialize the socket mode listener environment.

        let tracker = TaskTracker::new();
        let pipeline = MentionPipeline::new(self.config.clone(), ChatClient::from(self.clone()), self.llm.clone());

        let listener_environment = Arc::new(SlackClientEventsListenerEnvironment::new(self.client.clone()).with_user_state(SlackUserState {
            pipeline,
            tracker: tracker.clone(),
            bot_user_id: self.bot_user_id.clone(),
        }));

        let socket_mode_listener = Arc::new(SlackClientSocketModeListener::new(
            &SlackClientSocketModeConfig::new(),
            listener_environment.clone(),
            socket_mode_callbacks,
        ));

        // Register an app token to listen for events,
        socket_mode_listener.listen_for(&self.app_token).await?;

        // Start WS connections calling Slack API to get WS url for the token,
        // and wait for Ctrl-C to shutdown.
        socket_mode_listener.serve().await;

        // Let in-flight runs post their replies before returning.
        tracker.close();
        info!("Waiting for {} in-flight mention runs ...", tracker.len());
        tracker.wait().await;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_thread_history(&self, channel_id: &str, thread_ts: &str) -> Result<Vec<HistoryMessage>, ChatError> {
        let session = self.session();

        let mut messages = Vec::new();
        let mut cursor: Option<SlackCursorId> = None;

        for _ in 0..MAX_HISTORY_PAGES {
            let request = SlackApiConversationsRepliesRequest::new(SlackChannelId(channel_id.to_string()), SlackTs(thread_ts.to_string()))
                .with_inclusive(true)
                .with_limit(HISTORY_PAGE_SIZE)
                .opt_cursor(cursor.take());

            let response = session.conversations_replies(&request).await.map_err(classify_slack_error)?;

            messages.extend(response.messages.into_iter().map(|m| HistoryMessage {
                user_id: m.sender.user.map(|u| u.0),
                bot_id: m.sender.bot_id.map(|b| b.0),
                text: m.content.text.unwrap_or_default(),
                ts: m.origin.ts.0,
            }));

            cursor = response.response_metadata.and_then(|meta| meta.next_cursor).filter(|c| !c.0.is_empty());

            if cursor.is_none() {
                return Ok(messages);
            }
        }

        warn!("Thread {} has more than {} pages; summarizing the first {} messages", thread_ts, MAX_HISTORY_PAGES, messages.len());

        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn get_user_name(&self, user_id: &str) -> Option<String> {
        let request = SlackApiUsersInfoRequest::new(SlackUserId(user_id.to_string()));

        match self.session().users_info(&request).await {
            Ok(response) => user_display_name(&response.user),
            Err(err) => {
                // Usually `missing_scope` (no `users:read`); callers fall back to the ID.
                warn!("Could not resolve user {}: {}", user_id, err);
                None
            }
        }
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, thread_ts: &str, text: &str) -> Result<(), ChatError> {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let request = SlackApiChatPostMessageRequest::new(SlackChannelId(channel_id.to_string()), message)
            .with_thread_ts(SlackTs(thread_ts.to_string()))
            .with_link_names(true);

        self.session().chat_post_message(&request).await.map_err(classify_slack_error)?;

        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_ephemeral(&self, channel_id: &str, thread_ts: &str, user_id: &str, text: &str) -> Result<(), ChatError> {
        let message = SlackMessageContent::new().with_text(text.to_string());

        let request = SlackApiChatPostEphemeralRequest::new(SlackChannelId(channel_id.to_string()), SlackUserId(user_id.to_string()), message)
            .with_thread_ts(SlackTs(thread_ts.to_string()));

        self.session().chat_post_ephemeral(&request).await.map_err(classify_slack_error)?;

        Ok(())
    }
}

// Helpers.

/// Prefer the real name, then the display name, then the handle.
fn user_display_name(user: &SlackUser) -> Option<String> {
    let profile = user.profile.as_ref();

    profile
        .and_then(|p| p.real_name.clone())
        .filter(|n| !n.trim().is_empty())
        .or_else(|| profile.and_then(|p| p.display_name.clone()).filter(|n| !n.trim().is_empty()))
        .or_else(|| user.name.clone().filter(|n| !n.trim().is_empty()))
}

/// Map a Slack client error onto the chat error categories.
fn classify_slack_error(err: SlackClientError) -> ChatError {
    match err {
        SlackClientError::ApiError(api) => classify_slack_api_code(&api.code),
        SlackClientError::RateLimitError(e) => ChatError::RateLimited(e.to_string()),
        other => ChatError::Transport(other.to_string()),
    }
}

fn classify_slack_api_code(code: &str) -> ChatError {
    match code {
        "missing_scope" | "not_in_channel" | "not_authed" | "invalid_auth" | "account_inactive" | "token_revoked" | "token_expired" | "no_permission"
        | "access_denied" | "restricted_action" | "ekm_access_denied" => ChatError::Permission(code.to_string()),
        "channel_not_found" | "thread_not_found" | "message_not_found" | "user_not_found" | "user_not_in_channel" | "is_archived" => {
            ChatError::NotFound(code.to_string())
        }
        "ratelimited" | "rate_limited" => ChatError::RateLimited(code.to_string()),
        "internal_error" | "fatal_error" | "service_unavailable" | "request_timeout" => ChatError::Transport(code.to_string()),
        _ => ChatError::Api(code.to_string()),
    }
}

/// Build a mention event from a Slack `app_mention`.
fn mention_event_from_slack(event: SlackAppMentionEvent) -> MentionEvent {
    MentionEvent {
        channel_id: event.channel.0,
        thread_ts: event.origin.thread_ts.map(|ts| ts.0),
        sender_id: event.user.0,
        raw_text: event.content.text.unwrap_or_default(),
        ts: event.origin.ts.0,
    }
}

// Socket mode listener callbacks for Slack.

/// Handles command events from Slack.
async fn handle_command_event(
    event: SlackCommandEvent,
    _client: Arc<SlackHyperClient>,
    _states: SlackClientEventsUserState,
) -> Result<SlackCommandEventResponse, Box<dyn std::error::Error + Send + Sync>> {
    warn!("[COMMAND] {:#?}", event);
    Ok(SlackCommandEventResponse::new(
        SlackMessageContent::new().with_text("No app commands are supported. Mention me with `summarize thread` instead.".into()),
    ))
}

/// Handles interaction events from Slack.
async fn handle_interaction_event(event: SlackInteractionEvent, _client: Arc<SlackHyperClient>, _states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    warn!("[INTERACTION] {:#?}", event);
    Ok(())
}

/// Handles push events from Slack.
#[instrument(skip_all)]
async fn handle_push_event(event_callback: SlackPushEventCallback, _client: Arc<SlackHyperClient>, states: SlackClientEventsUserState) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let event = event_callback.event;
    let states = states.read().await;
    let user_state = states.get_user_state::<SlackUserState>().ok_or(anyhow::anyhow!("Failed to get user state"))?;

    match event {
        SlackEventCallbackBody::AppMention(slack_app_mention_event) => {
            info!("Received app mention event ...");

            if slack_app_mention_event.user.0 == user_state.bot_user_id {
                warn!("Skipping app mention event sent by the bot itself.");
                return Ok(());
            }

            let event = mention_event_from_slack(slack_app_mention_event);
            handle_mention(event, user_state.pipeline.clone(), &user_state.tracker);
        }
        _ => {
            warn!("Received unhandled push event.")
        }
    }

    Ok(())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_slack_api_codes() {
        assert_eq!(classify_slack_api_code("missing_scope"), ChatError::Permission("missing_scope".to_string()));
        assert_eq!(classify_slack_api_code("not_in_channel"), ChatError::Permission("not_in_channel".to_string()));
        assert_eq!(classify_slack_api_code("thread_not_found"), ChatError::NotFound("thread_not_found".to_string()));
        assert_eq!(classify_slack_api_code("ratelimited"), ChatError::RateLimited("ratelimited".to_string()));
        assert_eq!(classify_slack_api_code("internal_error"), ChatError::Transport("internal_error".to_string()));
        assert_eq!(classify_slack_api_code("msg_too_long"), ChatError::Api("msg_too_long".to_string()));
    }

    #[test]
    fn test_mention_event_from_slack() {
        let event: SlackAppMentionEvent = serde_json::from_value(serde_json::json!({
            "type": "app_mention",
            "user": "U54321",
            "text": "<@U12345> summarize thread",
            "ts": "1700000100.000200",
            "thread_ts": "1700000000.000100",
            "channel": "C01TEST",
            "event_ts": "1700000100.000200",
        }))
        .unwrap();

        let mention = mention_event_from_slack(event);

        assert_eq!(mention.channel_id, "C01TEST");
        assert_eq!(mention.sender_id, "U54321");
        assert_eq!(mention.raw_text, "<@U12345> summarize thread");
        assert_eq!(mention.ts, "1700000100.000200");
        assert_eq!(mention.thread_ts.as_deref(), Some("1700000000.000100"));
    }

    #[test]
    fn test_mention_event_from_top_level_slack_message() {
        let event: SlackAppMentionEvent = serde_json::from_value(serde_json::json!({
            "type": "app_mention",
            "user": "U54321",
            "text": "<@U12345> thread summary me only",
            "ts": "1700000100.000200",
            "channel": "C01TEST",
            "event_ts": "1700000100.000200",
        }))
        .unwrap();

        assert_eq!(mention_event_from_slack(event).thread_ts, None);
    }
}
