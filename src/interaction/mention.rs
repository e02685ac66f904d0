//! The mention pipeline.
//!
//! Every mention runs through the same stages, strictly in order:
//!
//! `Received -> Classified -> ContextReady -> PromptBuilt -> Inferred -> Replied`
//!
//! A failure at any stage jumps to `Failed`, but still dispatches a reply (an error
//! message with the visibility the request would have had), so each mention gets
//! exactly one reply. Only a timed-out inference is retried, and only once.

use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        prompts,
        types::{Intent, MentionEvent, ModelRequest, ModelResponse, ReplyDirective, ThreadContext},
    },
    interaction::{command, context, dispatch::dispatch, error::PipelineError, prompt},
    service::{
        chat::ChatClient,
        llm::{InferenceError, LlmClient},
    },
};

/// Stages of a single mention run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Received,
    Classified,
    ContextReady,
    PromptBuilt,
    Inferred,
    /// Terminal: a model-derived reply was posted.
    Replied,
    /// Terminal: an error reply was posted, or no reply could be posted at all.
    Failed,
}

/// What happened to a mention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub intent: Intent,
    /// Either [`RunState::Replied`] or [`RunState::Failed`].
    pub state: RunState,
    /// The reply that was dispatched (or attempted).
    pub directive: ReplyDirective,
    /// The stage failure the reply reports, if any.
    pub failure: Option<PipelineError>,
    /// Set when the platform refused the reply itself.
    pub dispatch_failure: Option<PipelineError>,
}

/// Drives one mention from classification to reply.
///
/// It is designed to be trivially cloneable; runs share nothing mutable.
#[derive(Clone)]
pub struct MentionPipeline {
    config: Config,
    chat: ChatClient,
    llm: LlmClient,
}

impl MentionPipeline {
    pub fn new(config: Config, chat: ChatClient, llm: LlmClient) -> Self {
        Self { config, chat, llm }
    }

    /// Run every stage up to dispatch, and return the one reply for `event`.
    pub async fn handle(&self, event: &MentionEvent) -> ReplyDirective {
        self.prepare(event).await.0
    }

    /// Run every stage, dispatch the reply, and report the outcome.
    ///
    /// A dispatch failure is logged and reported, never retried.
    #[instrument(name = "MentionPipeline::process", skip_all, fields(channel_id = %event.channel_id, sender_id = %event.sender_id, ts = %event.ts))]
    pub async fn process(&self, event: MentionEvent) -> RunReport {
        let (directive, intent, failure) = self.prepare(&event).await;

        let dispatch_failure = match dispatch(&self.chat, &directive).await {
            Ok(()) => None,
            Err(err) => {
                error!("Could not post the reply to mention {}: {}", event.ts, err);
                Some(err)
            }
        };

        let state = if failure.is_none() && dispatch_failure.is_none() { RunState::Replied } else { RunState::Failed };
        enter(state);

        RunReport {
            intent,
            state,
            directive,
            failure,
            dispatch_failure,
        }
    }

    /// Classify, then run the remaining stages, turning any failure into an error reply.
    async fn prepare(&self, event: &MentionEvent) -> (ReplyDirective, Intent, Option<PipelineError>) {
        enter(RunState::Received);

        let intent = command::classify(&event.raw_text);
        enter(RunState::Classified);
        info!("Mention classified as {:?}", intent);

        match self.run(event, intent).await {
            Ok(body) => (ReplyDirective::to_event(event, intent.visibility(), body), intent, None),
            Err(err) => {
                warn!("Mention run failed: {}", err);
                (ReplyDirective::to_event(event, intent.visibility(), err.user_message()), intent, Some(err))
            }
        }
    }

    async fn run(&self, event: &MentionEvent, intent: Intent) -> Result<String, PipelineError> {
        let context = self.gather_context(event, intent).await?;
        enter(RunState::ContextReady);

        let question = command::clean_mention_text(&event.raw_text);
        let request = prompt::build(&self.config, intent, &context, &question);
        enter(RunState::PromptBuilt);

        let response = self.infer(&request).await?;
        enter(RunState::Inferred);
        info!("Generated {} characters with model `{}`", response.text.len(), response.model);

        if response.text.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }

        Ok(match intent {
            Intent::PublicSummary | Intent::PrivateSummary => prompts::frame_summary(&response.text),
            Intent::GeneralChat => response.text,
        })
    }

    /// Summaries need the thread; general chat takes a trailing window when configured, best-effort.
    async fn gather_context(&self, event: &MentionEvent, intent: Intent) -> Result<ThreadContext, PipelineError> {
        if intent.requires_thread() {
            let context = context::fetch(&self.chat, &event.channel_id, event.thread_ts.as_deref(), Some(&event.ts)).await?;

            if context.is_empty() {
                return Err(PipelineError::NoThread);
            }

            return Ok(context);
        }

        let window = self.config.chat_context_window;
        if window == 0 || event.thread_ts.is_none() {
            return Ok(ThreadContext::default());
        }

        match context::fetch(&self.chat, &event.channel_id, event.thread_ts.as_deref(), Some(&event.ts)).await {
            Ok(context) => Ok(context.tail(window)),
            Err(err) => {
                warn!("Continuing without chat context: {}", err);
                Ok(ThreadContext::default())
            }
        }
    }

    /// Invoke the model, retrying exactly once if (and only if) the first attempt timed out.
    async fn infer(&self, request: &ModelRequest) -> Result<ModelResponse, InferenceError> {
        match self.llm.invoke(request).await {
            Err(InferenceError::Timeout(after)) => {
                warn!("Inference timed out after {:?}; retrying once", after);
                self.llm.invoke(request).await
            }
            result => result,
        }
    }
}

fn enter(state: RunState) {
    debug!(?state, "Mention run advanced");
}

/// Handles a mention event.
///
/// The run is spawned on `tracker`, so shutdown can wait for in-flight runs to post their reply.
#[instrument(skip_all)]
pub fn handle_mention(event: MentionEvent, pipeline: MentionPipeline, tracker: &TaskTracker) {
    tracker.spawn(
        async move {
            // Process the event.
            let report = pipeline.process(event).in_current_span().await;

            // Log the outcome.
            match (&report.failure, &report.dispatch_failure) {
                (_, Some(err)) => error!("Mention run ended without a reply: {}", err),
                (Some(err), None) => warn!("Mention run replied with an error message: {}", err),
                (None, None) => info!("Mention run replied."),
            }
        }
        .in_current_span(),
    );
}
