//! Failure categories of a mention run, and what the user is told about each.

use crate::service::{chat::ChatError, llm::InferenceError};

/// Why a mention run did not produce a model-derived reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    /// A summary was requested outside of any thread, or the thread holds nothing to summarize.
    #[error("summarization requested outside of a thread")]
    NoThread,
    /// The platform would not return the thread history.
    #[error("failed to fetch thread context: {0}")]
    ContextFetch(#[source] ChatError),
    #[error(transparent)]
    Inference(#[from] InferenceError),
    /// The engine succeeded, but generated nothing.
    #[error("inference engine returned an empty response")]
    EmptyResponse,
    /// The platform refused the reply itself.
    #[error("failed to dispatch reply: {0}")]
    Dispatch(#[source] ChatError),
}

impl PipelineError {
    /// The concise, non-technical reply text for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            PipelineError::NoThread => NO_THREAD_MESSAGE,
            PipelineError::ContextFetch(_) => CONTEXT_FETCH_MESSAGE,
            PipelineError::Inference(InferenceError::Unavailable(_) | InferenceError::Timeout(_)) => INFERENCE_UNAVAILABLE_MESSAGE,
            PipelineError::Inference(InferenceError::Engine(_)) => INFERENCE_ENGINE_MESSAGE,
            PipelineError::EmptyResponse => EMPTY_RESPONSE_MESSAGE,
            PipelineError::Dispatch(_) => DISPATCH_MESSAGE,
        }
    }
}

const NO_THREAD_MESSAGE: &str = "I can only summarize an existing thread. Mention me with your request from a reply inside the thread you want summarized.";

const CONTEXT_FETCH_MESSAGE: &str = "I couldn't fetch the thread messages. This might be because:\n\
1. I don't have permission to access the channel history\n\
2. The thread is too old or has been deleted\n\
3. There was an error connecting to Slack\n\n\
Please make sure I have the necessary permissions and try again.";

const INFERENCE_UNAVAILABLE_MESSAGE: &str = "The language model is unavailable right now. Please try again later.";

const INFERENCE_ENGINE_MESSAGE: &str = "The language model ran into a problem while generating a response. Please try again later.";

const EMPTY_RESPONSE_MESSAGE: &str = "I couldn't generate a response. Please try rephrasing your question.";

const DISPATCH_MESSAGE: &str = "I couldn't post my reply.";

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_timeout_and_unavailable_share_a_message() {
        let timeout = PipelineError::Inference(InferenceError::Timeout(Duration::from_secs(1)));
        let down = PipelineError::Inference(InferenceError::Unavailable("connection refused".into()));

        assert_eq!(timeout.user_message(), down.user_message());
        assert_ne!(timeout.user_message(), PipelineError::Inference(InferenceError::Engine("oops".into())).user_message());
    }

    #[test]
    fn test_user_messages_are_not_technical() {
        let errors = [
            PipelineError::NoThread,
            PipelineError::ContextFetch(ChatError::Permission("missing_scope".into())),
            PipelineError::Inference(InferenceError::Engine("model 'x' not found".into())),
            PipelineError::EmptyResponse,
        ];

        for error in errors {
            let message = error.user_message();
            assert!(!message.contains("missing_scope"));
            assert!(!message.contains("not found"));
            assert!(!message.is_empty());
        }
    }

    #[test]
    fn test_inference_errors_convert() {
        let err: PipelineError = InferenceError::Timeout(Duration::from_secs(3)).into();

        assert_eq!(err, PipelineError::Inference(InferenceError::Timeout(Duration::from_secs(3))));
        assert_eq!(err.to_string(), "inference request timed out after 3s");
    }
}
