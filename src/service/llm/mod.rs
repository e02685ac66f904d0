pub mod ollama;

use std::{ops::Deref, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::base::types::{ModelRequest, ModelResponse};

// Errors.

/// Failures reported by (or on the way to) the inference engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InferenceError {
    /// The engine could not be reached at all (connection refused, DNS, etc.).
    #[error("inference engine unavailable: {0}")]
    Unavailable(String),
    /// The engine did not answer within the configured bound.
    #[error("inference request timed out after {0:?}")]
    Timeout(Duration),
    /// The engine answered, but not with a usable generation.
    #[error("inference engine error: {0}")]
    Engine(String),
}

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// This trait defines the core functionality for interacting with large language models.
/// Implementing this trait allows different LLM providers to be used with the mention-bot.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Send one request to the engine and return its generation.
    ///
    /// This makes exactly one attempt, bounded by the configured timeout; retry
    /// policy belongs to the caller. The generated text is returned verbatim.
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, InferenceError>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}
