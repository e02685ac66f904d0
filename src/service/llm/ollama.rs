//! Ollama implementation of the LLM client.
//!
//! Ollama serves an OpenAI-compatible API under `/v1`, so this goes through
//! `async-openai` with the API base pointed at the configured host.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::base::{
    config::Config,
    prompts,
    types::{ModelRequest, ModelResponse},
};

use super::{GenericLlmClient, InferenceError, LlmClient};

// Extra methods on `LlmClient` applied by the ollama implementation.

impl LlmClient {
    pub fn ollama(config: &Config) -> Self {
        let client = OllamaLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }

    /// Send a trivial prompt to make sure the engine is reachable and the model loads.
    #[instrument(name = "LlmClient::probe", skip_all)]
    pub async fn probe(&self, config: &Config) -> Result<ModelResponse, InferenceError> {
        let request = ModelRequest {
            model: config.ollama_model.clone(),
            instructions: String::new(),
            prompt: prompts::STARTUP_PROBE.to_string(),
        };

        self.invoke(&request).await
    }
}

// Specific implementations.

/// Ollama LLM client implementation.
#[derive(Clone)]
pub struct OllamaLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OllamaLlmClient {
    /// Create a new Ollama LLM client.
    #[instrument(name = "OllamaLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let api_base = format!("{}/v1", config.ollama_host.trim_end_matches('/'));

        info!("Using Ollama at {} with model `{}`", api_base, config.ollama_model);

        // Ollama ignores the key, but the client always sends one.
        let cfg = OpenAIConfig::new().with_api_base(api_base).with_api_key("ollama");

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }

    /// Build the chat completion request: instructions as the system message, data as the user message.
    fn build_request(&self, request: &ModelRequest) -> Result<CreateChatCompletionRequest, OpenAIError> {
        let mut messages: Vec<ChatCompletionRequestMessage> = Vec::new();

        if !request.instructions.trim().is_empty() {
            messages.push(ChatCompletionRequestSystemMessageArgs::default().content(request.instructions.clone()).build()?.into());
        }

        messages.push(ChatCompletionRequestUserMessageArgs::default().content(request.prompt.clone()).build()?.into());

        CreateChatCompletionRequestArgs::default()
            .model(&request.model)
            .messages(messages)
            .temperature(self.config.ollama_temperature)
            .build()
    }
}

#[async_trait]
impl GenericLlmClient for OllamaLlmClient {
    #[instrument(name = "OllamaLlmClient::invoke", skip_all, fields(model = %request.model))]
    async fn invoke(&self, request: &ModelRequest) -> Result<ModelResponse, InferenceError> {
        let bound = self.config.inference_timeout();
        let completion = self.build_request(request).map_err(|e| classify_openai_error(e, bound))?;

        let response = match timeout(bound, self.client.chat().create(completion)).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                let err = classify_openai_error(err, bound);
                warn!("Ollama call failed: {}", err);
                return Err(err);
            }
            Err(_) => {
                warn!("Ollama call timed out after {:?}", bound);
                return Err(InferenceError::Timeout(bound));
            }
        };

        parse_response(response)
    }
}

/// Take the first choice's text, verbatim.
pub fn parse_response(response: CreateChatCompletionResponse) -> Result<ModelResponse, InferenceError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| InferenceError::Engine("response contained no choices".to_string()))?;

    if let Some(refusal) = choice.message.refusal {
        return Err(InferenceError::Engine(format!("request refused: {refusal}")));
    }

    Ok(ModelResponse {
        text: choice.message.content.unwrap_or_default(),
        model: response.model,
    })
}

/// Map a client error onto the three failure categories the pipeline distinguishes.
pub fn classify_openai_error(err: OpenAIError, bound: Duration) -> InferenceError {
    match err {
        OpenAIError::Reqwest(e) => classify_transport_error(&e, bound),
        OpenAIError::ApiError(api) => InferenceError::Engine(api.message),
        other => InferenceError::Engine(other.to_string()),
    }
}

fn classify_transport_error(err: &reqwest::Error, bound: Duration) -> InferenceError {
    if err.is_timeout() {
        InferenceError::Timeout(bound)
    } else if let Some(status) = err.status() {
        InferenceError::Engine(format!("HTTP {status}: {err}"))
    } else if err.is_decode() || err.is_body() {
        InferenceError::Engine(err.to_string())
    } else {
        // Connection refused, DNS failures, TLS failures, and resets before any response.
        InferenceError::Unavailable(err.to_string())
    }
}

// Tests.
