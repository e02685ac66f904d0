//! Library root for `mention-bot`.
//!
//! Mention-bot is a Slack assistant backed by a locally hosted Ollama model. When
//! @-mentioned, it:
//! - Summarizes the thread it was mentioned in, for the whole channel (`summarize thread`)
//! - Summarizes the thread privately, for the requester only (`summarize thread private`)
//! - Otherwise, answers the message as a general question
//!
//! Every mention gets exactly one reply, even when Slack or the model fails. The
//! chat platform and the model sit behind traits (see [`service`]), so the
//! pipeline in [`interaction`] can be exercised without any network.

#[deny(missing_docs)]
pub mod base;
pub mod interaction;
pub mod runtime;
pub mod service;

use base::{config::Config, types::Void};
use rustls::crypto;
use tracing::{info, warn};

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the mention-bot runtime:
/// - Initializes the crypto provider
/// - Creates the runtime context with the LLM and chat clients
/// - Starts the socket-mode listener, which runs until Ctrl-C
pub async fn start(config: Config) -> Void {
    info!("Starting mention-bot ...");

    // Start the crypto provider.
    if crypto::ring::default_provider().install_default().is_err() {
        warn!("A crypto provider was already installed; using it.");
    }

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    info!("Mention-bot stopped.");

    Ok(())
}
