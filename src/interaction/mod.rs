//! Mention handling for mention-bot.
//!
//! This module turns a mention into exactly one reply:
//! - Classifying the mention text into an intent
//! - Fetching and normalizing the thread history
//! - Building the model request, invoking the model, and posting the reply

pub mod command;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod mention;
pub mod prompt;
