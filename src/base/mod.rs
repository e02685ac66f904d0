//! Core components, types, and utilities for the mention-bot.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompt templates for the inference engine.
//! - The per-run data model and common result types.

pub mod config;
pub mod prompts;
pub mod types;
