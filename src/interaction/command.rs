//! Mention text classification.

use std::sync::LazyLock;

use regex::Regex;

use crate::base::types::Intent;

/// Phrases that ask for a thread summary (including a common misspelling).
const SUMMARY_PHRASES: &[&str] = &["summarize thread", "sumarize thread", "thread summary"];

/// Phrases that make a summary request private.
const PRIVATE_PHRASES: &[&str] = &["private", "me only"];

/// User mention tokens, e.g. `<@U0123ABCD>` or `<@U0123ABCD|alice>`.
static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@[A-Za-z0-9]+(?:\|[^>]*)?>").unwrap());

/// Remove every user mention token and collapse whitespace.
///
/// The result keeps its case, so it can be handed to the model as the question.
pub fn clean_mention_text(raw_text: &str) -> String {
    let stripped = USER_MENTION.replace_all(raw_text, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Classify a raw mention text into an [`Intent`].
///
/// Total: every string maps to exactly one intent, with [`Intent::GeneralChat`] as
/// the fallback. Private phrasing wins over the public phrasing it extends.
pub fn classify(raw_text: &str) -> Intent {
    let text = clean_mention_text(raw_text).to_lowercase();

    let wants_summary = SUMMARY_PHRASES.iter().any(|p| text.contains(p));
    if !wants_summary {
        return Intent::GeneralChat;
    }

    if PRIVATE_PHRASES.iter().any(|p| text.contains(p)) {
        Intent::PrivateSummary
    } else {
        Intent::PublicSummary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_mentions_and_whitespace() {
        assert_eq!(clean_mention_text("<@U0BOT>   How does  photosynthesis work?"), "How does photosynthesis work?");
        assert_eq!(clean_mention_text("hey <@U0BOT|bot>, and <@W123> too"), "hey , and too");
        assert_eq!(clean_mention_text("<@U0BOT>"), "");
    }

    #[test]
    fn test_public_summary() {
        assert_eq!(classify("<@U0BOT> summarize thread"), Intent::PublicSummary);
        assert_eq!(classify("<@U0BOT> Thread Summary please"), Intent::PublicSummary);
        assert_eq!(classify("can you SUMMARIZE THREAD for everyone"), Intent::PublicSummary);
        assert_eq!(classify("<@U0BOT> sumarize thread"), Intent::PublicSummary);
    }

    #[test]
    fn test_private_summary_dominates() {
        assert_eq!(classify("<@U0BOT> summarize thread private"), Intent::PrivateSummary);
        assert_eq!(classify("<@U0BOT> private: summarize thread"), Intent::PrivateSummary);
        assert_eq!(classify("<@U0BOT> thread summary me only"), Intent::PrivateSummary);
        assert_eq!(classify("<@U0BOT> me only, thread summary"), Intent::PrivateSummary);
        assert_eq!(classify("<@U0BOT> Summarize Thread, PRIVATE"), Intent::PrivateSummary);
        assert_eq!(classify("<@U0BOT> summarize thread for me only"), Intent::PrivateSummary);
    }

    #[test]
    fn test_general_chat_fallback() {
        assert_eq!(classify("<@U0BOT> how does photosynthesis work?"), Intent::GeneralChat);
        assert_eq!(classify("<@U0BOT> tell me something private"), Intent::GeneralChat);
        assert_eq!(classify("summarize this thread"), Intent::GeneralChat);
        assert_eq!(classify(""), Intent::GeneralChat);
        assert_eq!(classify("<@U0BOT>"), Intent::GeneralChat);
    }

    #[test]
    fn test_mention_tokens_do_not_hide_phrases() {
        assert_eq!(classify("summarize<@U0BOT>thread"), Intent::PublicSummary);
        assert_eq!(classify("summarize <@U0BOT> thread"), Intent::PublicSummary);
        assert_eq!(classify("<@U0BOT>summarize thread<@U0BOT>"), Intent::PublicSummary);
    }

    #[test]
    fn test_classify_is_deterministic_and_total() {
        let inputs = [
            "summarize thread",
            "thread summary me only",
            "private",
            "ünïcödé thread summary",
            "\n\t",
            "<@>",
            "<@U1|",
        ];

        for input in inputs {
            let first = classify(input);
            assert_eq!(first, classify(input));
            assert!(matches!(first, Intent::PublicSummary | Intent::PrivateSummary | Intent::GeneralChat));
        }
    }
}
