//! Thread history retrieval and normalization.
//!
//! The history is fetched fresh for every run, and never cached.

use std::{
    collections::{BTreeSet, HashMap},
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use regex::{Captures, Regex};
use tracing::{info, instrument, warn};

use crate::{
    base::types::{HistoryMessage, ThreadContext, ThreadMessage},
    interaction::error::PipelineError,
    service::chat::ChatClient,
};

/// Any angle-bracket markup: `<@U1>`, `<#C1|general>`, `<!here>`, `<https://x|label>`.
static MARKUP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<([^<>|]+)(?:\|([^<>]*))?>").unwrap());

/// User mentions only, capturing the user ID.
static USER_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<@([A-Za-z0-9]+)(?:\|[^<>]*)?>").unwrap());

/// Fetch the ordered, normalized history of a thread.
///
/// Messages authored by the bot itself, and the message with timestamp `exclude_ts`
/// (the triggering mention), are dropped. The result is sorted by timestamp, oldest
/// first. Fails with [`PipelineError::NoThread`] when there is no thread, and with
/// [`PipelineError::ContextFetch`] when the platform refuses; nothing is retried here.
#[instrument(skip(chat))]
pub async fn fetch(chat: &ChatClient, channel_id: &str, thread_ts: Option<&str>, exclude_ts: Option<&str>) -> Result<ThreadContext, PipelineError> {
    let Some(thread_ts) = thread_ts else {
        return Err(PipelineError::NoThread);
    };

    let history = chat.get_thread_history(channel_id, thread_ts).await.map_err(PipelineError::ContextFetch)?;
    let fetched = history.len();

    let bot_user_id = chat.bot_user_id().to_string();
    let history = history
        .into_iter()
        .filter(|m| m.user_id.as_deref() != Some(bot_user_id.as_str()))
        .filter(|m| exclude_ts != Some(m.ts.as_str()))
        .collect::<Vec<_>>();

    let names = resolve_names(chat, &history).await;

    let mut messages = history
        .into_iter()
        .filter_map(|m| {
            let Some(timestamp) = parse_slack_ts(&m.ts) else {
                warn!("Skipping message with unparseable timestamp `{}`", m.ts);
                return None;
            };

            let (author_id, author_name) = author_of(&m, &names);

            Some(ThreadMessage {
                author_id,
                author_name,
                text: normalize_text(&m.text, &names),
                timestamp,
            })
        })
        .collect::<Vec<_>>();

    // Stable, so equal timestamps keep platform order.
    messages.sort_by_key(|m| m.timestamp);

    info!("Fetched {} messages; {} kept after filtering", fetched, messages.len());

    Ok(ThreadContext::new(messages))
}

/// Resolve every author and every mentioned user, concurrently, with a `User-<id>` fallback.
async fn resolve_names(chat: &ChatClient, history: &[HistoryMessage]) -> HashMap<String, String> {
    let mut ids = BTreeSet::new();

    for message in history {
        if let Some(user_id) = &message.user_id {
            ids.insert(user_id.clone());
        }

        for caps in USER_MENTION.captures_iter(&message.text) {
            ids.insert(caps[1].to_string());
        }
    }

    let lookups = ids.into_iter().map(|id| async move {
        let name = chat.get_user_name(&id).await;
        (id, name)
    });

    join_all(lookups)
        .await
        .into_iter()
        .map(|(id, name)| {
            let name = name.unwrap_or_else(|| format!("User-{id}"));
            (id, name)
        })
        .collect()
}

fn author_of(message: &HistoryMessage, names: &HashMap<String, String>) -> (String, String) {
    match (&message.user_id, &message.bot_id) {
        (Some(user_id), _) => {
            let name = names.get(user_id).cloned().unwrap_or_else(|| format!("User-{user_id}"));
            (user_id.clone(), name)
        }
        (None, Some(bot_id)) => (bot_id.clone(), format!("Bot-{bot_id}")),
        (None, None) => ("unknown".to_string(), "Unknown User".to_string()),
    }
}

/// Turn platform markup into plain text.
///
/// - `<@U1>` becomes `@Name` (from `names`, else `@User-U1`).
/// - `<#C1|general>` becomes `#general`.
/// - `<!here>` becomes `@here`; labelled specials become their label.
/// - `<https://x|label>` becomes `label (https://x)`; bare links lose their brackets.
/// - `&lt;`, `&gt;`, and `&amp;` are unescaped.
pub fn normalize_text(text: &str, names: &HashMap<String, String>) -> String {
    let replaced = MARKUP.replace_all(text, |caps: &Captures| {
        let target = &caps[1];
        let label = caps.get(2).map(|l| l.as_str()).filter(|l| !l.is_empty());

        if let Some(user_id) = target.strip_prefix('@') {
            let name = names.get(user_id).cloned().unwrap_or_else(|| format!("User-{user_id}"));
            format!("@{name}")
        } else if let Some(channel_id) = target.strip_prefix('#') {
            format!("#{}", label.unwrap_or(channel_id))
        } else if let Some(special) = target.strip_prefix('!') {
            label.map(str::to_string).unwrap_or_else(|| format!("@{special}"))
        } else {
            match label {
                Some(label) if label != target => format!("{label} ({target})"),
                _ => target.to_string(),
            }
        }
    });

    replaced.replace("&lt;", "<").replace("&gt;", ">").replace("&amp;", "&")
}

/// Parse a Slack timestamp (`<seconds>.<micros>`) into a UTC time.
pub fn parse_slack_ts(ts: &str) -> Option<DateTime<Utc>> {
    let (secs, frac) = ts.split_once('.').unwrap_or((ts, ""));

    let secs = secs.parse::<i64>().ok()?;

    if !frac.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    // Scale the fraction to nanoseconds, ignoring digits past nanosecond precision.
    let digits = &frac[..frac.len().min(9)];
    let nanos = if digits.is_empty() {
        0
    } else {
        digits.parse::<u32>().ok()? * 10u32.pow(9 - digits.len() as u32)
    };

    DateTime::from_timestamp(secs, nanos)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn names() -> HashMap<String, String> {
        HashMap::from([("U1".to_string(), "Alice".to_string()), ("U2".to_string(), "Bob".to_string())])
    }

    #[test]
    fn test_normalize_user_mentions() {
        assert_eq!(normalize_text("<@U1> can you ask <@U2|bob>?", &names()), "@Alice can you ask @Bob?");
        assert_eq!(normalize_text("ping <@U9>", &names()), "ping @User-U9");
    }

    #[test]
    fn test_normalize_channels_specials_and_links() {
        assert_eq!(normalize_text("see <#C1|deploys>", &names()), "see #deploys");
        assert_eq!(normalize_text("see <#C1>", &names()), "see #C1");
        assert_eq!(normalize_text("<!here> heads up", &names()), "@here heads up");
        assert_eq!(normalize_text("<!subteam^S1|@oncall> look", &names()), "@oncall look");
        assert_eq!(normalize_text("docs: <https://example.com|the docs>", &names()), "docs: the docs (https://example.com)");
        assert_eq!(normalize_text("<https://example.com>", &names()), "https://example.com");
    }

    #[test]
    fn test_normalize_unescapes_entities() {
        assert_eq!(normalize_text("a &lt; b &amp;&amp; c &gt; d", &names()), "a < b && c > d");
        assert_eq!(normalize_text("&amp;lt;", &names()), "&lt;");
    }

    #[test]
    fn test_parse_slack_ts() {
        let ts = parse_slack_ts("1700000000.000100").unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_micros(), 100);

        assert_eq!(parse_slack_ts("1700000000").unwrap().timestamp(), 1_700_000_000);
        assert!(parse_slack_ts("1700000000.000100") < parse_slack_ts("1700000000.000200"));
        assert!(parse_slack_ts("1700000000.9") > parse_slack_ts("1700000000.100000"));
        assert!(parse_slack_ts("not-a-ts").is_none());
        assert!(parse_slack_ts("1700000000.12a").is_none());
    }

    #[test]
    fn test_author_fallbacks() {
        let names = names();
        let message = |user: Option<&str>, bot: Option<&str>| HistoryMessage {
            user_id: user.map(str::to_string),
            bot_id: bot.map(str::to_string),
            text: String::new(),
            ts: "1700000000.000100".to_string(),
        };

        assert_eq!(author_of(&message(Some("U1"), None), &names), ("U1".to_string(), "Alice".to_string()));
        assert_eq!(author_of(&message(Some("U7"), None), &names), ("U7".to_string(), "User-U7".to_string()));
        assert_eq!(author_of(&message(None, Some("B1")), &names), ("B1".to_string(), "Bot-B1".to_string()));
        assert_eq!(author_of(&message(None, None), &names).1, "Unknown User");
    }
}
