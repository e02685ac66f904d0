//! Posting the one reply of a run.

use tracing::instrument;

use crate::{
    base::types::{ReplyDirective, Visibility},
    interaction::error::PipelineError,
    service::chat::ChatClient,
};

/// Post `directive` with its visibility, anchored to its thread.
///
/// Public replies go to the thread as ordinary messages (starting the thread if the
/// anchor is a top-level message); ephemeral replies are shown to the recipient only.
/// A platform refusal comes back as [`PipelineError::Dispatch`]; nothing is retried.
#[instrument(skip_all, fields(channel_id = %directive.channel_id, thread_ts = %directive.thread_ts, visibility = ?directive.visibility))]
pub async fn dispatch(chat: &ChatClient, directive: &ReplyDirective) -> Result<(), PipelineError> {
    let result = match directive.visibility {
        Visibility::Public => chat.send_message(&directive.channel_id, &directive.thread_ts, &directive.body).await,
        Visibility::EphemeralToSender => {
            chat.send_ephemeral(&directive.channel_id, &directive.thread_ts, &directive.recipient_id, &directive.body)
                .await
        }
    };

    result.map_err(PipelineError::Dispatch)
}
