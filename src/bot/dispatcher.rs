use std::sync::Arc;

use tracing::{error, info, trace};

use crate::clients::CommentReplier;

/// Posts generated replies. Fire and forget: failures are logged and reported through the
/// return value, never retried.
pub struct ReplyDispatcher {
    replier: Arc<dyn CommentReplier>,
}

impl ReplyDispatcher {
    pub fn new(replier: Arc<dyn CommentReplier>) -> Self {
        Self { replier }
    }

    /// Returns `true` only when the platform accepted the reply.
    pub async fn dispatch(&self, comment_id: &str, message: &str) -> bool {
        if message.is_empty() {
            trace!("empty reply for comment {}, nothing to send", comment_id);
            return false;
        }

        match self.replier.reply(comment_id, message).await {
            Ok(response) => {
                info!(comment_id, %response, "replied to comment");
                true
            }
            Err(e) => {
                error!(comment_id, "error replying to comment: {:#}", e);
                false
            }
        }
    }
}
