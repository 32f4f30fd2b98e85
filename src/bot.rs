use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::{config::MarkPolicy, webhooks::CommentEvent};

mod classifier;
pub use classifier::RelevanceClassifier;

mod dispatcher;
pub use dispatcher::ReplyDispatcher;

mod filters;
use filters::{is_asking_for_link, is_own_account};

mod generator;
pub use generator::{ReplyGenerator, ReplyPersona};

mod ledger;
pub use ledger::{InMemoryLedger, ThreadLedger};
use ledger::ThreadLocks;

/// What happened to a comment after going through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A reply was generated and sent off; `delivered` tells whether the platform accepted it.
    Replied { delivered: bool },
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OwnAccount,
    AlreadyReplied,
    LinkRequest,
    NotRelevant,
    NoReplyGenerated,
}

/// The comment auto-responder: decides whether a comment gets an answer, writes it, and posts
/// it, at most once per thread.
pub struct Responder {
    own_username: String,
    mark_policy: MarkPolicy,
    ledger: Arc<dyn ThreadLedger>,
    locks: ThreadLocks,
    /// `None` when the relevance stage is disabled, every comment is then worth a reply
    classifier: Option<RelevanceClassifier>,
    generator: ReplyGenerator,
    dispatcher: ReplyDispatcher,
}

impl Responder {
    pub fn new(
        own_username: impl Into<String>,
        mark_policy: MarkPolicy,
        ledger: Arc<dyn ThreadLedger>,
        classifier: Option<RelevanceClassifier>,
        generator: ReplyGenerator,
        dispatcher: ReplyDispatcher,
    ) -> Self {
        Self {
            own_username: own_username.into(),
            mark_policy,
            ledger,
            locks: ThreadLocks::new(),
            classifier,
            generator,
            dispatcher,
        }
    }

    /// Runs every event through the pipeline, one after the other.
    ///
    /// Each event runs in its own task, awaited before the next one starts: an error or a panic
    /// while handling one comment is logged and doesn't prevent the following ones from being
    /// handled.
    pub async fn handle_events(self: &Arc<Self>, events: Vec<CommentEvent>) {
        for event in events {
            let comment_id = event.comment_id.clone();
            let responder = Arc::clone(self);

            let result = tokio::spawn(async move { responder.handle_comment(&event).await }).await;

            match result {
                Ok(Ok(outcome)) => debug!(%comment_id, ?outcome, "handled comment"),
                Ok(Err(e)) => warn!(
                    %comment_id,
                    "encountered error while handling comment: {:#}", e
                ),
                Err(e) => warn!(%comment_id, "comment handler aborted: {}", e),
            }
        }
    }

    pub async fn handle_comment(&self, event: &CommentEvent) -> anyhow::Result<Outcome> {
        info!(
            comment = %event.text,
            from = %event.author_username,
            thread = %event.parent_thread_id,
            "received comment"
        );

        if is_own_account(&event.author_username, &self.own_username) {
            debug!("skipping: own account");
            return Ok(Outcome::Skipped(SkipReason::OwnAccount));
        }

        // held until the thread is marked, so a concurrent delivery in the same thread waits
        // and then sees the mark
        let _thread = self.locks.lock(&event.parent_thread_id).await?;

        if self.ledger.has_replied(&event.parent_thread_id).await? {
            debug!("skipping: already replied in this thread");
            return Ok(Outcome::Skipped(SkipReason::AlreadyReplied));
        }

        if is_asking_for_link(&event.text) {
            debug!("skipping: link-related comment");
            return Ok(Outcome::Skipped(SkipReason::LinkRequest));
        }

        if let Some(classifier) = &self.classifier {
            if !classifier.should_reply(&event.text).await {
                debug!("skipping: neutral or unrelated comment");
                return Ok(Outcome::Skipped(SkipReason::NotRelevant));
            }
        }

        let reply = match self
            .generator
            .generate(&event.text, &event.author_username)
            .await
        {
            Some(reply) => reply,
            None => return Ok(Outcome::Skipped(SkipReason::NoReplyGenerated)),
        };

        let delivered = self.dispatcher.dispatch(&event.comment_id, &reply).await;

        let mark = match self.mark_policy {
            MarkPolicy::OnAttempt => true,
            MarkPolicy::OnSuccess => delivered,
        };
        if mark {
            self.ledger.mark_replied(&event.parent_thread_id).await?;
        } else {
            debug!("reply wasn't confirmed, leaving thread open");
        }

        Ok(Outcome::Replied { delivered })
    }
}
