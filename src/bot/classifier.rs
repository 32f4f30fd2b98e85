use std::sync::Arc;

use tracing::{error, trace};

use crate::clients::{ChatMessage, ChatModel};

const RELEVANCE_PROMPT: &str = r#"Classify Instagram comments:
- If comment is POSITIVE (praise, excitement, compliment) → Reply.
- If comment is NEGATIVE (complaint, dissatisfaction, issue) → Reply.
- If comment is NEUTRAL, spam, emoji-only, or unrelated → Do NOT reply.
Respond ONLY with one word: "yes" (reply) or "no" (ignore)."#;

/// Asks the model whether a comment carries enough sentiment to deserve an answer.
pub struct RelevanceClassifier {
    model: Arc<dyn ChatModel>,
}

impl RelevanceClassifier {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    /// Fails closed: any error from the model means "don't reply".
    pub async fn should_reply(&self, comment: &str) -> bool {
        let messages = [ChatMessage::system(RELEVANCE_PROMPT), ChatMessage::user(comment)];

        match self.model.complete(&messages).await {
            Ok(answer) => {
                trace!(answer = %answer, "relevance classifier answered");
                is_yes(&answer)
            }
            Err(e) => {
                error!("relevance classification failed: {:#}", e);
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().to_lowercase() == "yes"
}
