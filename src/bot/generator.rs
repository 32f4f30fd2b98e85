use std::{fmt::Write, sync::Arc};

use anyhow::Context;
use serde::Deserialize;
use tracing::{error, trace, warn};

use crate::clients::{ChatMessage, ChatModel};

const BUNDLED_PERSONA: &str = include_str!("../../persona.yaml");

/// Business copy the generator works from. Kept out of the code so that changing an answer
/// doesn't mean touching the prompt construction.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplyPersona {
    /// Name the bot answers on behalf of
    pub brand: String,
    pub tone: String,
    #[serde(default)]
    pub rules: Vec<ReplyRule>,
    /// Things the reply must never mention
    #[serde(default)]
    pub forbidden: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRule {
    /// Situation, phrased to follow "If ...", e.g. `asking about shipping`
    pub when: String,
    /// Canned answer or guidance for that situation. Multi-line answers are indented under the
    /// rule.
    pub reply: String,
}

impl ReplyPersona {
    pub fn bundled() -> anyhow::Result<Self> {
        serde_yaml::from_str(BUNDLED_PERSONA).context("couldn't parse bundled persona")
    }

    pub fn system_prompt(&self) -> String {
        let mut prompt = format!(
            "At {}, reply to Instagram comments in a {} tone.",
            self.brand, self.tone
        );

        if !self.rules.is_empty() {
            prompt.push_str(" Follow these rules:\n");
            for rule in &self.rules {
                let mut lines = rule.reply.trim().lines();
                let first = lines.next().unwrap_or_default();
                if lines.clone().next().is_none() {
                    write!(prompt, "\n- If {} → {}", rule.when, first).unwrap();
                } else {
                    write!(prompt, "\n- If {} →\n   {}", rule.when, first).unwrap();
                    for line in lines {
                        write!(prompt, "\n   {}", line.trim()).unwrap();
                    }
                }
            }
        }

        if !self.forbidden.is_empty() {
            write!(prompt, "\n\nDo NOT mention {}.", join_list(&self.forbidden)).unwrap();
        }

        prompt
    }
}

/// `["a", "b", "c"]` → `a, b, or c`
fn join_list(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [first, second] => format!("{} or {}", first, second),
        [init @ .., last] => format!("{}, or {}", init.join(", "), last),
    }
}

pub struct ReplyGenerator {
    model: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl ReplyGenerator {
    pub fn new(model: Arc<dyn ChatModel>, persona: &ReplyPersona) -> Self {
        Self {
            model,
            system_prompt: persona.system_prompt(),
        }
    }

    /// Returns `None` when the model failed or came back empty; the failure is logged here.
    pub async fn generate(&self, comment: &str, username: &str) -> Option<String> {
        let messages = [
            ChatMessage::system(self.system_prompt.as_str()),
            ChatMessage::user(format!(
                "Instagram user @{} commented: \"{}\"",
                username, comment
            )),
        ];

        match self.model.complete(&messages).await {
            Ok(reply) => {
                let reply = reply.trim();
                if reply.is_empty() {
                    warn!("model returned an empty reply");
                    return None;
                }
                trace!(reply = %reply, "generated reply");
                Some(reply.to_owned())
            }
            Err(e) => {
                error!("error generating reply: {:#}", e);
                None
            }
        }
    }
}
