use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::trace;
use url::Url;

use crate::clients::{ChatMessage, ChatModel};

/// Client for an OpenAI-compatible `chat/completions` endpoint.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    endpoint: Url,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(
        api_key: &str,
        base_url: &Url,
        model: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut auth_headers = header::HeaderMap::new();
        let mut auth_value = header::HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .context("invalid API key format")?;
        auth_value.set_sensitive(true);
        auth_headers.insert(header::AUTHORIZATION, auth_value);

        let client = Client::builder()
            .default_headers(auth_headers)
            .timeout(timeout)
            .build()
            .context("couldn't build HTTP client")?;

        Ok(Self {
            client,
            endpoint: join_path(base_url, "chat/completions")?,
            model: model.into(),
        })
    }
}

/// Appends `path` to `base`, keeping whatever path `base` already has.
pub(crate) fn join_path(base: &Url, path: &str) -> anyhow::Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        base.set_path(&format!("{}/", base.path()));
    }
    base.join(path)
        .with_context(|| format!("couldn't append `{}` to {}", path, base))
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        trace!(endpoint = %self.endpoint, model = %self.model, "requesting completion");

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&CompletionRequest {
                model: &self.model,
                messages,
            })
            .send()
            .await
            .context("completion request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("completion API answered {}: {}", status, body));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("couldn't decode completion response")?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("completion response had no content"))
    }
}
