use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::trace;
use url::Url;

use crate::clients::{openai::join_path, CommentReplier};

/// Posts comment replies through the Instagram Graph API.
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    base: Url,
    access_token: String,
}

#[derive(Serialize)]
struct ReplyRequest<'a> {
    message: &'a str,
    access_token: &'a str,
}

impl GraphClient {
    pub fn new(
        base_url: &Url,
        version: &str,
        access_token: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("couldn't build HTTP client")?;

        Ok(Self {
            client,
            base: join_path(base_url, version)?,
            access_token: access_token.into(),
        })
    }

    fn replies_url(&self, comment_id: &str) -> anyhow::Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} can't be used as a base URL", self.base))?
            .pop_if_empty()
            .push(comment_id)
            .push("replies");
        Ok(url)
    }
}

#[async_trait]
impl CommentReplier for GraphClient {
    async fn reply(&self, comment_id: &str, message: &str) -> anyhow::Result<serde_json::Value> {
        let url = self.replies_url(comment_id)?;
        trace!(%url, "posting reply");

        let response = self
            .client
            .post(url)
            .json(&ReplyRequest {
                message,
                access_token: &self.access_token,
            })
            .send()
            .await
            .context("reply request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("graph API answered {}: {}", status, body));
        }

        response
            .json()
            .await
            .context("couldn't decode graph API response")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client(server: &MockServer) -> GraphClient {
        let base = Url::parse(&server.uri()).unwrap();
        GraphClient::new(&base, "v19.0", "page-token", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_replies_url() {
        let base = Url::parse("https://graph.facebook.com").unwrap();
        let client = GraphClient::new(&base, "v19.0", "t", Duration::from_secs(5)).unwrap();

        assert_eq!(
            client.replies_url("17858893269000001").unwrap().as_str(),
            "https://graph.facebook.com/v19.0/17858893269000001/replies"
        );
    }

    #[tokio::test]
    async fn test_reply_posts_message_and_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v19.0/1789/replies"))
            .and(body_json(json!({
                "message": "Thanks a lot!",
                "access_token": "page-token",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "1790" })))
            .expect(1)
            .mount(&server)
            .await;

        let response = client(&server)
            .reply("1789", "Thanks a lot!")
            .await
            .expect("reply should be accepted");

        assert_eq!(response, json!({ "id": "1790" }));
    }

    #[tokio::test]
    async fn test_reply_error_status() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": { "message": "Invalid OAuth access token." }
            })))
            .mount(&server)
            .await;

        let err = client(&server).reply("1789", "hi").await.unwrap_err();
        assert!(err.to_string().contains("Invalid OAuth"), "{}", err);
    }
}
