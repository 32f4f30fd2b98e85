use std::{fs::File, io::BufReader, net::IpAddr, path::PathBuf, time::Duration};

use anyhow::Context;
use clap::{Args, ValueEnum};
use url::Url;

use crate::bot::ReplyPersona;

#[derive(Args)]
pub struct ReplybotConfig {
    /// API key for the chat completion provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,
    /// Model used for both relevance classification and reply generation
    #[arg(long, env = "OPENAI_MODEL", default_value = "o4-mini-2025-04-16")]
    pub openai_model: String,
    /// Base URL of the OpenAI-compatible API, `/chat/completions` is appended to it
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: Url,

    /// Page access token used to post replies through the Graph API
    #[arg(long, env = "INSTAGRAM_PAGE_ACCESS_TOKEN", hide_env_values = true)]
    pub page_access_token: String,
    #[arg(long, env = "GRAPH_API_BASE_URL", default_value = "https://graph.facebook.com")]
    pub graph_api_base_url: Url,
    #[arg(long, env = "GRAPH_API_VERSION", default_value = "v19.0")]
    pub graph_api_version: String,

    /// Token expected in `hub.verify_token` during the webhook verification handshake
    #[arg(long, env = "VERIFY_TOKEN", hide_env_values = true)]
    pub verify_token: String,
    /// App secret used to check `X-Hub-Signature-256` on deliveries. Unsigned deliveries are
    /// accepted when this is not set.
    #[arg(long, env = "INSTAGRAM_APP_SECRET", hide_env_values = true)]
    pub app_secret: Option<String>,

    /// Username of the account the bot replies as. Comments from it are never answered.
    #[arg(long, env = "IG_USERNAME")]
    pub own_username: String,

    /// Ask the model whether a comment deserves a reply before generating one
    #[arg(
        long,
        env = "RELEVANCE_FILTER",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub relevance_filter: bool,
    /// When a thread is recorded as answered
    #[arg(long, value_enum, env = "MARK_POLICY", default_value_t = MarkPolicy::OnAttempt)]
    pub mark_policy: MarkPolicy,
    /// YAML file describing the reply persona, the bundled `persona.yaml` is used otherwise
    #[arg(long, env = "PERSONA_FILE")]
    pub persona_file: Option<PathBuf>,

    #[arg(long, env = "ADDRESS", default_value = "0.0.0.0")]
    pub address: IpAddr,
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    /// Timeout applied to every outbound request, in seconds
    #[arg(long, env = "HTTP_TIMEOUT_SECS", default_value_t = 30)]
    pub http_timeout_secs: u64,
}

/// Decides whether a thread is marked as answered after a dispatch attempt or only after the
/// platform confirmed the reply.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MarkPolicy {
    /// Mark as soon as a reply was generated and sent off, even if posting it failed
    #[default]
    OnAttempt,
    /// Mark only when the Graph API accepted the reply
    OnSuccess,
}

impl ReplybotConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Loads the persona from [`ReplybotConfig::persona_file`], or the bundled one.
    pub fn load_persona(&self) -> anyhow::Result<ReplyPersona> {
        let path = match &self.persona_file {
            Some(path) => path,
            None => return ReplyPersona::bundled(),
        };

        let file =
            File::open(path).with_context(|| format!("couldn't open {}:", path.display()))?;
        serde_yaml::from_reader(BufReader::new(file))
            .with_context(|| format!("couldn't parse persona file {}", path.display()))
    }
}
