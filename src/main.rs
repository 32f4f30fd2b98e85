use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::info;

mod bot;
use bot::{InMemoryLedger, RelevanceClassifier, ReplyDispatcher, ReplyGenerator, Responder};

mod clients;
use clients::{ChatModel, GraphClient, OpenAiClient};

mod config;
use config::ReplybotConfig;

mod webhooks;

#[derive(Parser)]
#[command(version, about = "Answers Instagram comments delivered through webhooks")]
struct Opts {
    #[command(flatten)]
    config: ReplybotConfig,
}

#[rocket::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let Opts { config } = Opts::parse();
    let persona = config.load_persona().context("couldn't load reply persona")?;

    let model: Arc<dyn ChatModel> = Arc::new(
        OpenAiClient::new(
            &config.openai_api_key,
            &config.openai_base_url,
            config.openai_model.as_str(),
            config.http_timeout(),
        )
        .context("failed to create completion client")?,
    );
    let graph = GraphClient::new(
        &config.graph_api_base_url,
        &config.graph_api_version,
        config.page_access_token.as_str(),
        config.http_timeout(),
    )
    .context("failed to create graph API client")?;

    let classifier = config
        .relevance_filter
        .then(|| RelevanceClassifier::new(Arc::clone(&model)));
    info!(
        relevance_filter = config.relevance_filter,
        mark_policy = ?config.mark_policy,
        "starting responder for @{}",
        config.own_username
    );

    let responder = Responder::new(
        config.own_username.as_str(),
        config.mark_policy,
        Arc::new(InMemoryLedger::new()),
        classifier,
        ReplyGenerator::new(model, &persona),
        ReplyDispatcher::new(Arc::new(graph)),
    );

    let figment = rocket::Config::figment()
        .merge(("address", config.address))
        .merge(("port", config.port));

    let rocket = webhooks::mount(
        rocket::custom(figment),
        Arc::new(responder),
        config.verify_token,
        config.app_secret,
    );
    rocket
        .launch()
        .await
        .map_err(|err| anyhow!("rocket failed: {}", err))?;

    Ok(())
}
