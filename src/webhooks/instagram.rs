use std::sync::Arc;

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};
use tracing::{debug, info, trace, warn};

use crate::bot::Responder;

mod payload;
pub use payload::WebhookPayload;

mod signing;
use signing::SignedInstagramPayload;

pub(crate) const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

const SUBSCRIBE_MODE: &str = "subscribe";

/// A comment notification, as the pipeline sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEvent {
    pub comment_id: String,
    /// Top-level comment of the thread, the comment itself when it isn't a reply
    pub parent_thread_id: String,
    pub author_username: String,
    pub text: String,
}

pub struct VerifyToken(pub String);

/// Secret of the Meta app, used to check payload signatures when present.
pub struct AppSecret(pub Option<String>);

/// The `hub.*` query parameters of a verification request. Any of them may be missing.
#[derive(Debug, Default)]
pub(crate) struct HubVerification {
    mode: Option<String>,
    verify_token: Option<String>,
    challenge: Option<String>,
    /// Set when one of the `hub.*` keys was given more than once
    repeated: bool,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for HubVerification {
    type Error = anyhow::Error;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let mut hub = HubVerification::default();

        let query = match request.uri().query() {
            Some(query) => query,
            None => return Outcome::Success(hub),
        };

        // Rocket would treat the dots as nested form fields, so read the raw pairs instead
        for (key, value) in url::form_urlencoded::parse(query.raw().as_str().as_bytes()) {
            let slot = match key.as_ref() {
                "hub.mode" => &mut hub.mode,
                "hub.verify_token" => &mut hub.verify_token,
                "hub.challenge" => &mut hub.challenge,
                _ => continue,
            };
            // a repeated key has no single value to compare, the request gets rejected
            if slot.replace(value.into_owned()).is_some() {
                hub.repeated = true;
            }
        }

        trace!("verification request with mode {:?}", hub.mode);
        Outcome::Success(hub)
    }
}

#[rocket::get("/webhook")]
pub(crate) fn verify(hub: HubVerification, token: &State<VerifyToken>) -> Result<String, Status> {
    let subscribing = hub.mode.as_deref() == Some(SUBSCRIBE_MODE);
    let token_matches = hub.verify_token.as_deref() == Some(token.0.as_str());

    if subscribing && token_matches && !hub.repeated {
        info!("webhook verified");
        Ok(hub.challenge.unwrap_or_default())
    } else {
        warn!("rejected webhook verification request");
        Err(Status::Forbidden)
    }
}

#[rocket::post("/webhook", data = "<payload>")]
pub(crate) async fn receive(
    payload: SignedInstagramPayload,
    responder: &State<Arc<Responder>>,
) -> Result<&'static str, Status> {
    let payload: WebhookPayload = match serde_json::from_str(&payload.0) {
        Ok(payload) => payload,
        Err(e) => {
            debug!("couldn't parse webhook payload: {}", e);
            return Err(Status::NotFound);
        }
    };

    if !payload.is_instagram() {
        debug!("ignoring delivery for object {:?}", payload.object);
        return Err(Status::NotFound);
    }

    let events = payload.comment_events();
    debug!("received {} comment event(s)", events.len());

    responder.inner().handle_events(events).await;

    Ok(EVENT_RECEIVED)
}
