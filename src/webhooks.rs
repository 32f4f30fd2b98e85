use std::sync::Arc;

use rocket::{routes, Build, Rocket};

use crate::bot::Responder;

pub mod instagram;
pub use instagram::{AppSecret, CommentEvent, VerifyToken};

/// Mounts the webhook routes and the state they need on `rocket`.
pub fn mount(
    rocket: Rocket<Build>,
    responder: Arc<Responder>,
    verify_token: String,
    app_secret: Option<String>,
) -> Rocket<Build> {
    rocket
        .mount("/", routes![instagram::verify, instagram::receive])
        .manage(responder)
        .manage(VerifyToken(verify_token))
        .manage(AppSecret(app_secret))
}
