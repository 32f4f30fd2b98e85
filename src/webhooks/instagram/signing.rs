use std::io;

use anyhow::anyhow;
use hmac::{Hmac, Mac};
use rocket::{
    data::{ByteUnit, FromData, Outcome},
    http::Status,
    Data, Request,
};
use sha2::Sha256;
use tracing::trace;

use crate::webhooks::instagram::AppSecret;

const X_HUB_SIGNATURE: &str = "X-Hub-Signature-256";
const SIGNATURE_SCHEME: &str = "sha256=";

type HmacSha256 = Hmac<Sha256>;

/// Digest carried by `X-Hub-Signature-256`, formatted as `sha256=<hex>`.
fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let digest = header.strip_prefix(SIGNATURE_SCHEME)?;
    hex::decode(digest).ok()
}

/// Checks that `header` is the HMAC-SHA256 of `body` keyed with the Meta app secret.
fn validate_signature(app_secret: &str, header: &str, body: &str) -> bool {
    let expected = match parse_signature_header(header) {
        Some(digest) => digest,
        None => {
            trace!("malformed {} header: `{}`", X_HUB_SIGNATURE, header);
            return false;
        }
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body.as_bytes());

    let matches = mac.verify_slice(&expected).is_ok();
    trace!(matches, "compared delivery signature against app secret");
    matches
}

/// Raw body of a webhook delivery, with its signature checked when an app secret is configured.
pub struct SignedInstagramPayload(pub String);

const LIMIT: ByteUnit = ByteUnit::Mebibyte(1);

#[rocket::async_trait]
impl<'r> FromData<'r> for SignedInstagramPayload {
    type Error = anyhow::Error;

    async fn from_data(request: &'r Request<'_>, data: Data<'r>) -> Outcome<'r, Self> {
        trace!(uri = %request.uri(), "reading Instagram delivery body");

        let size_limit = request.limits().get("json").unwrap_or(LIMIT);
        let content = match data.open(size_limit).into_string().await {
            Ok(s) if s.is_complete() => s.into_inner(),
            Ok(_) => {
                let eof = io::ErrorKind::UnexpectedEof;
                trace!(%size_limit, "delivery body over the size limit");
                return Outcome::Error((
                    Status::PayloadTooLarge,
                    io::Error::new(eof, "data limit exceeded").into(),
                ));
            }
            Err(e) => return Outcome::Error((Status::BadRequest, e.into())),
        };

        let secret = match request.rocket().state::<AppSecret>() {
            Some(AppSecret(Some(secret))) => secret,
            _ => {
                trace!("no app secret configured, accepting unsigned payload");
                return Outcome::Success(SignedInstagramPayload(content));
            }
        };

        let signatures = request.headers().get(X_HUB_SIGNATURE).collect::<Vec<_>>();
        if signatures.len() != 1 {
            trace!(count = signatures.len(), "expected a single {} header", X_HUB_SIGNATURE);
            return Outcome::Error((
                Status::Forbidden,
                anyhow!("request header needs exactly one signature"),
            ));
        }

        if !validate_signature(secret, signatures[0], &content) {
            trace!("delivery not signed with the app secret, rejecting it");
            return Outcome::Error((Status::Forbidden, anyhow!("couldn't verify signature")));
        }

        trace!("delivery signature checked");
        Outcome::Success(SignedInstagramPayload(content))
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
    mac.update(body.as_bytes());
    format!("{}{}", SIGNATURE_SCHEME, hex::encode(mac.finalize().into_bytes()))
}
