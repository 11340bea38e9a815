use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;

use crate::bot::handlers::WebhookOutcome;
use crate::config::Mode;

/// Header with the name of the event that has triggered the webhook.
pub const EVENT_HEADER: &str = "x-gitea-event";
/// Header with the hex encoded HMAC-SHA256 signature of the body. Gitea sends it without any
/// algorithm prefix.
pub const SIGNATURE_HEADER: &str = "x-gitea-signature";

/// Push and pull request payloads of large repositories can get big.
const MAX_BODY_SIZE: usize = 25 * 1024 * 1024;

/// A single webhook delivery, as received. Nothing in it has been verified yet.
#[derive(Debug, Clone)]
pub struct WebhookEnvelope {
    pub body: Bytes,
    pub signature: Option<String>,
    pub event_type: Option<String>,
}

/// axum extractor for Gitea webhook deliveries.
#[derive(Debug)]
pub struct GiteaWebhook(pub WebhookEnvelope);

/// Eagerly loads the body and the relevant headers of a webhook request.
#[async_trait]
impl<S> FromRequest<S> for GiteaWebhook
where
    S: Send + Sync,
{
    type Rejection = WebhookOutcome;

    async fn from_request(request: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let (parts, body) = request.into_parts();

        let body = axum::body::to_bytes(body, MAX_BODY_SIZE)
            .await
            .map_err(|error| {
                tracing::error!("Reading webhook body failed: {error:?}");
                WebhookOutcome::Malformed("Cannot read webhook body".to_string())
            })?;

        Ok(GiteaWebhook(WebhookEnvelope {
            body,
            signature: header_value(&parts.headers, SIGNATURE_HEADER),
            event_type: header_value(&parts.headers, EVENT_HEADER),
        }))
    }
}

/// Empty header values are treated as missing.
fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

type HmacSha256 = Hmac<Sha256>;

/// Decides whether a webhook delivery was sent by the Gitea instance that knows our secret.
pub struct SignatureVerifier {
    mode: Mode,
    secret: Option<WebhookSecret>,
}

impl SignatureVerifier {
    pub fn new(mode: Mode, secret: Option<WebhookSecret>) -> Self {
        Self { mode, secret }
    }

    /// Verifies the signature of the given raw body.
    ///
    /// Unsigned deliveries are let through in development mode. Without a configured secret,
    /// every other delivery is rejected.
    pub fn verify(&self, body: &[u8], signature: Option<&str>) -> bool {
        if self.mode.is_development() && signature.is_none() {
            tracing::warn!("Development mode: skipping webhook signature verification");
            return true;
        }

        let Some(secret) = &self.secret else {
            tracing::warn!("Webhook secret is not configured, the webhook cannot be verified");
            return false;
        };

        let Some(signature) = signature else {
            tracing::warn!("Webhook request has no signature header");
            return false;
        };

        verify_gitea_signature(body, signature, secret)
    }
}

/// Verifies that `signature` is the lowercase hex encoded HMAC-SHA256 of `body` keyed by
/// `secret`. The comparison of the digests runs in constant time.
fn verify_gitea_signature(body: &[u8], signature: &str, secret: &WebhookSecret) -> bool {
    // Only accept the exact encoding Gitea produces, so that every distinct signature string
    // maps to a distinct digest.
    if !signature
        .bytes()
        .all(|byte| matches!(byte, b'0'..=b'9' | b'a'..=b'f'))
    {
        tracing::warn!("Webhook signature is not a lowercase hex string");
        return false;
    }
    let Ok(signature) = hex::decode(signature) else {
        tracing::warn!("Webhook signature could not be decoded");
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.expose().as_bytes()) {
        Ok(mac) => mac,
        Err(error) => {
            tracing::error!("Cannot create HMAC key: {error:?}");
            return false;
        }
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

/// Wrapper for a secret which is zeroed on drop and can be exposed only through the [`WebhookSecret::expose`] method.
pub struct WebhookSecret(SecretString);

impl WebhookSecret {
    pub fn new(secret: String) -> Self {
        Self(SecretString::new(secret))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret().as_str()
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::extract::FromRequest;
    use http::Request;

    use super::{GiteaWebhook, SignatureVerifier, WebhookSecret};
    use crate::config::Mode;
    use crate::tests::{sign, TEST_WEBHOOK_SECRET};

    const BODY: &[u8] = br#"{"action":"opened","number":1}"#;

    fn verifier(mode: Mode) -> SignatureVerifier {
        SignatureVerifier::new(mode, Some(WebhookSecret::new(TEST_WEBHOOK_SECRET.to_string())))
    }

    #[test]
    fn accepts_valid_signature() {
        let signature = sign(BODY);
        assert!(verifier(Mode::Production).verify(BODY, Some(&signature)));
    }

    #[test]
    fn accepts_equal_body_in_a_different_buffer() {
        let signature = sign(BODY);
        let copy = String::from_utf8(BODY.to_vec()).unwrap().into_bytes();
        assert!(verifier(Mode::Production).verify(&copy, Some(&signature)));
    }

    #[test]
    fn rejects_any_bit_flip_in_body() {
        let signature = sign(BODY);
        let verifier = verifier(Mode::Production);
        for index in 0..BODY.len() {
            for bit in 0..8 {
                let mut body = BODY.to_vec();
                body[index] ^= 1 << bit;
                assert!(
                    !verifier.verify(&body, Some(&signature)),
                    "flipping bit {bit} of byte {index} was not detected"
                );
            }
        }
    }

    #[test]
    fn rejects_any_bit_flip_in_signature() {
        let signature = sign(BODY);
        let verifier = verifier(Mode::Production);
        for index in 0..signature.len() {
            for bit in 0..7 {
                let mut flipped = signature.clone().into_bytes();
                flipped[index] ^= 1 << bit;
                let Ok(flipped) = String::from_utf8(flipped) else {
                    continue;
                };
                assert!(
                    !verifier.verify(BODY, Some(&flipped)),
                    "flipping bit {bit} of character {index} was not detected"
                );
            }
        }
    }

    #[test]
    fn rejects_uppercase_signature() {
        let signature = sign(BODY).to_uppercase();
        assert!(!verifier(Mode::Production).verify(BODY, Some(&signature)));
    }

    #[test]
    fn rejects_missing_signature_in_production() {
        assert!(!verifier(Mode::Production).verify(BODY, None));
    }

    #[test]
    fn skips_missing_signature_in_development() {
        assert!(verifier(Mode::Development).verify(BODY, None));
        assert!(SignatureVerifier::new(Mode::Development, None).verify(BODY, None));
    }

    #[test]
    fn checks_present_signature_in_development() {
        assert!(!verifier(Mode::Development).verify(BODY, Some("deadbeef")));
        assert!(verifier(Mode::Development).verify(BODY, Some(&sign(BODY))));
    }

    #[test]
    fn rejects_everything_without_secret() {
        let verifier = SignatureVerifier::new(Mode::Production, None);
        assert!(!verifier.verify(BODY, Some(&sign(BODY))));
        assert!(!verifier.verify(BODY, None));
    }

    #[tokio::test]
    async fn extracts_envelope() {
        let request = Request::post("/webhook/gitea")
            .header("X-Gitea-Event", "status")
            .header("X-Gitea-Signature", "abcd")
            .body(Body::from(BODY))
            .unwrap();
        let GiteaWebhook(envelope) = GiteaWebhook::from_request(request, &()).await.unwrap();
        assert_eq!(envelope.body.as_ref(), BODY);
        assert_eq!(envelope.event_type.as_deref(), Some("status"));
        assert_eq!(envelope.signature.as_deref(), Some("abcd"));
    }

    #[tokio::test]
    async fn treats_empty_headers_as_missing() {
        let request = Request::post("/webhook/gitea")
            .header("X-Gitea-Event", "")
            .header("X-Gitea-Signature", "")
            .body(Body::from(BODY))
            .unwrap();
        let GiteaWebhook(envelope) = GiteaWebhook::from_request(request, &()).await.unwrap();
        assert_eq!(envelope.event_type, None);
        assert_eq!(envelope.signature, None);
    }
}
