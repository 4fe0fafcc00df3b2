//! Slack request signing and slash command payloads.

use crate::error::{Result, SlackError};
use axum::http::HeaderMap;
use hmac::{Hmac, Mac as _};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";
pub const SIGNATURE_HEADER: &str = "x-slack-signature";
const SIGNATURE_VERSION: &str = "v0";
/// Slack's recommended replay window.
const MAX_CLOCK_SKEW_SECS: u64 = 60 * 5;

/// Verifies Slack's `X-Slack-Signature` over the raw request body.
///
/// The signature is `v0=` + hex(HMAC-SHA256(signing_secret, `v0:<timestamp>:<body>`)).
#[derive(Clone)]
pub struct SlackVerifier {
    secret: Vec<u8>,
}

impl SlackVerifier {
    #[must_use]
    pub fn new(signing_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: signing_secret.into(),
        }
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| SlackError::InvalidSignature)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }

    /// Compute the signature header value for `body` sent at `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error only if the HMAC key is unusable.
    pub fn sign(&self, timestamp: u64, body: &[u8]) -> Result<String> {
        let sig = self.mac(&timestamp.to_string(), body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(sig)))
    }

    /// Verify a request against the current clock.
    ///
    /// # Errors
    ///
    /// Returns an error if headers are missing, the timestamp is outside the replay window,
    /// or the signature does not match.
    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> Result<()> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| SlackError::InvalidTimestamp)?
            .as_secs();
        let timestamp = header_str(headers, TIMESTAMP_HEADER)?;
        let signature = header_str(headers, SIGNATURE_HEADER)?;
        self.verify_at(timestamp, signature, body, now)
    }

    fn verify_at(&self, timestamp: &str, signature: &str, body: &[u8], now_unix_secs: u64) -> Result<()> {
        let ts: u64 = timestamp
            .trim()
            .parse()
            .map_err(|_| SlackError::InvalidTimestamp)?;
        if now_unix_secs.abs_diff(ts) > MAX_CLOCK_SKEW_SECS {
            return Err(SlackError::StaleTimestamp);
        }

        let got = signature
            .strip_prefix("v0=")
            .and_then(|hex_sig| hex::decode(hex_sig).ok())
            .ok_or(SlackError::InvalidSignature)?;

        self.mac(timestamp.trim(), body)?
            .verify_slice(&got)
            .map_err(|_| SlackError::InvalidSignature)
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .ok_or(SlackError::MissingHeader(name))
}

/// Form fields of a slash command delivery that the relay uses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: Option<String>,
    pub text: Option<String>,
    pub user_id: Option<String>,
    pub channel_id: Option<String>,
    pub response_url: Option<String>,
    /// Slack's periodic certificate check; carries no command.
    pub ssl_check: bool,
}

impl SlashCommand {
    /// Parse an `application/x-www-form-urlencoded` body. Unknown fields are ignored.
    #[must_use]
    pub fn from_form(body: &[u8]) -> Self {
        let mut cmd = Self::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            let value = value.into_owned();
            match key.as_ref() {
                "command" => cmd.command = Some(value),
                "text" => cmd.text = Some(value),
                "user_id" => cmd.user_id = Some(value),
                "channel_id" => cmd.channel_id = Some(value),
                "response_url" => cmd.response_url = Some(value).filter(|v| !v.is_empty()),
                "ssl_check" => cmd.ssl_check = value == "1",
                _ => {}
            }
        }
        cmd
    }
}
