//! # Webhook Signature Verification
//!
//! Authenticates inbound payment events before anything else touches them.
//!
//! ## Header format
//!
//! ```text
//! Stripe-Signature: t=1700000000,v1=5257a869e7ecebeda32affa62cdca3fa51cad7e77a0e56ff536d0ce8e108d8bd
//! ```
//!
//! The signed message is `"{t}." || raw_body`, MAC'd with HMAC-SHA256 under the
//! endpoint secret. Several `v1` entries may be present during secret rotation;
//! any one matching is enough. Unknown schemes are ignored.
//!
//! ## Fail-closed
//!
//! Every path that is not a positive match returns an error: missing header,
//! missing secret, unparseable header, stale timestamp, or no matching
//! signature. Comparison is constant-time via [`Mac::verify_slice`].

use crate::domain::errors::VerificationError;
use crate::domain::secret::Secret;
use crate::ports::TimeSource;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;

type HmacSha256 = Hmac<Sha256>;

/// Name of the signature header, lowercase as HTTP stacks normalize it.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Default replay window for signed timestamps.
pub const DEFAULT_TOLERANCE: Duration = Duration::from_secs(300);

const SCHEME_V1: &str = "v1";

/// Parsed signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

/// Parse `t=<unix>,v1=<hex>[,v1=<hex>...]`.
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, VerificationError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| VerificationError::MalformedHeader("timestamp is not an integer"))?;
                timestamp = Some(parsed);
            }
            SCHEME_V1 => {
                // A v1 entry that is not hex can never match; skip it.
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or(VerificationError::MalformedHeader("no timestamp"))?;
    if signatures.is_empty() {
        return Err(VerificationError::MalformedHeader("no v1 signature"));
    }

    Ok(SignatureHeader {
        timestamp,
        signatures,
    })
}

/// HMAC-SHA256 over `"{timestamp}." || payload`.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Vec<u8> {
    signed_mac(secret, timestamp, payload).finalize().into_bytes().to_vec()
}

/// Build a header value for `payload`, as the payment provider would.
pub fn sign_header(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    format!(
        "t={},{}={}",
        timestamp,
        SCHEME_V1,
        hex::encode(compute_signature(secret, timestamp, payload))
    )
}

fn signed_mac(secret: &str, timestamp: i64, payload: &[u8]) -> HmacSha256 {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac
}

/// Raw bytes that passed verification, with the signed timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedPayload<'a> {
    pub body: &'a [u8],
    pub timestamp: i64,
}

/// Verifies webhook signatures against a single endpoint secret.
pub struct SignatureVerifier {
    secret: Option<Secret>,
    tolerance: Duration,
    clock: Arc<dyn TimeSource>,
}

impl SignatureVerifier {
    /// An empty secret counts as not configured.
    pub fn new(secret: Option<Secret>, tolerance: Duration, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            secret: secret.filter(|s| !s.is_empty()),
            tolerance,
            clock,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Authenticate `body` using the raw header value.
    ///
    /// `body` must be the exact bytes received; any re-serialization breaks
    /// the MAC.
    pub fn verify<'a>(
        &self,
        body: &'a [u8],
        header: Option<&str>,
    ) -> Result<VerifiedPayload<'a>, VerificationError> {
        let header = header.ok_or(VerificationError::MissingHeader)?;
        let secret = self
            .secret
            .as_ref()
            .ok_or(VerificationError::SecretNotConfigured)?;

        let parsed = parse_signature_header(header)?;

        let now = self.clock.now().timestamp();
        let tolerance_secs = self.tolerance.as_secs();
        if now.abs_diff(parsed.timestamp) > tolerance_secs {
            return Err(VerificationError::TimestampOutOfTolerance {
                timestamp: parsed.timestamp,
                now,
                tolerance_secs,
            });
        }

        let mac = signed_mac(secret.expose(), parsed.timestamp, body);
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| mac.clone().verify_slice(candidate).is_ok());

        if !matched {
            return Err(VerificationError::SignatureMismatch);
        }

        Ok(VerifiedPayload {
            body,
            timestamp: parsed.timestamp,
        })
    }
}
