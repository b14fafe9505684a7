use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use ed25519_dalek::{Signature, VerifyingKey};
use std::sync::Arc;

use crate::services::AppState;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

const MAX_BODY_BYTES: usize = 64 * 1024;
const MAX_CLOCK_SKEW_SECONDS: u64 = 300;

#[derive(Debug, PartialEq, Eq)]
pub enum SignatureError {
    MissingHeader,
    Malformed,
    Stale,
    Invalid,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MissingHeader => write!(f, "Missing signature headers"),
            SignatureError::Malformed => write!(f, "Malformed signature or timestamp"),
            SignatureError::Stale => write!(f, "Signature timestamp outside allowed window"),
            SignatureError::Invalid => write!(f, "Invalid request signature"),
        }
    }
}

impl std::error::Error for SignatureError {}

/// Checks Discord's Ed25519 signature over `timestamp || body`.
#[derive(Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> anyhow::Result<Self> {
        let bytes: [u8; 32] = hex::decode(public_key.trim())?
            .try_into()
            .map_err(|_| anyhow::anyhow!("Discord public key must be 32 bytes"))?;
        let key = VerifyingKey::from_bytes(&bytes)?;
        Ok(Self { key })
    }

    pub fn verify(
        &self,
        signature_hex: &str,
        timestamp: &str,
        body: &[u8],
        now_unix: i64,
    ) -> Result<(), SignatureError> {
        let sent_at: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;
        // Header is unauthenticated here; extreme values must not overflow.
        match now_unix.checked_sub(sent_at).map(i64::unsigned_abs) {
            Some(skew) if skew <= MAX_CLOCK_SKEW_SECONDS => {}
            _ => return Err(SignatureError::Stale),
        }

        let signature_bytes: [u8; 64] = hex::decode(signature_hex)
            .map_err(|_| SignatureError::Malformed)?
            .try_into()
            .map_err(|_| SignatureError::Malformed)?;
        let signature = Signature::from_bytes(&signature_bytes);

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify_strict(&message, &signature)
            .map_err(|_| SignatureError::Invalid)
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, SignatureError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or(SignatureError::MissingHeader)
}

/// Rejects any request that Discord did not sign.
pub async fn signature_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)?;

    let verified = header(&parts.headers, SIGNATURE_HEADER).and_then(|signature| {
        let timestamp = header(&parts.headers, TIMESTAMP_HEADER)?;
        state
            .verifier
            .verify(signature, timestamp, &bytes, chrono::Utc::now().timestamp())
    });

    if let Err(e) = verified {
        tracing::warn!("Interaction signature check failed: {}", e);
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
