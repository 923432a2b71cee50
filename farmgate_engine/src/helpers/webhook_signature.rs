//! # Payment notification signatures
//!
//! The payment provider signs every notification it sends us with a secret shared out of band. The signature travels
//! in a header of the form
//!
//! ```text
//!    t={unix_timestamp},v1={signature}[,v1={signature}...]
//! ```
//!
//! where `signature` is the hex encoded `HMAC-SHA256(secret, "{unix_timestamp}.{raw body}")`. More than one `v1` entry
//! may be present while a secret is being rotated; the notification is accepted if any of them matches.
//!
//! Signatures are compared in constant time. Notifications whose timestamp lies outside the tolerance window are
//! rejected, so that a captured notification cannot be replayed later.
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// The header carrying the signature of a payment notification.
pub const SIGNATURE_HEADER: &str = "X-Farmgate-Signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("No signing secret has been configured")]
    MissingSecret,
    #[error("Malformed signature header: {0}")]
    MalformedHeader(String),
    #[error("The signature does not match the payload")]
    Mismatch,
    #[error("The signature timestamp is {0} seconds away from the current time")]
    OutsideTolerance(i64),
}

/// The parsed contents of a signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookSignature {
    pub timestamp: i64,
    pub signatures: Vec<Vec<u8>>,
}

impl FromStr for WebhookSignature {
    type Err = SignatureError;

    fn from_str(header: &str) -> Result<Self, Self::Err> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',').map(str::trim) {
            if let Some(t) = part.strip_prefix("t=") {
                let t = t.parse::<i64>().map_err(|e| SignatureError::MalformedHeader(format!("timestamp: {e}")))?;
                timestamp = Some(t);
            } else if let Some(v) = part.strip_prefix("v1=") {
                let bytes = hex::decode(v).map_err(|e| SignatureError::MalformedHeader(format!("signature: {e}")))?;
                signatures.push(bytes);
            }
        }
        let timestamp = timestamp.ok_or_else(|| SignatureError::MalformedHeader("missing timestamp".into()))?;
        if signatures.is_empty() {
            return Err(SignatureError::MalformedHeader("missing v1 signature".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}

fn mac_for(secret: &str, timestamp: i64, body: &[u8]) -> Result<HmacSha256, SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::MissingSecret);
    }
    // HMAC accepts keys of any length, so this cannot fail for a non-empty key
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::MissingSecret)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Produces the signature header value for `body`, as the payment provider would.
pub fn sign_payload(secret: &str, timestamp: i64, body: &[u8]) -> Result<String, SignatureError> {
    let mac = mac_for(secret, timestamp, body)?;
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("t={timestamp},v1={signature}"))
}

/// Verifies the signature header against the raw request body.
///
/// `tolerance` is the largest accepted distance between the signature timestamp and `now`. `None` disables the
/// check.
pub fn verify_webhook_signature(
    body: &[u8],
    header: &str,
    secret: &str,
    tolerance: Option<Duration>,
    now: DateTime<Utc>,
) -> Result<(), SignatureError> {
    let header = header.parse::<WebhookSignature>()?;
    let mac = mac_for(secret, header.timestamp, body)?;
    let matched = header.signatures.iter().any(|sig| mac.clone().verify_slice(sig).is_ok());
    if !matched {
        return Err(SignatureError::Mismatch);
    }
    if let Some(tolerance) = tolerance {
        let age = (now.timestamp() - header.timestamp).abs();
        if age > tolerance.num_seconds() {
            return Err(SignatureError::OutsideTolerance(age));
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    const SECRET: &str = "whsec_farmgate_test";
    const BODY: &[u8] = br#"{"id":"evt_1","type":"payment_intent.succeeded"}"#;

    #[test]
    fn valid_signature_is_accepted() {
        let now = Utc::now();
        let header = sign_payload(SECRET, now.timestamp(), BODY).unwrap();
        assert!(header.starts_with(&format!("t={},v1=", now.timestamp())));
        let result = verify_webhook_signature(BODY, &header, SECRET, Some(Duration::seconds(300)), now);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let now = Utc::now();
        let header = sign_payload(SECRET, now.timestamp(), BODY).unwrap();
        let tampered = br#"{"id":"evt_1","type":"payment_intent.succeeded","x":1}"#;
        let result = verify_webhook_signature(tampered, &header, SECRET, None, now);
        assert_eq!(result, Err(SignatureError::Mismatch));
        let result = verify_webhook_signature(BODY, &header, "another secret", None, now);
        assert_eq!(result, Err(SignatureError::Mismatch));
    }

    #[test]
    fn stale_signature_is_rejected() {
        let now = Utc::now();
        let signed_at = now.timestamp() - 301;
        let header = sign_payload(SECRET, signed_at, BODY).unwrap();
        let result = verify_webhook_signature(BODY, &header, SECRET, Some(Duration::seconds(300)), now);
        assert_eq!(result, Err(SignatureError::OutsideTolerance(301)));
        assert!(verify_webhook_signature(BODY, &header, SECRET, None, now).is_ok());
    }

    #[test]
    fn any_matching_signature_is_enough() {
        let now = Utc::now();
        let good = sign_payload(SECRET, now.timestamp(), BODY).unwrap();
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={good_sig}", now.timestamp(), "00".repeat(32));
        assert!(verify_webhook_signature(BODY, &header, SECRET, None, now).is_ok());
    }

    #[test]
    fn malformed_headers() {
        let now = Utc::now();
        for header in ["", "v1=abcd", "t=123", "t=abc,v1=00", "t=123,v1=zz"] {
            let err = verify_webhook_signature(BODY, header, SECRET, None, now).unwrap_err();
            assert!(matches!(err, SignatureError::MalformedHeader(_)), "{header}: {err}");
        }
        let header = sign_payload(SECRET, now.timestamp(), BODY).unwrap();
        assert_eq!(verify_webhook_signature(BODY, &header, "", None, now), Err(SignatureError::MissingSecret));
    }
}
