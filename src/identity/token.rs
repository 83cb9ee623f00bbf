//! Bearer token inspection.
//!
//! Access tokens are standard three-part JWTs (`header.payload.signature`). The admin
//! client never verifies signatures (the API does that); it only reads the `exp` claim
//! to decide whether a stored token is still worth presenting.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde_json::{Map, Value};
use thiserror::Error;

use super::clock::{Clock, SystemClock};

// base64url with or without `=` padding; issuers differ.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("token must have 3 dot-separated segments, found {0}")]
    Segments(usize),
    #[error("token payload is not valid base64url: {0}")]
    Base64(String),
    #[error("token payload is not a JSON object: {0}")]
    Payload(String),
    #[error("token carries no usable exp claim")]
    MissingExpiry,
}

/// Decode the claims object of a JWT without verifying it.
pub fn decode_claims(token: &str) -> Result<Map<String, Value>, DecodeError> {
    let segments: Vec<&str> = token.split('.').collect();
    // Exactly three parts, though only the payload is read.
    if segments.len() != 3 {
        return Err(DecodeError::Segments(segments.len()));
    }
    let bytes = PAYLOAD_ENGINE
        .decode(segments[1])
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|e| DecodeError::Payload(e.to_string()))?;
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(other) => Err(DecodeError::Payload(format!("expected object, got {other}"))),
        Err(e) => Err(DecodeError::Payload(e.to_string())),
    }
}

/// Expiry of the token as Unix seconds.
///
/// A missing, non-numeric or zero `exp` is reported as [`DecodeError::MissingExpiry`].
pub fn decode_expiry(token: &str) -> Result<f64, DecodeError> {
    let claims = decode_claims(token)?;
    match claims.get("exp").and_then(Value::as_f64) {
        Some(exp) if exp != 0.0 => Ok(exp),
        _ => Err(DecodeError::MissingExpiry),
    }
}

/// Strictly `exp > now`; a token expiring exactly at `now_secs` is already dead.
pub fn is_live_at(token: &str, now_secs: f64) -> bool {
    match decode_expiry(token) {
        Ok(exp) => exp > now_secs,
        Err(_) => false,
    }
}

pub fn is_live_with(token: &str, clock: &dyn Clock) -> bool {
    is_live_at(token, clock.now_secs())
}

pub fn is_live(token: &str) -> bool {
    is_live_with(token, &SystemClock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use serde_json::json;

    fn token_with(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2ln")
    }

    #[test]
    fn liveness_is_strict_at_the_boundary() {
        let t = token_with(&json!({"sub": "u1", "exp": 1_700_000_000}));
        assert!(is_live_at(&t, 1_699_999_999.0));
        assert!(is_live_at(&t, 1_699_999_999.999));
        assert!(!is_live_at(&t, 1_700_000_000.0));
        assert!(!is_live_at(&t, 1_700_000_001.0));
    }

    #[test]
    fn malformed_tokens_are_never_live() {
        for bad in ["", "abc", "a.b", "a.b.c.d", "x.!!!.y", "x..y"] {
            assert!(!is_live_at(bad, 0.0), "{bad:?} should not be live");
        }
        assert!(matches!(decode_expiry("a.b"), Err(DecodeError::Segments(2))));
        assert!(matches!(decode_expiry("x.!!!.y"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn live_payload_with_wrong_part_count_is_rejected() {
        let t = token_with(&json!({"exp": 4_102_444_800u64}));
        assert!(is_live_at(&t, 0.0));
        let payload = t.split('.').nth(1).unwrap().to_string();
        assert!(matches!(decode_expiry(&format!("x.{payload}")), Err(DecodeError::Segments(2))));
        assert!(matches!(decode_expiry(&format!("{t}.extra")), Err(DecodeError::Segments(4))));
    }

    #[test]
    fn payload_must_be_an_object() {
        let arr = format!("h.{}.s", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(matches!(decode_claims(&arr), Err(DecodeError::Payload(_))));
        let junk = format!("h.{}.s", URL_SAFE_NO_PAD.encode("not json"));
        assert!(matches!(decode_claims(&junk), Err(DecodeError::Payload(_))));
    }

    #[test]
    fn missing_or_unusable_exp() {
        assert_eq!(decode_expiry(&token_with(&json!({"sub": "u1"}))), Err(DecodeError::MissingExpiry));
        assert_eq!(decode_expiry(&token_with(&json!({"exp": "tomorrow"}))), Err(DecodeError::MissingExpiry));
        assert_eq!(decode_expiry(&token_with(&json!({"exp": 0}))), Err(DecodeError::MissingExpiry));
        assert!(!is_live_at(&token_with(&json!({"iat": 5})), 0.0));
    }

    #[test]
    fn padded_payloads_decode() {
        let padded = base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":42}"#);
        assert!(padded.ends_with('='));
        let t = format!("h.{padded}.s");
        assert_eq!(decode_expiry(&t), Ok(42.0));
    }

    #[test]
    fn fractional_exp_is_honoured() {
        let t = token_with(&json!({"exp": 100.5}));
        assert!(is_live_at(&t, 100.25));
        assert!(!is_live_at(&t, 100.5));
    }

    #[test]
    fn clock_driven_liveness() {
        let clock = crate::identity::ManualClock::at_secs(1_000);
        let t = token_with(&json!({"exp": 1_001}));
        assert!(is_live_with(&t, &clock));
        clock.advance_secs(1);
        assert!(!is_live_with(&t, &clock));
    }
}
