//! Capability tokens for recording streams
//!
//! A token is two unpadded base64url segments joined by a dot:
//! `<base64url(JSON claims)>.<base64url(HMAC-SHA256(secret, payload_segment))>`.
//!
//! The MAC is computed over the *encoded* payload segment string, not over the
//! decoded JSON, so verification never depends on how the issuer serialized the
//! claims.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use time::OffsetDateTime;

type HmacSha256 = Hmac<Sha256>;

/// Token decoding and verification failures
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("{0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("signature mismatch")]
    InvalidSignature,

    #[error("signing secret is not usable as an HMAC key")]
    InvalidSecret,

    #[error("failed to serialize claims: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Claims carried by a stream token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_call_sid: Option<String>,
    /// Absolute expiry, epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl StreamClaims {
    pub fn recording_id(&self) -> Option<&str> {
        non_empty(&self.recording_id)
    }

    pub fn call_id(&self) -> Option<&str> {
        non_empty(&self.call_id)
    }

    pub fn provider_call_sid(&self) -> Option<&str> {
        non_empty(&self.provider_call_sid)
    }

    pub fn has_resource_identifier(&self) -> bool {
        self.recording_id().is_some() || self.call_id().is_some() || self.provider_call_sid().is_some()
    }

    /// Identifier used for logging and the suggested download filename
    pub fn display_id(&self) -> &str {
        self.recording_id()
            .or_else(|| self.call_id())
            .or_else(|| self.provider_call_sid())
            .unwrap_or("recording")
    }
}

/// A verified token together with its raw segments
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub claims: StreamClaims,
    pub payload_segment: String,
    pub signature_segment: String,
}

/// Current wall-clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

fn sign_segment(payload_segment: &str, secret: &[u8]) -> Result<String, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::InvalidSecret)?;
    mac.update(payload_segment.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Encode and sign claims into a token string
pub fn encode(claims: &StreamClaims, secret: &[u8]) -> Result<String, TokenError> {
    let payload_segment = URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?);
    let signature_segment = sign_segment(&payload_segment, secret)?;
    Ok(format!("{payload_segment}.{signature_segment}"))
}

/// Decode and verify a token against `secret` at instant `now_ms`
///
/// Checks run in order: shape, payload decoding, identifier presence, expiry,
/// signature. An expired token is therefore reported as expired whatever its
/// signature.
pub fn decode(token: &str, secret: &[u8], now_ms: i64) -> Result<DecodedToken, TokenError> {
    let segments: Vec<&str> = token.split('.').collect();
    let [payload_segment, signature_segment] = segments.as_slice() else {
        return Err(TokenError::Malformed(format!(
            "expected 2 token segments, got {}",
            segments.len()
        )));
    };
    if payload_segment.is_empty() || signature_segment.is_empty() {
        return Err(TokenError::Malformed("empty token segment".to_string()));
    }

    // Issuers may leave padding on; the unpadded engine rejects it.
    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_segment.trim_end_matches('='))
        .map_err(|e| TokenError::Malformed(format!("payload is not base64url: {e}")))?;
    let claims: StreamClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|e| TokenError::Malformed(format!("payload is not valid claims JSON: {e}")))?;

    if !claims.has_resource_identifier() {
        return Err(TokenError::Malformed(
            "token carries no resource identifier".to_string(),
        ));
    }

    match claims.exp {
        Some(exp) if now_ms <= exp => {}
        _ => return Err(TokenError::Expired),
    }

    let expected = sign_segment(payload_segment, secret)?;
    let provided = signature_segment.trim_end_matches('=');
    if !bool::from(expected.as_bytes().ct_eq(provided.as_bytes())) {
        return Err(TokenError::InvalidSignature);
    }

    Ok(DecodedToken {
        claims,
        payload_segment: payload_segment.to_string(),
        signature_segment: signature_segment.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-signing-secret";
    const NOW: i64 = 1_700_000_000_000;

    fn claims_for_recording(id: &str) -> StreamClaims {
        StreamClaims {
            recording_id: Some(id.to_string()),
            exp: Some(NOW + 60_000),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let claims = StreamClaims {
            call_id: Some("C1".to_string()),
            provider_call_sid: Some("CA123".to_string()),
            exp: Some(NOW + 1),
            ..Default::default()
        };
        let token = encode(&claims, SECRET).unwrap();
        let decoded = decode(&token, SECRET, NOW).unwrap();

        assert_eq!(decoded.claims, claims);
        assert_eq!(
            format!("{}.{}", decoded.payload_segment, decoded.signature_segment),
            token
        );
    }

    #[test]
    fn test_token_segments_are_unpadded_base64url() {
        let token = encode(&claims_for_recording("RE1"), SECRET).unwrap();
        assert!(!token.contains('='));
        assert!(!token.contains('+'));
        assert!(!token.contains('/'));
        assert_eq!(token.split('.').count(), 2);
    }

    #[test]
    fn test_claims_use_camel_case_keys() {
        let claims = StreamClaims {
            recording_id: Some("RE1".into()),
            provider_call_sid: Some("CA1".into()),
            exp: Some(5),
            ..Default::default()
        };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["recordingId"], "RE1");
        assert_eq!(json["providerCallSid"], "CA1");
        assert_eq!(json["exp"], 5);
        assert!(json.get("callId").is_none());
    }

    #[test]
    fn test_every_single_bit_signature_mutation_rejected() {
        let token = encode(&claims_for_recording("RE1"), SECRET).unwrap();
        let (payload, signature) = token.split_once('.').unwrap();
        let raw = URL_SAFE_NO_PAD.decode(signature).unwrap();

        for bit in 0..raw.len() * 8 {
            let mut mutated = raw.clone();
            mutated[bit / 8] ^= 1 << (bit % 8);
            let forged = format!("{payload}.{}", URL_SAFE_NO_PAD.encode(&mutated));
            assert!(
                matches!(decode(&forged, SECRET, NOW), Err(TokenError::InvalidSignature)),
                "bit {bit} mutation was accepted"
            );
        }
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = encode(&claims_for_recording("RE1"), SECRET).unwrap();
        assert!(matches!(
            decode(&token, b"other-secret", NOW),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_signature_covers_encoded_payload() {
        // Same claims, different JSON spelling: the signature must not carry over.
        let token = encode(&claims_for_recording("RE1"), SECRET).unwrap();
        let (_, signature) = token.split_once('.').unwrap();
        let respaced = URL_SAFE_NO_PAD.encode(format!(
            r#"{{ "recordingId": "RE1", "exp": {} }}"#,
            NOW + 60_000
        ));
        assert!(matches!(
            decode(&format!("{respaced}.{signature}"), SECRET, NOW),
            Err(TokenError::InvalidSignature)
        ));
    }

    #[test]
    fn test_expired_token_reported_before_signature() {
        let claims = StreamClaims {
            recording_id: Some("RE1".into()),
            exp: Some(NOW - 1),
            ..Default::default()
        };
        let token = encode(&claims, SECRET).unwrap();
        assert!(matches!(decode(&token, SECRET, NOW), Err(TokenError::Expired)));

        let (payload, _) = token.split_once('.').unwrap();
        let forged = format!("{payload}.not-a-real-signature");
        assert!(matches!(decode(&forged, SECRET, NOW), Err(TokenError::Expired)));
    }

    #[test]
    fn test_expiry_boundary_is_inclusive() {
        let claims = StreamClaims {
            recording_id: Some("RE1".into()),
            exp: Some(NOW),
            ..Default::default()
        };
        let token = encode(&claims, SECRET).unwrap();
        assert!(decode(&token, SECRET, NOW).is_ok());
        assert!(matches!(decode(&token, SECRET, NOW + 1), Err(TokenError::Expired)));
    }

    #[test]
    fn test_missing_exp_is_expired() {
        let claims = StreamClaims {
            recording_id: Some("RE1".into()),
            ..Default::default()
        };
        let token = encode(&claims, SECRET).unwrap();
        assert!(matches!(decode(&token, SECRET, NOW), Err(TokenError::Expired)));
    }

    #[test]
    fn test_segment_count_must_be_two() {
        for token in ["", "abc", "a.b.c", "a.b.c.d"] {
            assert!(
                matches!(decode(token, SECRET, NOW), Err(TokenError::Malformed(_))),
                "accepted '{token}'"
            );
        }
    }

    #[test]
    fn test_payload_not_base64_is_malformed() {
        assert!(matches!(
            decode("***.abc", SECRET, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_payload_not_json_is_malformed() {
        let payload = URL_SAFE_NO_PAD.encode("not-json");
        let signature = sign_segment(&payload, SECRET).unwrap();
        assert!(matches!(
            decode(&format!("{payload}.{signature}"), SECRET, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_padded_payload_accepted() {
        let claims = claims_for_recording("RE1");
        let unpadded = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let padding = (4 - unpadded.len() % 4) % 4;
        let padded = format!("{unpadded}{}", "=".repeat(padding));
        // The MAC is over the string as transmitted.
        let signature = sign_segment(&padded, SECRET).unwrap();

        let decoded = decode(&format!("{padded}.{signature}"), SECRET, NOW).unwrap();
        assert_eq!(decoded.claims, claims);
    }

    #[test]
    fn test_token_without_identifier_is_malformed() {
        let claims = StreamClaims {
            call_id: Some("   ".into()),
            exp: Some(NOW + 1000),
            ..Default::default()
        };
        let token = encode(&claims, SECRET).unwrap();
        assert!(matches!(
            decode(&token, SECRET, NOW),
            Err(TokenError::Malformed(_))
        ));
    }

    #[test]
    fn test_provider_call_sid_alone_is_an_identifier() {
        let claims = StreamClaims {
            provider_call_sid: Some("CA1".into()),
            exp: Some(NOW + 1000),
            ..Default::default()
        };
        let token = encode(&claims, SECRET).unwrap();
        let decoded = decode(&token, SECRET, NOW).unwrap();
        assert_eq!(decoded.claims.display_id(), "CA1");
    }
}
