//! Signed two-segment tokens: `base64(json payload) + "." + base64(hmac tag)`.
//!
//! The tag is HMAC-SHA256 over the serialized JSON bytes and is checked in
//! constant time before the payload is parsed, so an unauthenticated
//! payload is never looked at.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = '.';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("signing key is empty")]
    EmptyKey,

    #[error("token must have exactly two segments")]
    Malformed,

    #[error("token segment is not valid base64")]
    Encoding,

    #[error("token signature does not match")]
    Signature,

    #[error("token payload is not the expected structure")]
    Payload,

    #[error("failed to serialize token payload")]
    Serialize,
}

/// Payload embedded in a ticket's QR code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketClaims {
    pub ticket_id: Uuid,
    pub unique_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,
}

impl TicketClaims {
    pub fn new(ticket_id: Uuid, unique_code: impl Into<String>) -> Self {
        Self {
            ticket_id,
            unique_code: unique_code.into(),
            issued_at: Some(Utc::now().timestamp()),
        }
    }
}

#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha256,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: &[u8]) -> Result<Self, TokenError> {
        if secret.is_empty() {
            return Err(TokenError::EmptyKey);
        }
        let mac = HmacSha256::new_from_slice(secret).map_err(|_| TokenError::EmptyKey)?;
        Ok(Self { mac })
    }

    pub fn encode<T: Serialize>(&self, claims: &T) -> Result<String, TokenError> {
        let payload = serde_json::to_vec(claims).map_err(|_| TokenError::Serialize)?;
        let tag = self.tag(&payload);
        Ok(format!(
            "{}{}{}",
            STANDARD.encode(&payload),
            SEPARATOR,
            STANDARD.encode(tag)
        ))
    }

    pub fn decode<T: DeserializeOwned>(&self, token: &str) -> Result<T, TokenError> {
        let mut segments = token.trim().split(SEPARATOR);
        let (payload_b64, tag_b64) = match (segments.next(), segments.next(), segments.next()) {
            (Some(payload), Some(tag), None) if !payload.is_empty() && !tag.is_empty() => {
                (payload, tag)
            }
            _ => return Err(TokenError::Malformed),
        };

        let payload = STANDARD
            .decode(payload_b64)
            .map_err(|_| TokenError::Encoding)?;
        let supplied_tag = STANDARD.decode(tag_b64).map_err(|_| TokenError::Encoding)?;

        let expected_tag = self.tag(&payload);
        if !constant_time_eq::constant_time_eq(&expected_tag, &supplied_tag) {
            return Err(TokenError::Signature);
        }

        serde_json::from_slice(&payload).map_err(|_| TokenError::Payload)
    }

    fn tag(&self, payload: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &[u8] = b"test-qr-signing-secret-0123456789abcdef";

    fn codec() -> TokenCodec {
        TokenCodec::new(SECRET).unwrap()
    }

    fn encoded_claims() -> (TicketClaims, String) {
        let claims = TicketClaims::new(Uuid::new_v4(), "f3b1c2d4");
        let token = codec().encode(&claims).unwrap();
        (claims, token)
    }

    #[test]
    fn test_encode_then_decode() {
        let (claims, token) = encoded_claims();
        assert_eq!(token.matches('.').count(), 1);
        let decoded: TicketClaims = codec().decode(&token).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_empty_key_rejected() {
        assert_eq!(TokenCodec::new(b"").unwrap_err(), TokenError::EmptyKey);
    }

    #[test]
    fn test_wrong_segment_count_is_malformed() {
        let (_, token) = encoded_claims();
        let c = codec();
        assert_eq!(c.decode::<TicketClaims>("").unwrap_err(), TokenError::Malformed);
        assert_eq!(c.decode::<TicketClaims>("abc").unwrap_err(), TokenError::Malformed);
        assert_eq!(
            c.decode::<TicketClaims>(&format!("{token}.extra")).unwrap_err(),
            TokenError::Malformed
        );
        assert_eq!(c.decode::<TicketClaims>(".tag").unwrap_err(), TokenError::Malformed);
    }

    #[test]
    fn test_non_base64_segment_rejected() {
        assert_eq!(
            codec().decode::<TicketClaims>("not*base64.also!not").unwrap_err(),
            TokenError::Encoding
        );
    }

    #[test]
    fn test_other_key_rejected() {
        let (_, token) = encoded_claims();
        let other = TokenCodec::new(b"a-completely-different-secret-value!!").unwrap();
        assert_eq!(
            other.decode::<TicketClaims>(&token).unwrap_err(),
            TokenError::Signature
        );
    }

    #[test]
    fn test_swapped_payload_rejected() {
        let (_, token) = encoded_claims();
        let (_, other_token) = encoded_claims();
        let tag = token.split('.').nth(1).unwrap();
        let other_payload = other_token.split('.').next().unwrap();
        let forged = format!("{other_payload}.{tag}");
        assert_eq!(
            codec().decode::<TicketClaims>(&forged).unwrap_err(),
            TokenError::Signature
        );
    }

    #[test]
    fn test_signed_garbage_payload_rejected() {
        let c = codec();
        let token = c.encode(&serde_json::json!({ "ticket": 1 })).unwrap();
        assert_eq!(c.decode::<TicketClaims>(&token).unwrap_err(), TokenError::Payload);
    }

    #[test]
    fn test_issued_at_is_optional() {
        let c = codec();
        let ticket_id = Uuid::new_v4();
        let token = c
            .encode(&serde_json::json!({ "ticket_id": ticket_id, "unique_code": "x" }))
            .unwrap();
        let decoded: TicketClaims = c.decode(&token).unwrap();
        assert_eq!(decoded.ticket_id, ticket_id);
        assert_eq!(decoded.issued_at, None);
    }

    #[test]
    fn test_debug_does_not_leak_key() {
        let rendered = format!("{:?}", codec());
        assert!(!rendered.contains("test-qr-signing-secret"));
    }

    proptest! {
        #[test]
        fn prop_any_single_byte_tag_change_is_rejected(index in 0usize..32, flip in 1u8..=255) {
            let (_, token) = encoded_claims();
            let (payload_b64, tag_b64) = token.split_once('.').unwrap();
            let mut tag = STANDARD.decode(tag_b64).unwrap();
            tag[index] ^= flip;
            let tampered = format!("{payload_b64}.{}", STANDARD.encode(&tag));

            prop_assert_eq!(
                codec().decode::<TicketClaims>(&tampered).unwrap_err(),
                TokenError::Signature
            );
        }
    }
}
