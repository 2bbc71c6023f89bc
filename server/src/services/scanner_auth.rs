//! Scanner credentials.
//!
//! Gate devices authenticate with a bearer credential in the same signed
//! two-segment format as ticket tokens, carrying the scanner id and an
//! expiry, under a key separate from the QR signing key. Issuing
//! credentials belongs to the accounts collaborator; `issue` exists for it.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::token::{TokenCodec, TokenError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerIdentity {
    pub scanner_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ScannerClaims {
    scanner_id: Uuid,
    expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScannerAuthError {
    #[error("invalid scanner credential")]
    Invalid(#[from] TokenError),

    #[error("scanner credential expired")]
    Expired,
}

#[derive(Debug, Clone)]
pub struct ScannerAuth {
    codec: TokenCodec,
}

impl ScannerAuth {
    pub fn new(codec: TokenCodec) -> Self {
        Self { codec }
    }

    pub fn issue(&self, scanner_id: Uuid, ttl: Duration) -> Result<String, TokenError> {
        self.codec.encode(&ScannerClaims {
            scanner_id,
            expires_at: (Utc::now() + ttl).timestamp(),
        })
    }

    pub fn verify(&self, credential: &str) -> Result<ScannerIdentity, ScannerAuthError> {
        let claims: ScannerClaims = self.codec.decode(credential)?;
        if claims.expires_at <= Utc::now().timestamp() {
            return Err(ScannerAuthError::Expired);
        }
        Ok(ScannerIdentity {
            scanner_id: claims.scanner_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> ScannerAuth {
        ScannerAuth::new(TokenCodec::new(b"scanner-auth-secret-0123456789abcdef").unwrap())
    }

    #[test]
    fn test_issue_and_verify() {
        let scanner_id = Uuid::new_v4();
        let credential = auth().issue(scanner_id, Duration::hours(8)).unwrap();
        assert_eq!(auth().verify(&credential).unwrap().scanner_id, scanner_id);
    }

    #[test]
    fn test_expired_credential_rejected() {
        let credential = auth().issue(Uuid::new_v4(), Duration::seconds(-5)).unwrap();
        assert_eq!(auth().verify(&credential).unwrap_err(), ScannerAuthError::Expired);
    }

    #[test]
    fn test_ticket_key_cannot_mint_scanner_credentials() {
        let ticket_codec = TokenCodec::new(b"qr-signing-secret-0123456789abcdefgh").unwrap();
        let forged = ticket_codec
            .encode(&ScannerClaims {
                scanner_id: Uuid::new_v4(),
                expires_at: i64::MAX,
            })
            .unwrap();
        assert_eq!(
            auth().verify(&forged).unwrap_err(),
            ScannerAuthError::Invalid(TokenError::Signature)
        );
    }
}
