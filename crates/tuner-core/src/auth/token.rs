//! Signed bearer tokens
//!
//! A token is `hex(claims_json).hex(signature)` where the signature is an
//! Ed25519 signature over the claims JSON bytes.

use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Claims carried by a bearer token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Account email
    pub sub: String,
    /// Account user id
    pub uid: String,
    /// Issued at (unix seconds)
    pub iat: i64,
    /// Expires at (unix seconds)
    pub exp: i64,
}

/// Issues and verifies bearer tokens
pub struct TokenIssuer {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl: Duration,
}

impl fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("verifying_key", &hex::encode(self.verifying_key.as_bytes()))
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    /// Derive the signing key from a secret
    ///
    /// Issuers built from the same secret accept each other's tokens.
    #[must_use]
    pub fn from_secret(secret: &str, ttl: Duration) -> Self {
        let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self::from_key(SigningKey::from_bytes(&seed), ttl)
    }

    /// Random signing key; tokens die with the process
    #[must_use]
    pub fn generate(ttl: Duration) -> Self {
        Self::from_key(SigningKey::generate(&mut rand::rngs::OsRng), ttl)
    }

    fn from_key(signing_key: SigningKey, ttl: Duration) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            ttl,
        }
    }

    /// Token lifetime
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for an account
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Serialization`] if the claims cannot be encoded.
    pub fn issue(&self, email: &str, uid: &str) -> AuthResult<String> {
        self.issue_at(email, uid, Utc::now())
    }

    /// Issue a token as of `now`
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Serialization`] if the claims cannot be encoded.
    pub fn issue_at(&self, email: &str, uid: &str, now: DateTime<Utc>) -> AuthResult<String> {
        let claims = TokenClaims {
            sub: email.to_string(),
            uid: uid.to_string(),
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        let payload = serde_json::to_vec(&claims)?;
        let signature = self.signing_key.sign(&payload);
        Ok(format!(
            "{}.{}",
            hex::encode(&payload),
            hex::encode(signature.to_bytes())
        ))
    }

    /// Verify a token and return its claims
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for malformed or forged tokens and
    /// [`AuthError::TokenExpired`] once `exp` has passed.
    pub fn verify(&self, token: &str) -> AuthResult<TokenClaims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`
    ///
    /// # Errors
    ///
    /// See [`TokenIssuer::verify`].
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> AuthResult<TokenClaims> {
        let (payload_hex, signature_hex) = token
            .split_once('.')
            .ok_or_else(|| AuthError::InvalidToken("missing separator".into()))?;
        let payload = hex::decode(payload_hex)
            .map_err(|e| AuthError::InvalidToken(format!("payload: {e}")))?;
        let signature_bytes = hex::decode(signature_hex)
            .map_err(|e| AuthError::InvalidToken(format!("signature: {e}")))?;
        let signature = Signature::from_slice(&signature_bytes)
            .map_err(|e| AuthError::InvalidToken(format!("signature: {e}")))?;

        self.verifying_key
            .verify(&payload, &signature)
            .map_err(|_| AuthError::InvalidToken("bad signature".into()))?;

        let claims: TokenClaims = serde_json::from_slice(&payload)
            .map_err(|e| AuthError::InvalidToken(format!("claims: {e}")))?;
        if now.timestamp() >= claims.exp {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::from_secret("a-test-secret-of-some-length", Duration::minutes(30))
    }

    #[test]
    fn issue_and_verify() {
        let issuer = issuer();
        let token = issuer.issue("a@example.com", "user_1").unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.sub, "a@example.com");
        assert_eq!(claims.uid, "user_1");
        assert_eq!(claims.exp - claims.iat, 30 * 60);
    }

    #[test]
    fn same_secret_same_key() {
        let token = issuer().issue("a@example.com", "u").unwrap();
        assert!(issuer().verify(&token).is_ok());
    }

    #[test]
    fn other_key_rejects() {
        let token = issuer().issue("a@example.com", "u").unwrap();
        let other = TokenIssuer::generate(Duration::minutes(30));
        assert!(matches!(other.verify(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expiry() {
        let issuer = issuer();
        let issued = Utc::now() - Duration::minutes(31);
        let token = issuer.issue_at("a@example.com", "u", issued).unwrap();
        assert!(matches!(issuer.verify(&token), Err(AuthError::TokenExpired)));
        assert!(issuer.verify_at(&token, issued + Duration::minutes(29)).is_ok());
    }

    #[test]
    fn tampered_claims_rejected() {
        let issuer = issuer();
        let token = issuer.issue("a@example.com", "user_1").unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged = TokenClaims {
            sub: "a@example.com".into(),
            uid: "admin".into(),
            iat: 0,
            exp: i64::MAX,
        };
        let forged_hex = hex::encode(serde_json::to_vec(&forged).unwrap());
        let forged_token = format!("{forged_hex}.{signature}");

        assert!(matches!(issuer.verify(&forged_token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn malformed_tokens() {
        let issuer = issuer();
        for bad in ["", "abc", "zz.zz", "00.00", "."] {
            assert!(matches!(issuer.verify(bad), Err(AuthError::InvalidToken(_))), "{bad:?}");
        }
    }
}
