//! Bearer and share-unlock token minting

use chrono::{DateTime, Duration, Utc};
use depot_common::DepotError;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: Uuid,
    pub username: String,
    pub is_admin: bool,
    pub iat: i64,
    pub exp: i64,
}

/// Claims carried by a share-password unlock token. Scoped to one link and
/// short-lived; holding one substitutes for re-sending the password on each
/// request within the browsing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareUnlockClaims {
    pub link_id: Uuid,
    pub purpose: String,
    pub exp: i64,
}

const SHARE_UNLOCK_PURPOSE: &str = "share-unlock";

/// Lifetime of a share unlock, in hours.
const SHARE_UNLOCK_TTL_HOURS: i64 = 12;

/// Signs and verifies every token the server issues.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Mint a bearer token for a user. Returns the token and its expiry.
    pub fn mint(
        &self,
        user_id: Uuid,
        username: &str,
        is_admin: bool,
        ttl_hours: i64,
    ) -> Result<(String, DateTime<Utc>), DepotError> {
        let now = Utc::now();
        let expires_at = now + Duration::hours(ttl_hours);
        let claims = Claims {
            sub: user_id,
            username: username.to_string(),
            is_admin,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| DepotError::Storage(format!("token encoding failed: {e}")))?;

        Ok((token, expires_at))
    }

    /// Verify signature and expiry. Session-row existence is checked by the
    /// caller; this alone does not authenticate a request.
    pub fn verify(&self, token: &str) -> Result<Claims, DepotError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|_| DepotError::Unauthenticated("invalid or expired token".into()))
    }

    pub fn mint_share_unlock(&self, link_id: Uuid) -> Result<String, DepotError> {
        let claims = ShareUnlockClaims {
            link_id,
            purpose: SHARE_UNLOCK_PURPOSE.to_string(),
            exp: (Utc::now() + Duration::hours(SHARE_UNLOCK_TTL_HOURS)).timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| DepotError::Storage(format!("token encoding failed: {e}")))
    }

    /// True when `token` is a live unlock for exactly this link.
    pub fn verify_share_unlock(&self, token: &str, link_id: Uuid) -> bool {
        decode::<ShareUnlockClaims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims.link_id == link_id && data.claims.purpose == SHARE_UNLOCK_PURPOSE)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TokenSigner {
        TokenSigner::new("test-secret-test-secret-test-secret")
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let signer = signer();
        let user_id = Uuid::new_v4();
        let (token, expires_at) = signer.mint(user_id, "alice", false, 24).unwrap();

        let claims = signer.verify(&token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "alice");
        assert!(!claims.is_admin);
        assert_eq!(claims.exp, expires_at.timestamp());
    }

    #[test]
    fn tampered_token_is_rejected() {
        let signer = signer();
        let (token, _) = signer.mint(Uuid::new_v4(), "alice", false, 24).unwrap();
        let other = TokenSigner::new("another-secret-another-secret-xx");
        assert!(other.verify(&token).is_err());
        assert!(signer.verify(&format!("{token}x")).is_err());
    }

    #[test]
    fn share_unlock_is_link_scoped() {
        let signer = signer();
        let link = Uuid::new_v4();
        let unlock = signer.mint_share_unlock(link).unwrap();
        assert!(signer.verify_share_unlock(&unlock, link));
        assert!(!signer.verify_share_unlock(&unlock, Uuid::new_v4()));
    }

    #[test]
    fn bearer_token_is_not_a_share_unlock() {
        let signer = signer();
        let link = Uuid::new_v4();
        let (token, _) = signer.mint(link, "alice", true, 24).unwrap();
        assert!(!signer.verify_share_unlock(&token, link));
    }
}
