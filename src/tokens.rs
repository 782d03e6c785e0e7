//! Signed bearer tokens for the JSON API.
//!
//! Access and refresh tokens are both HS256 JWTs bound to a user id and an
//! expiry. The `token_type` claim keeps one from being accepted as the other.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub token_type: TokenType,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("expected a {expected:?} token")]
    WrongType { expected: TokenType },

    #[error("token subject is not a user id")]
    BadSubject,

    #[error("token lifetime of {ttl_secs}s overflows the expiry timestamp")]
    ExpiryOverflow { ttl_secs: i64 },
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn issue_pair(&self, user_id: i64) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access: self.issue(user_id, TokenType::Access)?,
            refresh: self.issue(user_id, TokenType::Refresh)?,
        })
    }

    pub fn issue(&self, user_id: i64, token_type: TokenType) -> Result<String, TokenError> {
        let ttl = match token_type {
            TokenType::Access => self.access_ttl_secs,
            TokenType::Refresh => self.refresh_ttl_secs,
        };
        self.issue_at(user_id, token_type, Utc::now().timestamp(), ttl)
    }

    fn issue_at(
        &self,
        user_id: i64,
        token_type: TokenType,
        now: i64,
        ttl_secs: i64,
    ) -> Result<String, TokenError> {
        let exp = now
            .checked_add(ttl_secs)
            .ok_or(TokenError::ExpiryOverflow { ttl_secs })?;
        let claims = Claims {
            sub: user_id.to_string(),
            token_type,
            iat: now,
            exp,
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Checks signature, expiry and kind, returning the user id.
    pub fn verify(&self, token: &str, expected: TokenType) -> Result<i64, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation)?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType { expected });
        }
        data.claims.sub.parse().map_err(|_| TokenError::BadSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(b"test-secret", 300, 86_400)
    }

    #[test]
    fn access_token_round_trips_to_user_id() {
        let issuer = issuer();
        let pair = issuer.issue_pair(42).unwrap();

        assert_eq!(issuer.verify(&pair.access, TokenType::Access).unwrap(), 42);
        assert_eq!(issuer.verify(&pair.refresh, TokenType::Refresh).unwrap(), 42);
        assert_ne!(pair.access, pair.refresh);
    }

    #[test]
    fn token_kinds_are_not_interchangeable() {
        let issuer = issuer();
        let pair = issuer.issue_pair(1).unwrap();

        assert!(matches!(
            issuer.verify(&pair.refresh, TokenType::Access),
            Err(TokenError::WrongType { expected: TokenType::Access })
        ));
        assert!(matches!(
            issuer.verify(&pair.access, TokenType::Refresh),
            Err(TokenError::WrongType { expected: TokenType::Refresh })
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let an_hour_ago = Utc::now().timestamp() - 3600;
        let token = issuer
            .issue_at(1, TokenType::Access, an_hour_ago, 60)
            .unwrap();

        assert!(matches!(issuer.verify(&token, TokenType::Access), Err(TokenError::Jwt(_))));
    }

    #[test]
    fn oversized_lifetime_is_an_error_not_a_wrapped_expiry() {
        let issuer = TokenIssuer::new(b"test-secret", i64::MAX, i64::MAX);

        assert!(matches!(
            issuer.issue(1, TokenType::Access),
            Err(TokenError::ExpiryOverflow { ttl_secs: i64::MAX })
        ));
        assert!(issuer.issue_pair(1).is_err());
    }

    #[test]
    fn foreign_signature_and_garbage_are_rejected() {
        let token = TokenIssuer::new(b"other-secret", 300, 300)
            .issue(1, TokenType::Access)
            .unwrap();

        assert!(issuer().verify(&token, TokenType::Access).is_err());
        assert!(issuer().verify("invalid.token.here", TokenType::Access).is_err());
        assert!(issuer().verify("", TokenType::Access).is_err());
    }
}
