pub mod admin;
pub mod password;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::error::ApiError;

/// Claim set carried by access tokens. Stateless: validity is fully
/// determined by the signature and expiry.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Admin id.
    pub sub: i32,
    pub login: String,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn new(security: &SecurityConfig, id: i32, login: String) -> Self {
        let now = Utc::now();
        let exp = now + Duration::hours(security.jwt_expiry_hours as i64);
        Self {
            sub: id,
            login,
            iat: now.timestamp(),
            exp: exp.timestamp(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not configured")]
    MissingSecret,
    #[error("token generation failed: {0}")]
    Generation(String),
    #[error("token expired")]
    Expired,
    #[error("malformed token")]
    Malformed,
    #[error("invalid token signature")]
    InvalidSignature,
    #[error("invalid token")]
    Invalid,
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::MissingSecret | TokenError::Generation(_) => {
                ApiError::internal(err.to_string())
            }
            TokenError::Expired => ApiError::TokenExpired,
            TokenError::Malformed => ApiError::TokenMalformed,
            TokenError::InvalidSignature | TokenError::Invalid => ApiError::TokenInvalid,
        }
    }
}

/// Sign a new access token for the given admin identity.
pub fn issue_token(security: &SecurityConfig, id: i32, login: &str) -> Result<String, TokenError> {
    if security.jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let claims = Claims::new(security, id, login.to_string());
    let key = EncodingKey::from_secret(security.jwt_secret.as_bytes());
    encode(&Header::default(), &claims, &key).map_err(|e| TokenError::Generation(e.to_string()))
}

/// Check signature and expiry, returning the embedded claims.
///
/// Expired, malformed and tampered tokens map to distinct error variants so
/// the auth gate can report a stable category for each (all still 401).
pub fn verify_token(security: &SecurityConfig, token: &str) -> Result<Claims, TokenError> {
    if security.jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let key = DecodingKey::from_secret(security.jwt_secret.as_bytes());
    let validation = Validation::default();

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(err) => {
            use jsonwebtoken::errors::ErrorKind;
            Err(match err.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                    TokenError::Malformed
                }
                _ => TokenError::Invalid,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;

    fn security(secret: &str) -> SecurityConfig {
        SecurityConfig {
            jwt_secret: secret.to_string(),
            jwt_expiry_hours: 24,
            allow_registration: true,
            cors_origins: vec![],
        }
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let sec = security("round-trip-secret");
        let token = issue_token(&sec, 7, "admin").unwrap();
        let claims = verify_token(&sec, &token).unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.login, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        let sec = security("");
        assert_eq!(issue_token(&sec, 1, "a"), Err(TokenError::MissingSecret));
        assert_eq!(verify_token(&sec, "x.y.z"), Err(TokenError::MissingSecret));
    }

    #[test]
    fn expired_token_is_distinguishable() {
        let sec = security("expiry-secret");
        // Hand-roll a token whose exp is well past the default leeway.
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: 1,
            login: "admin".to_string(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let key = EncodingKey::from_secret(sec.jwt_secret.as_bytes());
        let token = encode(&Header::default(), &claims, &key).unwrap();

        assert_eq!(verify_token(&sec, &token), Err(TokenError::Expired));
    }

    #[test]
    fn tampered_signature_is_distinguishable_from_expiry() {
        let sec = security("signing-secret");
        let other = security("a-different-secret");
        let token = issue_token(&other, 1, "admin").unwrap();

        assert_eq!(
            verify_token(&sec, &token),
            Err(TokenError::InvalidSignature)
        );
    }

    #[test]
    fn garbage_token_is_malformed() {
        let sec = security("secret");
        assert_eq!(
            verify_token(&sec, "definitely-not-a-jwt"),
            Err(TokenError::Malformed)
        );
    }
}
