use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
};
use chrono::{DateTime, Utc};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use seminar_hub_core::types::UserId;

use crate::problem::ProblemResponse;
use crate::router::AppState;

/// Audience every access token must be issued for.
pub const TOKEN_AUDIENCE: &str = "seminar-hub";

/// Verifies HS256 bearer tokens minted by the identity provider.
pub struct TokenValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_aud = false;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Returns the authenticated user id carried in the token's `sub` claim.
    pub fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<UserId, TokenError> {
        let claims = decode::<TokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|err| TokenError::Invalid(format!("{err}")))?
            .claims;

        if claims.aud != TOKEN_AUDIENCE {
            return Err(TokenError::Invalid("audience_mismatch".to_string()));
        }
        if claims.sub.trim().is_empty() {
            return Err(TokenError::Invalid("missing_subject".to_string()));
        }
        let now_ts = now.timestamp();
        if let Some(nbf) = claims.nbf {
            if now_ts < nbf as i64 {
                return Err(TokenError::Invalid("token_not_yet_valid".to_string()));
            }
        }
        if now_ts >= claims.exp as i64 {
            return Err(TokenError::Invalid("token_expired".to_string()));
        }
        Ok(UserId::new(claims.sub))
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TokenClaims {
    pub sub: String,
    pub aud: String,
    pub exp: usize,
    #[serde(default)]
    pub nbf: Option<usize>,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing bearer token")]
    Missing,
    #[error("invalid token: {0}")]
    Invalid(String),
}

/// The authenticated caller, extracted from the `Authorization` header.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ProblemResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let result = bearer_token(parts)
            .ok_or(TokenError::Missing)
            .and_then(|token| state.tokens().validate(token, state.now()));

        match result {
            Ok(user) => Ok(Self(user)),
            Err(err) => {
                debug!(stage = "http", error = %err, "rejected request credentials");
                Err(ProblemResponse::new(
                    StatusCode::UNAUTHORIZED,
                    "unauthorized",
                    "a valid bearer token is required",
                ))
            }
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
pub(crate) fn issue_token(secret: &[u8], sub: &str, exp: DateTime<Utc>) -> String {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let claims = TokenClaims {
        sub: sub.to_string(),
        aud: TOKEN_AUDIENCE.to_string(),
        exp: exp.timestamp() as usize,
        nbf: None,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).expect("encode token")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"token-secret";

    #[test]
    fn accepts_valid_token() {
        let now = Utc::now();
        let token = issue_token(SECRET, "user-a", now + Duration::minutes(5));
        let user = TokenValidator::new(SECRET)
            .validate(&token, now)
            .expect("valid token");
        assert_eq!(user.as_str(), "user-a");
    }

    #[test]
    fn rejects_expired_token() {
        let now = Utc::now();
        let token = issue_token(SECRET, "user-a", now - Duration::seconds(1));
        let err = TokenValidator::new(SECRET).validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(reason) if reason == "token_expired"));
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let token = issue_token(b"other-secret", "user-a", now + Duration::minutes(5));
        assert!(TokenValidator::new(SECRET).validate(&token, now).is_err());
    }

    #[test]
    fn rejects_foreign_audience() {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "user-a".to_string(),
            aud: "overlay".to_string(),
            exp: (now + Duration::minutes(5)).timestamp() as usize,
            nbf: None,
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
            .expect("encode");
        let err = TokenValidator::new(SECRET).validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(reason) if reason == "audience_mismatch"));
    }

    #[test]
    fn rejects_token_not_yet_valid() {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: "user-a".to_string(),
            aud: TOKEN_AUDIENCE.to_string(),
            exp: (now + Duration::minutes(10)).timestamp() as usize,
            nbf: Some((now + Duration::minutes(5)).timestamp() as usize),
        };
        let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET))
            .expect("encode");
        let err = TokenValidator::new(SECRET).validate(&token, now).unwrap_err();
        assert!(matches!(err, TokenError::Invalid(reason) if reason == "token_not_yet_valid"));
    }
}
