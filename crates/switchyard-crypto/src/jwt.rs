//! Token signing and verification: the `TokenCodec`.
//!
//! Issues and validates RS256 access/refresh pairs against the process-owned
//! key from [`crate::keys::KeyManager`], and validates externally-issued
//! tokens against keys served by a [`crate::jwks_cache::JwksCache`].

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::keys::KeyManager;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token is malformed")]
    Malformed,
    #[error("token has expired")]
    Expired,
    #[error("token is not an access token")]
    WrongType,
    #[error("token signature or claims are invalid: {0}")]
    Invalid(String),
    #[error("token encoding failed: {0}")]
    Encoding(String),
}

impl TokenError {
    /// Coarse classification used by callers that only branch on kind, not
    /// on the specific variant.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::Malformed => "malformed",
            TokenError::Expired => "expired",
            TokenError::WrongType => "wrong_type",
            TokenError::Invalid(_) => "invalid",
            TokenError::Encoding(_) => "encoding",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Developer,
    Viewer,
    Superadmin,
}

/// Claims carried by a locally-issued access or refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    #[serde(default)]
    pub projects: Vec<String>,
    pub session_id: String,
    pub token_type: TokenType,
    pub iss: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

impl Claims {
    pub fn expires_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp(self.exp, 0).unwrap_or_else(Utc::now)
    }
}

pub struct IssuedUser {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub projects: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub session_id: String,
}

const ISSUER: &str = "enclii-switchyard";

pub struct TokenCodec {
    keys: KeyManager,
    access_ttl: ChronoDuration,
    refresh_ttl: ChronoDuration,
}

impl TokenCodec {
    pub fn new(keys: KeyManager, access_ttl: ChronoDuration, refresh_ttl: ChronoDuration) -> Self {
        Self {
            keys,
            access_ttl,
            refresh_ttl,
        }
    }

    /// Mint an access/refresh pair sharing one freshly generated session id.
    pub fn issue_token_pair(&self, user: &IssuedUser) -> Result<TokenPair, TokenError> {
        let session_id = Uuid::new_v4().to_string();
        let now = Utc::now();

        let access_exp = now + self.access_ttl;
        let access_claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            projects: user.projects.clone(),
            session_id: session_id.clone(),
            token_type: TokenType::Access,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: access_exp.timestamp(),
        };

        let refresh_claims = Claims {
            sub: user.id.to_string(),
            email: user.email.clone(),
            role: user.role,
            projects: Vec::new(),
            session_id: session_id.clone(),
            token_type: TokenType::Refresh,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.refresh_ttl).timestamp(),
        };

        let access_token = self.encode(&access_claims)?;
        let refresh_token = self.encode(&refresh_claims)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: access_exp,
            session_id,
        })
    }

    fn encode(&self, claims: &Claims) -> Result<String, TokenError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.keys.kid().to_string());
        encode(&header, claims, self.keys.encoding_key()).map_err(|e| TokenError::Encoding(e.to_string()))
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenType::Access)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.validate(token, TokenType::Refresh)
    }

    fn validate(&self, token: &str, expected: TokenType) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.required_spec_claims.clear();

        let data = decode::<Claims>(token, self.keys.decoding_key(), &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) => {
                    TokenError::Malformed
                }
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        if data.claims.token_type != expected {
            return Err(TokenError::WrongType);
        }

        Ok(data.claims)
    }

    /// Parse claims without enforcing signature or expiry validity. Used
    /// only to extract a session id for revocation of an already-compromised
    /// or expired token.
    pub fn extract_claims_unsafe(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.insecure_disable_signature_validation();
        validation.required_spec_claims.clear();

        let dummy = DecodingKey::from_secret(b"unused");
        decode::<Claims>(token, &dummy, &validation)
            .map(|d| d.claims)
            .map_err(|_| TokenError::Malformed)
    }

    pub fn jwk_set(&self) -> serde_json::Value {
        self.keys.jwk_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(
            KeyManager::generate().unwrap(),
            ChronoDuration::minutes(15),
            ChronoDuration::hours(168),
        )
    }

    fn user() -> IssuedUser {
        IssuedUser {
            id: Uuid::new_v4(),
            email: "a@x".to_string(),
            role: Role::Developer,
            projects: vec!["proj-1".to_string()],
        }
    }

    #[test]
    fn issue_and_validate_round_trip() {
        let codec = codec();
        let pair = codec.issue_token_pair(&user()).unwrap();

        let access = codec.validate_access(&pair.access_token).unwrap();
        assert_eq!(access.token_type, TokenType::Access);
        assert_eq!(access.session_id, pair.session_id);

        let refresh = codec.validate_refresh(&pair.refresh_token).unwrap();
        assert_eq!(refresh.token_type, TokenType::Refresh);
        assert_eq!(refresh.session_id, pair.session_id);
    }

    #[test]
    fn swapped_token_types_are_rejected() {
        let codec = codec();
        let pair = codec.issue_token_pair(&user()).unwrap();

        assert!(matches!(
            codec.validate_access(&pair.refresh_token),
            Err(TokenError::WrongType)
        ));
        assert!(matches!(
            codec.validate_refresh(&pair.access_token),
            Err(TokenError::WrongType)
        ));
    }

    #[test]
    fn expired_access_token_is_rejected() {
        let codec = TokenCodec::new(
            KeyManager::generate().unwrap(),
            ChronoDuration::milliseconds(-1),
            ChronoDuration::hours(168),
        );
        let pair = codec.issue_token_pair(&user()).unwrap();
        assert!(matches!(
            codec.validate_access(&pair.access_token),
            Err(TokenError::Expired)
        ));
    }

    #[test]
    fn claims_timestamps_are_ordered() {
        let codec = codec();
        let pair = codec.issue_token_pair(&user()).unwrap();
        let claims = codec.validate_access(&pair.access_token).unwrap();
        assert!(claims.exp >= claims.iat);
        assert!(claims.iat >= claims.nbf);
    }
}
