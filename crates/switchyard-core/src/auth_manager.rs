//! `AuthManager`: classifies an inbound bearer credential into a
//! `Principal`, applying the recognition rules in order, and orchestrates
//! issuance, refresh, and revocation.

use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use uuid::Uuid;

use switchyard_cache::SessionRevoker;
use switchyard_crypto::{Claims as LocalClaims, IssuedUser, JwksCache, Role, TokenCodec, TokenPair, TokenType};

use crate::api_token_validator::ApiTokenValidator;
use crate::audit::{events, AuditCategory, AuditEvent, AuditLogger, AuditSeverity};
use crate::error::AuthError;
use crate::models::{Principal, TokenSource, API_TOKEN_PREFIX};

/// Claims expected on an externally-issued token. Only `email` is required;
/// `name`/`tenant_id`/`sub` are accepted but not required.
#[derive(Debug, serde::Deserialize)]
struct ExternalClaims {
    email: String,
    #[serde(default)]
    sub: Option<String>,
    exp: i64,
    iat: i64,
}

pub struct AuthManager {
    codec: Arc<TokenCodec>,
    revoker: Arc<dyn SessionRevoker>,
    api_tokens: Option<Arc<dyn ApiTokenValidator>>,
    external_jwks: Option<Arc<JwksCache>>,
    external_issuer: Option<String>,
    admin_emails: Vec<String>,
    audit: Arc<dyn AuditLogger>,
    refresh_ttl: Duration,
}

pub struct AuthManagerConfig {
    pub external_issuer: Option<String>,
    pub admin_emails: Vec<String>,
    pub refresh_ttl: Duration,
}

impl AuthManager {
    pub fn new(
        codec: Arc<TokenCodec>,
        revoker: Arc<dyn SessionRevoker>,
        api_tokens: Option<Arc<dyn ApiTokenValidator>>,
        external_jwks: Option<Arc<JwksCache>>,
        audit: Arc<dyn AuditLogger>,
        config: AuthManagerConfig,
    ) -> Self {
        Self {
            codec,
            revoker,
            api_tokens,
            external_jwks,
            external_issuer: config.external_issuer,
            admin_emails: config.admin_emails,
            audit,
            refresh_ttl: config.refresh_ttl,
        }
    }

    pub fn issue_token_pair(&self, user: &IssuedUser) -> Result<TokenPair, AuthError> {
        let pair = self.codec.issue_token_pair(user)?;
        Ok(pair)
    }

    /// Classify a raw `Authorization: Bearer <token>` value into a
    /// `Principal`, applying the recognition rules in order: API token,
    /// local access token, external token.
    pub async fn authenticate(
        &self,
        bearer: Option<&str>,
        client_ip: Option<String>,
    ) -> Result<Principal, AuthError> {
        let raw = bearer.ok_or(AuthError::MissingAuthorization)?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(AuthError::MalformedAuthorization);
        }

        if let Some(result) = self.try_api_token(token, client_ip.clone()).await {
            return result;
        }

        match self.try_local_access(token).await {
            Ok(principal) => return Ok(principal),
            Err(AuthError::SessionRevoked) => return Err(AuthError::SessionRevoked),
            Err(_) => {}
        }

        if let Some(principal) = self.try_external(token).await? {
            return Ok(principal);
        }

        self.audit
            .log(
                AuditEvent::new(AuditCategory::Authentication, events::LOGIN_FAILURE, AuditSeverity::Warning)
                    .failure("no recognition rule matched"),
            )
            .await;
        Err(AuthError::Unauthorized)
    }

    async fn try_api_token(
        &self,
        token: &str,
        client_ip: Option<String>,
    ) -> Option<Result<Principal, AuthError>> {
        if !token.starts_with(API_TOKEN_PREFIX) {
            return None;
        }
        let Some(validator) = &self.api_tokens else {
            return Some(Err(AuthError::ApiTokenUnavailable));
        };

        let result = validator.validate_token_for_auth(token).await;
        match result {
            Ok(info) => {
                let role = if info.has_admin_scope() {
                    Role::Admin
                } else {
                    Role::Developer
                };
                let validator = validator.clone();
                let token_id = info.id;
                tokio::spawn(async move {
                    validator.update_last_used(token_id, client_ip).await;
                });

                self.audit
                    .log(AuditEvent::new(
                        AuditCategory::Authentication,
                        events::TOKEN_VALIDATED,
                        AuditSeverity::Info,
                    ))
                    .await;

                Some(Ok(Principal {
                    user_id: info.owner_user_id,
                    email: String::new(),
                    role,
                    projects: Vec::new(),
                    session_id: None,
                    token_source: TokenSource::ApiToken,
                }))
            }
            Err(e) => Some(Err(e)),
        }
    }

    async fn try_local_access(&self, token: &str) -> Result<Principal, AuthError> {
        let claims: LocalClaims = self.codec.validate_access(token)?;

        match self.revoker.is_session_revoked(&claims.session_id).await {
            Ok(true) => return Err(AuthError::SessionRevoked),
            Ok(false) => {}
            // Fail open: availability over strict security. Explicit logout
            // remains effective whenever the revoker is reachable.
            Err(e) => {
                tracing::warn!(error = %e, session_id = %claims.session_id, "session revocation check failed, proceeding as not revoked");
            }
        }

        self.audit
            .log(AuditEvent::new(
                AuditCategory::Authentication,
                events::TOKEN_VALIDATED,
                AuditSeverity::Info,
            ).with_session(claims.session_id.clone()))
            .await;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        Ok(Principal {
            user_id,
            email: claims.email,
            role: claims.role,
            projects: claims.projects,
            session_id: Some(claims.session_id),
            token_source: TokenSource::Local,
        })
    }

    async fn try_external(&self, token: &str) -> Result<Option<Principal>, AuthError> {
        let Some(jwks) = &self.external_jwks else {
            return Ok(None);
        };

        let header = jsonwebtoken::decode_header(token).map_err(|_| AuthError::InvalidToken)?;
        let key = jwks
            .get_key(header.kid.as_deref())
            .await
            .map_err(|_| AuthError::InvalidToken)?;

        let decoding_key = DecodingKey::from_rsa_components(&key.n, &key.e)
            .map_err(|_| AuthError::InvalidToken)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        if let Some(issuer) = &self.external_issuer {
            validation.set_issuer(&[issuer.as_str()]);
        }
        validation.required_spec_claims.clear();

        let data = decode::<ExternalClaims>(token, &decoding_key, &validation).map_err(|e| {
            use jsonwebtoken::errors::ErrorKind;
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                ErrorKind::InvalidIssuer => AuthError::InvalidIssuer,
                _ => AuthError::InvalidToken,
            }
        })?;

        let role = if self
            .admin_emails
            .iter()
            .any(|e| e.eq_ignore_ascii_case(&data.claims.email))
        {
            Role::Admin
        } else {
            Role::Developer
        };

        let user_id = data
            .claims
            .sub
            .as_deref()
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        self.audit
            .log(AuditEvent::new(
                AuditCategory::Authentication,
                events::EXTERNAL_VALIDATED,
                AuditSeverity::Info,
            ).with_email(data.claims.email.clone()))
            .await;

        Ok(Some(Principal {
            user_id,
            email: data.claims.email,
            role,
            projects: Vec::new(),
            session_id: None,
            token_source: TokenSource::External,
        }))
    }

    /// Revoke a session directly.
    pub async fn revoke_session(&self, session_id: &str) -> Result<(), AuthError> {
        self.revoker.revoke_session(session_id, self.refresh_ttl).await?;
        self.audit
            .log(AuditEvent::new(
                AuditCategory::Authentication,
                events::SESSION_REVOKED,
                AuditSeverity::Info,
            ).with_session(session_id.to_string()))
            .await;
        Ok(())
    }

    /// Parse (without validating signature) and revoke the session carried
    /// by `token`. Used for logout, where the token may already be expired.
    pub async fn revoke_session_from_token(&self, token: &str) -> Result<(), AuthError> {
        let claims = self.codec.extract_claims_unsafe(token)?;
        self.revoke_session(&claims.session_id).await?;
        self.audit
            .log(AuditEvent::new(AuditCategory::Authentication, events::LOGOUT, AuditSeverity::Info)
                .with_session(claims.session_id))
            .await;
        Ok(())
    }

    /// Validate `refresh_token`, revoke its session, then mint a fresh pair
    /// under a brand-new session id. The old session is revoked *before* the
    /// new pair exists: a crash between the two steps leaves the caller
    /// logged out rather than leaving the old session usable.
    pub async fn refresh(&self, refresh_token: &str, user: &IssuedUser) -> Result<TokenPair, AuthError> {
        let claims = match self.codec.validate_refresh(refresh_token) {
            Ok(c) => c,
            Err(e) => {
                self.audit
                    .log(
                        AuditEvent::new(
                            AuditCategory::Authentication,
                            events::TOKEN_REFRESH_FAILED,
                            AuditSeverity::Warning,
                        )
                        .failure(e.to_string()),
                    )
                    .await;
                return Err(e.into());
            }
        };

        match self.revoker.is_session_revoked(&claims.session_id).await {
            Ok(true) => {
                self.audit
                    .log(
                        AuditEvent::new(
                            AuditCategory::Authentication,
                            events::TOKEN_REFRESH_FAILED,
                            AuditSeverity::Warning,
                        )
                        .with_session(claims.session_id.clone())
                        .failure("refresh token session already revoked"),
                    )
                    .await;
                return Err(AuthError::SessionRevoked);
            }
            Ok(false) => {}
            // Fail open: availability over strict security, same as try_local_access.
            Err(e) => {
                tracing::warn!(error = %e, session_id = %claims.session_id, "session revocation check failed during refresh, proceeding as not revoked");
            }
        }

        if let Err(e) = self.revoker.revoke_session(&claims.session_id, self.refresh_ttl).await {
            tracing::warn!(error = %e, session_id = %claims.session_id, "failed to revoke old session during refresh, proceeding");
        }

        let pair = self.codec.issue_token_pair(user)?;

        self.audit
            .log(
                AuditEvent::new(AuditCategory::Authentication, events::TOKEN_REFRESHED, AuditSeverity::Info)
                    .with_session(pair.session_id.clone()),
            )
            .await;

        Ok(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::TracingAuditLogger;
    use chrono::Duration as ChronoDuration;
    use switchyard_cache::{AlwaysFailingRevoker, InMemorySessionRevoker};
    use switchyard_crypto::KeyManager;

    fn manager(revoker: Arc<dyn SessionRevoker>) -> AuthManager {
        let codec = Arc::new(TokenCodec::new(
            KeyManager::generate().unwrap(),
            ChronoDuration::minutes(15),
            ChronoDuration::hours(168),
        ));
        AuthManager::new(
            codec,
            revoker,
            None,
            None,
            Arc::new(TracingAuditLogger),
            AuthManagerConfig {
                external_issuer: None,
                admin_emails: vec!["root@example".to_string()],
                refresh_ttl: Duration::from_secs(168 * 3600),
            },
        )
    }

    fn user() -> IssuedUser {
        IssuedUser {
            id: Uuid::new_v4(),
            email: "a@x".to_string(),
            role: Role::Developer,
            projects: vec![],
        }
    }

    #[tokio::test]
    async fn happy_path_issue_and_authenticate() {
        let mgr = manager(Arc::new(InMemorySessionRevoker::new()));
        let u = user();
        let pair = mgr.issue_token_pair(&u).unwrap();

        let principal = mgr.authenticate(Some(&pair.access_token), None).await.unwrap();
        assert_eq!(principal.user_id, u.id);
        assert_eq!(principal.token_source, TokenSource::Local);
    }

    #[tokio::test]
    async fn revocation_rejects_subsequent_use() {
        let mgr = manager(Arc::new(InMemorySessionRevoker::new()));
        let pair = mgr.issue_token_pair(&user()).unwrap();

        mgr.revoke_session_from_token(&pair.access_token).await.unwrap();

        let err = mgr.authenticate(Some(&pair.access_token), None).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionRevoked));
    }

    #[tokio::test]
    async fn refresh_rotates_session_and_revokes_old() {
        let mgr = manager(Arc::new(InMemorySessionRevoker::new()));
        let u = user();
        let pair = mgr.issue_token_pair(&u).unwrap();

        let new_pair = mgr.refresh(&pair.refresh_token, &u).await.unwrap();
        assert_ne!(new_pair.session_id, pair.session_id);

        // Reusing the old refresh token fails because its session is revoked,
        // even though the refresh token's own signature/expiry are still valid.
        let err = mgr.refresh(&pair.refresh_token, &u).await.unwrap_err();
        assert!(matches!(err, AuthError::SessionRevoked));
    }

    #[tokio::test]
    async fn revoker_failure_fails_open() {
        let mgr = manager(Arc::new(AlwaysFailingRevoker));
        let pair = mgr.issue_token_pair(&user()).unwrap();

        let principal = mgr.authenticate(Some(&pair.access_token), None).await.unwrap();
        assert_eq!(principal.token_source, TokenSource::Local);
    }

    #[tokio::test]
    async fn missing_bearer_is_rejected() {
        let mgr = manager(Arc::new(InMemorySessionRevoker::new()));
        let err = mgr.authenticate(None, None).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingAuthorization));
    }
}
