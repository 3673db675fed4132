//! Typed settings structs, constructed explicitly by the embedding
//! application. No file/CLI configuration loader lives here — only the
//! handful of environment variables this repo's components recognize.

use std::time::Duration;

/// Settings for the authentication subsystem (`TokenCodec`, `JWKSCache`,
/// `AuthManager`).
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Comma-separated in `ENCLII_ADMIN_EMAILS`; emails in this list are
    /// always mapped to the admin role for externally-validated tokens.
    pub admin_emails: Vec<String>,
    pub external_issuer: Option<String>,
    pub external_jwks_url: Option<String>,
    pub jwks_cache_ttl: Duration,
    pub jwks_stale_threshold: Duration,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::from_secs(15 * 60),
            refresh_token_ttl: Duration::from_secs(168 * 3600),
            admin_emails: Vec::new(),
            external_issuer: None,
            external_jwks_url: None,
            jwks_cache_ttl: Duration::from_secs(900),
            jwks_stale_threshold: Duration::from_secs(3600),
        }
    }
}

impl AuthSettings {
    /// Populate the admin-email allow-list from `ENCLII_ADMIN_EMAILS`,
    /// leaving every other field at its default. This is the only
    /// environment-derived construction this crate performs.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(raw) = std::env::var("ENCLII_ADMIN_EMAILS") {
            settings.admin_emails = raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        settings
    }
}

/// Settings for the reconciler and manifest builder.
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    pub default_port: u16,
    pub ingress_controller_namespace: String,
    pub tunnel_namespace: String,
    pub data_namespace: String,
    pub registry_credentials_source_namespace: String,
    pub registry_credentials_secret_name: String,
    pub ingress_class: String,
    pub cert_issuer: String,
    pub readiness_poll_interval: Duration,
    pub readiness_timeout: Duration,
    pub requeue_after_timeout: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            default_port: 4200,
            ingress_controller_namespace: "ingress-nginx".to_string(),
            tunnel_namespace: "tunnel-system".to_string(),
            data_namespace: "data".to_string(),
            registry_credentials_source_namespace: "enclii-system".to_string(),
            registry_credentials_secret_name: "enclii-registry-credentials".to_string(),
            ingress_class: "nginx".to_string(),
            cert_issuer: "letsencrypt-prod".to_string(),
            readiness_poll_interval: Duration::from_secs(5),
            readiness_timeout: Duration::from_secs(5 * 60),
            requeue_after_timeout: Duration::from_secs(30),
        }
    }
}

/// Resolve the container port from the environment: `ENCLII_PORT`, then
/// `PORT`, falling back to `settings.default_port` on absence or an
/// out-of-range value. Never fails the caller.
pub fn resolve_port(settings: &ReconcilerSettings) -> u16 {
    for var in ["ENCLII_PORT", "PORT"] {
        if let Ok(raw) = std::env::var(var) {
            match raw.parse::<u32>() {
                Ok(p) if (1..=65535).contains(&p) => return p as u16,
                _ => {
                    tracing::warn!(
                        variable = var,
                        value = %raw,
                        "invalid port value, falling back to default"
                    );
                }
            }
        }
    }
    settings.default_port
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = AuthSettings::default();
        assert!(s.access_token_ttl < s.refresh_token_ttl);
        assert!(s.admin_emails.is_empty());
    }

    #[test]
    fn reconciler_defaults_match_design() {
        let s = ReconcilerSettings::default();
        assert_eq!(s.default_port, 4200);
        assert_eq!(s.readiness_timeout, Duration::from_secs(300));
    }
}
