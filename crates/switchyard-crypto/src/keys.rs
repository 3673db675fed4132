//! Process-owned RSA signing key.
//!
//! Generated at startup unless a PEM pair is supplied externally. Holds the
//! encoding/decoding key plus the JWKS representation of the public half
//! behind a single stable `kid` so downstream verifiers never see the key
//! "move".

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use jsonwebtoken::{DecodingKey, EncodingKey};
use pkcs1::EncodeRsaPrivateKey;
use pkcs8::{DecodePublicKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;

pub const DEFAULT_KID: &str = "enclii-jwt-key-1";

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key generation failed: {0}")]
    Generation(String),
    #[error("invalid key material: {0}")]
    InvalidFormat(String),
}

/// Holds one RSA keypair and its JWKS projection.
#[derive(Clone)]
pub struct KeyManager {
    kid: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    jwk: serde_json::Value,
}

impl KeyManager {
    /// Generate a fresh RSA-2048 keypair with the default kid.
    pub fn generate() -> Result<Self, KeyError> {
        Self::generate_with_kid(DEFAULT_KID)
    }

    pub fn generate_with_kid(kid: &str) -> Result<Self, KeyError> {
        let private_key = RsaPrivateKey::new(&mut rand::rngs::OsRng, 2048)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let private_pem = private_key
            .to_pkcs1_pem(pkcs1::LineEnding::LF)
            .map_err(|e| KeyError::Generation(e.to_string()))?;
        let public_pem = public_key
            .to_public_key_pem(pkcs8::LineEnding::LF)
            .map_err(|e| KeyError::Generation(e.to_string()))?;

        Self::from_pem(private_pem.as_str(), public_pem.as_str(), kid)
    }

    /// Load a keypair supplied externally (e.g. a mounted secret).
    pub fn from_pem(private_pem: &str, public_pem: &str, kid: &str) -> Result<Self, KeyError> {
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| KeyError::InvalidFormat(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| KeyError::InvalidFormat(e.to_string()))?;

        let public_key = RsaPublicKey::from_public_key_pem(public_pem)
            .map_err(|e| KeyError::InvalidFormat(e.to_string()))?;
        let n_b64 = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
        let e_b64 = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());

        let jwk = serde_json::json!({
            "kty": "RSA",
            "use": "sig",
            "alg": "RS256",
            "kid": kid,
            "n": n_b64,
            "e": e_b64,
        });

        Ok(Self {
            kid: kid.to_string(),
            encoding_key,
            decoding_key,
            jwk,
        })
    }

    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// The full JWKS document exposing just this process's public key.
    pub fn jwk_set(&self) -> serde_json::Value {
        serde_json::json!({ "keys": [self.jwk.clone()] })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_have_stable_kid_and_jwk() {
        let km = KeyManager::generate().unwrap();
        assert_eq!(km.kid(), DEFAULT_KID);
        let jwks = km.jwk_set();
        let keys = jwks["keys"].as_array().unwrap();
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0]["kty"], "RSA");
        assert_eq!(keys[0]["alg"], "RS256");
        assert_eq!(keys[0]["kid"], DEFAULT_KID);
    }

    #[test]
    fn two_generated_keys_differ() {
        let a = KeyManager::generate().unwrap();
        let b = KeyManager::generate().unwrap();
        assert_ne!(a.jwk_set(), b.jwk_set());
    }
}
