//! RS256 token signing/verification and external JWKS caching.

pub mod jwks_cache;
pub mod jwt;
pub mod keys;

pub use jwks_cache::{JsonWebKey, JwksCache, JwksError};
pub use jwt::{Claims, IssuedUser, Role, TokenCodec, TokenError, TokenPair, TokenType};
pub use keys::{KeyError, KeyManager, DEFAULT_KID};
