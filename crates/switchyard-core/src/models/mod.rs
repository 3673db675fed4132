pub mod api_token;
pub mod principal;
pub mod session;

pub use api_token::{ApiTokenInfo, API_TOKEN_PREFIX};
pub use principal::{Principal, TokenSource};
pub use session::Session;
