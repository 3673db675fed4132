pub mod session_revoker;

pub use session_revoker::{
    AlwaysFailingRevoker, InMemorySessionRevoker, RedisSessionRevoker, RevokerError,
    SessionRevoker, SharedSessionRevoker,
};
