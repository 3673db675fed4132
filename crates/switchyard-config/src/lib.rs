//! Typed, explicitly-constructed settings. No generic file/env config
//! loader lives here — see `settings::AuthSettings::from_env` for the one
//! recognized environment variable this crate reads directly.

pub mod settings;

pub use settings::{resolve_port, AuthSettings, ReconcilerSettings};
