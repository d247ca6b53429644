//! Authentication state kept on this device.
//!
//! This module provides:
//! - `TokenStore`: access and refresh tokens in the key-value store
//! - `LocalSession`: the `AuthSession` the session monitor watches

pub mod session;
pub mod tokens;

pub use session::LocalSession;
pub use tokens::TokenStore;
