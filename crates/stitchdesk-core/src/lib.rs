//! Stitchdesk core - session and preference logic for the tailoring admin dashboard.
//!
//! This crate holds everything below the UI:
//! - `token`: decoding JWT payloads and judging expiry
//! - `session`: the monitor that turns token expiry into a logout flow
//! - `preferences`: the persisted settings record and its theme slice
//! - `auth` / `api`: stored tokens and the HTTP client that guards them
//! - `storage` / `config`: local key-value storage and runtime configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod preferences;
pub mod session;
pub mod storage;
pub mod token;

pub use api::{ApiClient, ApiError};
pub use auth::{LocalSession, TokenStore};
pub use config::{Config, StorageKeys};
pub use preferences::{PreferenceError, PreferenceRecord, PreferenceStore};
pub use session::{MonitorState, SessionMonitor, SessionPhase, TokenExpiredSignal};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StorageError};
pub use token::TokenInspector;
