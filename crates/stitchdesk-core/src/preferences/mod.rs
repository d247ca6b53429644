//! User preferences: theme, display, notification, security and data settings.
//!
//! This module provides:
//! - `PreferenceRecord` / `PreferencePatch`: the full record and partial updates
//! - `PreferenceStore`: the single in-memory record, persisted through two
//!   storage views (a theme-only slice and the aggregate settings blob)
//! - `appearance`: turning a record into the root classes the UI applies

pub mod appearance;
pub mod record;
pub mod store;

use thiserror::Error;

use crate::storage::StorageError;

pub use appearance::{root_classes, AppliedMode};
pub use record::{
    BackupFrequency, ColorTheme, PreferencePatch, PreferenceRecord, ThemeMode, ThemeSlice,
};
pub use store::{PreferenceStore, SaveOutcome};

#[derive(Error, Debug)]
pub enum PreferenceError {
    #[error("Failed to persist preferences: {0}")]
    Storage(#[from] StorageError),

    #[error("Unknown {kind}: '{value}'")]
    UnknownValue { kind: &'static str, value: String },

    #[error("Invalid setting assignment: {0}")]
    InvalidAssignment(String),
}
