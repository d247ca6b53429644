//! Preference record types.
//!
//! Field names serialize in camelCase so the aggregate blob stays readable by
//! the browser dashboard that shares the storage.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::PreferenceError;

/// Default sidebar width in pixels
const DEFAULT_SIDEBAR_WIDTH: u32 = 256;

/// Default idle minutes before the dashboard logs out
const DEFAULT_AUTO_LOGOUT_MINUTES: u32 = 30;

/// Default retention window for local data, in days
const DEFAULT_DATA_RETENTION_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ThemeMode {
    Light,
    Dark,
    /// Follow the operating system's preference
    #[default]
    System,
}

impl ThemeMode {
    pub const ALL: [ThemeMode; 3] = [ThemeMode::Light, ThemeMode::Dark, ThemeMode::System];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeMode::Light => "light",
            ThemeMode::Dark => "dark",
            ThemeMode::System => "system",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum ColorTheme {
    #[default]
    Orange,
    Blue,
    Green,
    Purple,
    Red,
}

impl ColorTheme {
    pub const ALL: [ColorTheme; 5] = [
        ColorTheme::Orange,
        ColorTheme::Blue,
        ColorTheme::Green,
        ColorTheme::Purple,
        ColorTheme::Red,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ColorTheme::Orange => "orange",
            ColorTheme::Blue => "blue",
            ColorTheme::Green => "green",
            ColorTheme::Purple => "purple",
            ColorTheme::Red => "red",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum BackupFrequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl BackupFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupFrequency::Daily => "daily",
            BackupFrequency::Weekly => "weekly",
            BackupFrequency::Monthly => "monthly",
        }
    }
}

macro_rules! impl_str_enum {
    ($ty:ident, $kind:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = PreferenceError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(Value::String(s.trim().to_lowercase())).map_err(|_| {
                    PreferenceError::UnknownValue {
                        kind: $kind,
                        value: s.to_string(),
                    }
                })
            }
        }
    };
}

impl_str_enum!(ThemeMode, "theme mode");
impl_str_enum!(ColorTheme, "color theme");
impl_str_enum!(BackupFrequency, "backup frequency");

/// The full set of user preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PreferenceRecord {
    // Theme
    pub theme: ThemeMode,
    pub color_theme: ColorTheme,
    pub sidebar_collapsed: bool,
    pub sidebar_width: u32,

    // Display
    pub show_notifications: bool,
    pub show_breadcrumbs: bool,
    pub show_search_bar: bool,
    pub compact_mode: bool,

    // Notifications
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub sound_notifications: bool,

    // Security
    /// Minutes
    pub auto_logout: u32,
    pub require_password_change: bool,
    pub two_factor_auth: bool,

    // Data
    pub auto_save: bool,
    /// Days
    pub data_retention: u32,
    pub backup_frequency: BackupFrequency,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            color_theme: ColorTheme::Orange,
            sidebar_collapsed: false,
            sidebar_width: DEFAULT_SIDEBAR_WIDTH,
            show_notifications: true,
            show_breadcrumbs: true,
            show_search_bar: true,
            compact_mode: false,
            email_notifications: true,
            push_notifications: true,
            sound_notifications: false,
            auto_logout: DEFAULT_AUTO_LOGOUT_MINUTES,
            require_password_change: false,
            two_factor_auth: false,
            auto_save: true,
            data_retention: DEFAULT_DATA_RETENTION_DAYS,
            backup_frequency: BackupFrequency::Daily,
        }
    }
}

impl PreferenceRecord {
    /// Shallow merge: every field set in `patch` replaces the current value.
    pub fn apply(&mut self, patch: &PreferencePatch) {
        if let Some(v) = patch.theme {
            self.theme = v;
        }
        if let Some(v) = patch.color_theme {
            self.color_theme = v;
        }
        if let Some(v) = patch.sidebar_collapsed {
            self.sidebar_collapsed = v;
        }
        if let Some(v) = patch.sidebar_width {
            self.sidebar_width = v;
        }
        if let Some(v) = patch.show_notifications {
            self.show_notifications = v;
        }
        if let Some(v) = patch.show_breadcrumbs {
            self.show_breadcrumbs = v;
        }
        if let Some(v) = patch.show_search_bar {
            self.show_search_bar = v;
        }
        if let Some(v) = patch.compact_mode {
            self.compact_mode = v;
        }
        if let Some(v) = patch.email_notifications {
            self.email_notifications = v;
        }
        if let Some(v) = patch.push_notifications {
            self.push_notifications = v;
        }
        if let Some(v) = patch.sound_notifications {
            self.sound_notifications = v;
        }
        if let Some(v) = patch.auto_logout {
            self.auto_logout = v;
        }
        if let Some(v) = patch.require_password_change {
            self.require_password_change = v;
        }
        if let Some(v) = patch.two_factor_auth {
            self.two_factor_auth = v;
        }
        if let Some(v) = patch.auto_save {
            self.auto_save = v;
        }
        if let Some(v) = patch.data_retention {
            self.data_retention = v;
        }
        if let Some(v) = patch.backup_frequency {
            self.backup_frequency = v;
        }
    }

    /// Merge a stored JSON object over this record key by key.
    ///
    /// Keys that are unknown or hold a value of the wrong shape are skipped,
    /// so one bad entry does not discard the rest of the stored settings.
    pub fn merge_stored(&mut self, stored: &Map<String, Value>) {
        for (key, value) in stored {
            let single = Value::Object(Map::from_iter([(key.clone(), value.clone())]));
            match serde_json::from_value::<PreferencePatch>(single) {
                Ok(field) => self.apply(&field),
                Err(e) => warn!(key = %key, error = %e, "Ignoring stored setting"),
            }
        }
    }
}

/// A partial preference record; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct PreferencePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme: Option<ThemeMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_theme: Option<ColorTheme>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidebar_collapsed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sidebar_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_breadcrumbs: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_search_bar: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compact_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_notifications: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_logout: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub require_password_change: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub two_factor_auth: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_save: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_retention: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_frequency: Option<BackupFrequency>,
}

impl PreferencePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build a patch from `key=value` pairs using the stored (camelCase) key
    /// names, e.g. `sidebarWidth=300` or `theme=dark`.
    ///
    /// Values are read as JSON when they parse as JSON, otherwise as strings.
    pub fn from_assignments<S: AsRef<str>>(assignments: &[S]) -> Result<Self, PreferenceError> {
        let mut fields = Map::new();
        for assignment in assignments {
            let assignment = assignment.as_ref();
            let (key, raw) = assignment
                .split_once('=')
                .ok_or_else(|| PreferenceError::InvalidAssignment(assignment.to_string()))?;
            let key = key.trim();
            if key.is_empty() {
                return Err(PreferenceError::InvalidAssignment(assignment.to_string()));
            }
            let raw = raw.trim();
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            fields.insert(key.to_string(), value);
        }
        serde_json::from_value(Value::Object(fields))
            .map_err(|e| PreferenceError::InvalidAssignment(e.to_string()))
    }
}

/// The theme-only persisted view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeSlice {
    #[serde(default)]
    pub theme: Option<ThemeMode>,
    #[serde(default)]
    pub color_theme: Option<ColorTheme>,
}

impl ThemeSlice {
    pub fn of(record: &PreferenceRecord) -> Self {
        Self {
            theme: Some(record.theme),
            color_theme: Some(record.color_theme),
        }
    }
}
