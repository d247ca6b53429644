//! Root class names derived from the theme preferences.

use super::record::{ColorTheme, PreferenceRecord, ThemeMode};

/// The concrete mode after resolving `system`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppliedMode {
    Light,
    Dark,
}

impl AppliedMode {
    pub fn class_name(&self) -> &'static str {
        match self {
            AppliedMode::Light => "light",
            AppliedMode::Dark => "dark",
        }
    }
}

impl ThemeMode {
    pub fn resolve(&self, system_prefers_dark: bool) -> AppliedMode {
        match self {
            ThemeMode::Light => AppliedMode::Light,
            ThemeMode::Dark => AppliedMode::Dark,
            ThemeMode::System if system_prefers_dark => AppliedMode::Dark,
            ThemeMode::System => AppliedMode::Light,
        }
    }
}

impl ColorTheme {
    pub fn class_name(&self) -> String {
        format!("color-{}", self.as_str())
    }

    /// Every color class, for clearing before a new one is applied.
    pub fn all_class_names() -> Vec<String> {
        ColorTheme::ALL.iter().map(ColorTheme::class_name).collect()
    }
}

/// Classes to set on the document root: the applied mode and the color theme.
pub fn root_classes(record: &PreferenceRecord, system_prefers_dark: bool) -> Vec<String> {
    vec![
        record.theme.resolve(system_prefers_dark).class_name().to_string(),
        record.color_theme.class_name(),
    ]
}
