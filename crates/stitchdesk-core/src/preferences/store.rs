use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};

use crate::config::StorageKeys;
use crate::storage::{self, KeyValueStore};

use super::record::{ColorTheme, PreferencePatch, PreferenceRecord, ThemeMode, ThemeSlice};
use super::PreferenceError;

/// Result of an explicit save, shaped for inline save-status UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveOutcome {
    fn saved() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}

/// Owns the one authoritative preference record.
///
/// Storage holds two views of it: the theme-only slice and the aggregate
/// settings blob. Theme changes write both views before returning. General
/// edits are staged with [`update_settings`](Self::update_settings) and only
/// reach storage on [`save_settings`](Self::save_settings), so between those
/// two calls the stored blob is intentionally behind the in-memory record.
pub struct PreferenceStore {
    storage: Arc<dyn KeyValueStore>,
    theme_key: String,
    settings_key: String,
    settings: PreferenceRecord,
}

impl PreferenceStore {
    /// Build the record from storage: the settings blob merged over defaults,
    /// then the theme slice, which wins for theme fields when it disagrees.
    ///
    /// Read failures fall back to defaults; loading never fails.
    pub fn load(storage: Arc<dyn KeyValueStore>, keys: &StorageKeys) -> Self {
        let mut settings = PreferenceRecord::default();

        match storage.get(&keys.settings) {
            Ok(Some(raw)) => match serde_json::from_str::<Map<String, Value>>(&raw) {
                Ok(stored) => {
                    debug!(fields = stored.len(), "Stored settings loaded");
                    settings.merge_stored(&stored);
                }
                Err(e) => warn!(error = %e, "Stored settings are corrupt, using defaults"),
            },
            Ok(None) => debug!("No stored settings, using defaults"),
            Err(e) => warn!(error = %e, "Failed to read stored settings, using defaults"),
        }

        match storage::get_json::<ThemeSlice>(storage.as_ref(), &keys.theme) {
            Ok(Some(slice)) => {
                if let Some(theme) = slice.theme.filter(|t| *t != settings.theme) {
                    info!(from = %settings.theme, to = %theme, "Theme slice overrides stored settings");
                    settings.theme = theme;
                }
                if let Some(color) = slice.color_theme.filter(|c| *c != settings.color_theme) {
                    info!(from = %settings.color_theme, to = %color, "Color slice overrides stored settings");
                    settings.color_theme = color;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to read theme slice, ignoring it"),
        }

        Self {
            storage,
            theme_key: keys.theme.clone(),
            settings_key: keys.settings.clone(),
            settings,
        }
    }

    pub fn settings(&self) -> &PreferenceRecord {
        &self.settings
    }

    pub fn theme(&self) -> ThemeMode {
        self.settings.theme
    }

    pub fn color_theme(&self) -> ColorTheme {
        self.settings.color_theme
    }

    /// Set the theme mode and write it to both storage views.
    pub fn change_theme(&mut self, theme: ThemeMode) -> Result<(), PreferenceError> {
        debug!(%theme, "Changing theme");
        self.settings.theme = theme;
        self.write_theme_views()
    }

    /// Set the color theme and write it to both storage views.
    pub fn change_color_theme(&mut self, color: ColorTheme) -> Result<(), PreferenceError> {
        debug!(%color, "Changing color theme");
        self.settings.color_theme = color;
        self.write_theme_views()
    }

    /// Stage edits in memory. Nothing is written until `save_settings`.
    pub fn update_settings(&mut self, patch: PreferencePatch) {
        if patch.is_empty() {
            return;
        }
        self.settings.apply(&patch);
    }

    /// Commit settings to storage.
    ///
    /// With a patch, the patch becomes the stored blob, carrying the merged
    /// record's theme fields so it agrees with the slice, and memory is
    /// updated once the write succeeds. Without one, the whole in-memory
    /// record is stored. The theme slice is rewritten from memory either way.
    pub fn save_settings(&mut self, patch: Option<PreferencePatch>) -> SaveOutcome {
        match self.try_save(patch) {
            Ok(()) => {
                info!("Settings saved");
                SaveOutcome::saved()
            }
            Err(e) => {
                error!(error = %e, "Failed to save settings");
                SaveOutcome::failed(e.to_string())
            }
        }
    }

    /// Restore defaults in memory and in both storage views.
    pub fn reset_settings(&mut self) -> Result<(), PreferenceError> {
        info!("Resetting settings to defaults");
        self.settings = PreferenceRecord::default();
        storage::set_json(self.storage.as_ref(), &self.settings_key, &self.settings)?;
        self.write_theme_slice()
    }

    /// The theme slice as currently stored.
    pub fn stored_theme_slice(&self) -> Result<Option<ThemeSlice>, PreferenceError> {
        Ok(storage::get_json(self.storage.as_ref(), &self.theme_key)?)
    }

    /// The settings blob as currently stored.
    pub fn stored_settings_blob(&self) -> Result<Option<Map<String, Value>>, PreferenceError> {
        Ok(storage::get_json(self.storage.as_ref(), &self.settings_key)?)
    }

    fn try_save(&mut self, patch: Option<PreferencePatch>) -> Result<(), PreferenceError> {
        match patch {
            Some(patch) => {
                let mut merged = self.settings.clone();
                merged.apply(&patch);
                let stored = PreferencePatch {
                    theme: Some(merged.theme),
                    color_theme: Some(merged.color_theme),
                    ..patch
                };
                storage::set_json(self.storage.as_ref(), &self.settings_key, &stored)?;
                self.settings = merged;
            }
            None => {
                storage::set_json(self.storage.as_ref(), &self.settings_key, &self.settings)?;
            }
        }
        self.write_theme_slice()
    }

    fn write_theme_slice(&self) -> Result<(), PreferenceError> {
        let slice = ThemeSlice::of(&self.settings);
        Ok(storage::set_json(self.storage.as_ref(), &self.theme_key, &slice)?)
    }

    /// Write the slice, then read-modify-write both theme fields of the stored
    /// blob. Every other stored field stays as it was, including ones staged
    /// but unsaved in memory, which stay unsaved.
    fn write_theme_views(&self) -> Result<(), PreferenceError> {
        self.write_theme_slice()?;
        let mut blob = match self.stored_settings_blob() {
            Ok(blob) => blob.unwrap_or_default(),
            Err(e) => {
                warn!(error = %e, "Stored settings unreadable, rewriting from scratch");
                Map::new()
            }
        };
        blob.insert(
            "theme".to_string(),
            Value::String(self.settings.theme.as_str().to_string()),
        );
        blob.insert(
            "colorTheme".to_string(),
            Value::String(self.settings.color_theme.as_str().to_string()),
        );
        Ok(storage::set_json(self.storage.as_ref(), &self.settings_key, &blob)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::BackupFrequency;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn keys() -> StorageKeys {
        StorageKeys::default()
    }

    fn fresh() -> (Arc<MemoryStore>, PreferenceStore) {
        let storage = Arc::new(MemoryStore::new());
        let prefs = PreferenceStore::load(storage.clone(), &keys());
        (storage, prefs)
    }

    fn assert_views_agree(prefs: &PreferenceStore) {
        let slice = prefs.stored_theme_slice().unwrap().unwrap();
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(
            blob.get("theme"),
            Some(&json!(slice.theme.unwrap().as_str())),
            "theme views diverged"
        );
        assert_eq!(
            blob.get("colorTheme"),
            Some(&json!(slice.color_theme.unwrap().as_str())),
            "color views diverged"
        );
    }

    #[test]
    fn test_load_empty_storage_gives_defaults() {
        let (storage, prefs) = fresh();
        assert_eq!(prefs.settings(), &PreferenceRecord::default());
        // Loading does not write anything
        assert!(storage.is_empty());
    }

    #[test]
    fn test_load_merges_blob_over_defaults() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set("adminSettings", r#"{"compactMode":true,"dataRetention":30}"#)
            .unwrap();

        let prefs = PreferenceStore::load(storage, &keys());
        assert!(prefs.settings().compact_mode);
        assert_eq!(prefs.settings().data_retention, 30);
        assert_eq!(prefs.settings().sidebar_width, 256);
    }

    #[test]
    fn test_load_theme_slice_wins() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set("adminSettings", r#"{"theme":"light","colorTheme":"blue"}"#)
            .unwrap();
        storage
            .set("stitchdesk-theme", r#"{"theme":"dark","colorTheme":"green"}"#)
            .unwrap();

        let prefs = PreferenceStore::load(storage, &keys());
        assert_eq!(prefs.theme(), ThemeMode::Dark);
        assert_eq!(prefs.color_theme(), ColorTheme::Green);
    }

    #[test]
    fn test_load_partial_slice_only_overrides_its_fields() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set("adminSettings", r#"{"theme":"light","colorTheme":"blue"}"#)
            .unwrap();
        storage.set("stitchdesk-theme", r#"{"theme":"dark"}"#).unwrap();

        let prefs = PreferenceStore::load(storage, &keys());
        assert_eq!(prefs.theme(), ThemeMode::Dark);
        assert_eq!(prefs.color_theme(), ColorTheme::Blue);
    }

    #[test]
    fn test_load_corrupt_values_fall_back() {
        let storage = Arc::new(MemoryStore::new());
        storage.set("adminSettings", "{{{").unwrap();
        storage.set("stitchdesk-theme", "nope").unwrap();

        let prefs = PreferenceStore::load(storage, &keys());
        assert_eq!(prefs.settings(), &PreferenceRecord::default());
    }

    #[test]
    fn test_change_color_theme_updates_both_views() {
        let (_, mut prefs) = fresh();
        prefs.change_color_theme(ColorTheme::Purple).unwrap();

        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("colorTheme"), Some(&json!("purple")));
        let slice = prefs.stored_theme_slice().unwrap().unwrap();
        assert_eq!(slice.color_theme, Some(ColorTheme::Purple));
        assert_eq!(prefs.color_theme(), ColorTheme::Purple);
    }

    #[test]
    fn test_change_theme_is_idempotent() {
        let (storage, mut prefs) = fresh();
        prefs.change_theme(ThemeMode::Dark).unwrap();
        let slice_once = storage.get("stitchdesk-theme").unwrap();
        let blob_once = storage.get("adminSettings").unwrap();

        prefs.change_theme(ThemeMode::Dark).unwrap();
        assert_eq!(storage.get("stitchdesk-theme").unwrap(), slice_once);
        assert_eq!(storage.get("adminSettings").unwrap(), blob_once);
        assert_views_agree(&prefs);
    }

    #[test]
    fn test_change_theme_preserves_other_blob_fields() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set("adminSettings", r#"{"compactMode":true,"theme":"light"}"#)
            .unwrap();
        let mut prefs = PreferenceStore::load(storage, &keys());

        prefs.change_theme(ThemeMode::Dark).unwrap();
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("compactMode"), Some(&json!(true)));
        assert_eq!(blob.get("theme"), Some(&json!("dark")));
    }

    #[test]
    fn test_change_theme_repairs_corrupt_blob() {
        let storage = Arc::new(MemoryStore::new());
        storage.set("adminSettings", "garbage").unwrap();
        let mut prefs = PreferenceStore::load(storage, &keys());

        prefs.change_theme(ThemeMode::Light).unwrap();
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("theme"), Some(&json!("light")));
    }

    #[test]
    fn test_change_theme_keeps_color_from_slice() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set("stitchdesk-theme", r#"{"theme":"light","colorTheme":"green"}"#)
            .unwrap();
        let mut prefs = PreferenceStore::load(storage.clone(), &keys());

        prefs.change_theme(ThemeMode::Dark).unwrap();
        assert_views_agree(&prefs);
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("colorTheme"), Some(&json!("green")));

        let reloaded = PreferenceStore::load(storage, &keys());
        assert_eq!(reloaded.theme(), ThemeMode::Dark);
        assert_eq!(reloaded.color_theme(), ColorTheme::Green);
    }

    #[test]
    fn test_change_color_theme_on_fresh_store_writes_both_fields() {
        let (_, mut prefs) = fresh();
        prefs.change_color_theme(ColorTheme::Blue).unwrap();
        assert_views_agree(&prefs);
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("theme"), Some(&json!("system")));
    }

    #[test]
    fn test_partial_save_keeps_views_in_agreement() {
        let (storage, mut prefs) = fresh();
        prefs.change_color_theme(ColorTheme::Purple).unwrap();

        let outcome = prefs.save_settings(Some(PreferencePatch {
            compact_mode: Some(true),
            ..Default::default()
        }));
        assert!(outcome.success);
        assert_views_agree(&prefs);
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("colorTheme"), Some(&json!("purple")));
        assert_eq!(blob.get("compactMode"), Some(&json!(true)));

        let reloaded = PreferenceStore::load(storage, &keys());
        assert_eq!(reloaded.color_theme(), ColorTheme::Purple);
        assert!(reloaded.settings().compact_mode);
    }

    #[test]
    fn test_empty_update_is_ignored() {
        let (_, mut prefs) = fresh();
        prefs.update_settings(PreferencePatch::default());
        assert_eq!(prefs.settings(), &PreferenceRecord::default());
    }

    #[test]
    fn test_staged_edits_are_not_persisted_until_saved() {
        let (_, mut prefs) = fresh();
        prefs.change_theme(ThemeMode::Dark).unwrap();

        prefs.update_settings(PreferencePatch {
            compact_mode: Some(true),
            ..Default::default()
        });
        assert!(prefs.settings().compact_mode);

        // Blob stays stale while edits are staged
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("compactMode"), None);

        // A theme change does not commit the staged edit
        prefs.change_color_theme(ColorTheme::Red).unwrap();
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("compactMode"), None);

        let outcome = prefs.save_settings(None);
        assert!(outcome.success);
        let blob = prefs.stored_settings_blob().unwrap().unwrap();
        assert_eq!(blob.get("compactMode"), Some(&json!(true)));
        assert_views_agree(&prefs);
    }

    #[test]
    fn test_save_round_trip_merges_over_defaults() {
        let (storage, mut prefs) = fresh();
        let patch = PreferencePatch {
            sidebar_collapsed: Some(true),
            auto_logout: Some(15),
            color_theme: Some(ColorTheme::Blue),
            ..Default::default()
        };
        assert_eq!(prefs.save_settings(Some(patch.clone())), SaveOutcome::saved());

        let reloaded = PreferenceStore::load(storage, &keys());
        let mut expected = PreferenceRecord::default();
        expected.apply(&patch);
        assert_eq!(reloaded.settings(), &expected);
        assert_eq!(prefs.settings(), &expected);
    }

    #[test]
    fn test_save_full_record_round_trip() {
        let (storage, mut prefs) = fresh();
        let record = PreferenceRecord {
            theme: ThemeMode::Light,
            color_theme: ColorTheme::Green,
            sidebar_width: 300,
            two_factor_auth: true,
            backup_frequency: BackupFrequency::Monthly,
            ..Default::default()
        };
        let patch: PreferencePatch =
            serde_json::from_value(serde_json::to_value(&record).unwrap()).unwrap();
        assert!(prefs.save_settings(Some(patch)).success);

        let reloaded = PreferenceStore::load(storage, &keys());
        assert_eq!(reloaded.settings(), &record);
    }

    #[test]
    fn test_save_failure_is_reported_not_raised() {
        let storage = Arc::new(MemoryStore::read_only());
        let mut prefs = PreferenceStore::load(storage, &keys());

        let outcome = prefs.save_settings(Some(PreferencePatch {
            compact_mode: Some(true),
            ..Default::default()
        }));
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("read-only"));
        // Memory is only updated once the write succeeded
        assert!(!prefs.settings().compact_mode);
    }

    #[test]
    fn test_change_theme_surfaces_storage_failure() {
        let storage = Arc::new(MemoryStore::read_only());
        let mut prefs = PreferenceStore::load(storage, &keys());
        assert!(matches!(
            prefs.change_theme(ThemeMode::Dark),
            Err(PreferenceError::Storage(_))
        ));
    }

    #[test]
    fn test_reset_restores_defaults_everywhere() {
        let (storage, mut prefs) = fresh();
        prefs.change_theme(ThemeMode::Dark).unwrap();
        prefs.update_settings(PreferencePatch {
            data_retention: Some(7),
            ..Default::default()
        });

        prefs.reset_settings().unwrap();
        assert_eq!(prefs.settings(), &PreferenceRecord::default());
        assert_views_agree(&prefs);

        let reloaded = PreferenceStore::load(storage, &keys());
        assert_eq!(reloaded.settings(), &PreferenceRecord::default());
    }

    #[test]
    fn test_custom_keys() {
        let storage = Arc::new(MemoryStore::new());
        let custom = StorageKeys {
            theme: "ui-theme".to_string(),
            settings: "prefs".to_string(),
            ..StorageKeys::default()
        };
        let mut prefs = PreferenceStore::load(storage.clone(), &custom);
        prefs.change_theme(ThemeMode::Light).unwrap();

        assert!(storage.get("ui-theme").unwrap().is_some());
        assert!(storage.get("prefs").unwrap().is_some());
        assert!(storage.get("adminSettings").unwrap().is_none());
    }
}
