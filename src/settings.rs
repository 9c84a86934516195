use anyhow::{Context, Result};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{PoisonError, RwLock},
};

pub const MAX_VOLUME: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowBounds {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowBounds {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 800,
        }
    }
}

/// Everything the shell remembers between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PreferenceRecord {
    pub auto_launch: bool,
    pub auto_play: bool,
    pub auto_volume: bool,
    #[serde(deserialize_with = "clamped_volume")]
    pub volume_level: u8,
    pub show_floating_button: bool,
    pub window_bounds: WindowBounds,
    /// Set when an update was announced but not yet downloaded, so the
    /// reminder survives a restart.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_update_version: Option<String>,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            auto_launch: true,
            auto_play: true,
            auto_volume: true,
            volume_level: 80,
            show_floating_button: true,
            window_bounds: WindowBounds::default(),
            pending_update_version: None,
        }
    }
}

impl PreferenceRecord {
    pub fn apply(&mut self, patch: &SettingsPatch) {
        if let Some(enabled) = patch.auto_launch {
            self.auto_launch = enabled;
        }
        if let Some(enabled) = patch.auto_play {
            self.auto_play = enabled;
        }
        if let Some(enabled) = patch.auto_volume {
            self.auto_volume = enabled;
        }
        if let Some(level) = patch.volume_level {
            self.volume_level = level.min(MAX_VOLUME);
        }
        if let Some(visible) = patch.show_floating_button {
            self.show_floating_button = visible;
        }
    }
}

/// The subset of preferences the page's settings panel works with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSettings {
    pub auto_launch: bool,
    pub auto_play: bool,
    pub auto_volume: bool,
    pub volume_level: u8,
    pub show_floating_button: bool,
}

impl From<&PreferenceRecord> for PageSettings {
    fn from(record: &PreferenceRecord) -> Self {
        Self {
            auto_launch: record.auto_launch,
            auto_play: record.auto_play,
            auto_volume: record.auto_volume,
            volume_level: record.volume_level,
            show_floating_button: record.show_floating_button,
        }
    }
}

/// A partial settings update: absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, alias = "autoLaunchEnabled")]
    pub auto_launch: Option<bool>,
    #[serde(default, alias = "autoPlayEnabled")]
    pub auto_play: Option<bool>,
    #[serde(default, alias = "autoVolumeEnabled")]
    pub auto_volume: Option<bool>,
    #[serde(
        default,
        alias = "targetVolumePercent",
        deserialize_with = "clamped_volume_opt"
    )]
    pub volume_level: Option<u8>,
    #[serde(default, alias = "floatingButtonVisible")]
    pub show_floating_button: Option<bool>,
}

pub fn clamp_volume(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_VOLUME)) as u8
}

fn clamped_volume<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_volume)
}

fn clamped_volume_opt<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.map(clamp_volume))
}

/// On-disk layout: every preference lives under one namespaced key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    player: PreferenceRecord,
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<SettingsFile>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings at {} ({err}); using defaults",
                    path.display()
                );
                SettingsFile::default()
            })
        } else {
            SettingsFile::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn preferences(&self) -> PreferenceRecord {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .player
            .clone()
    }

    /// Mutate a copy of the record, write it out if anything changed, and
    /// only then make it current. A failed write leaves memory as it was.
    pub fn update<F>(&self, mutate: F) -> Result<PreferenceRecord>
    where
        F: FnOnce(&mut PreferenceRecord),
    {
        let mut guard = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        mutate(&mut next.player);
        if next.player != guard.player {
            self.persist(&next)?;
            *guard = next;
        }
        Ok(guard.player.clone())
    }

    pub fn apply_patch(&self, patch: &SettingsPatch) -> Result<PreferenceRecord> {
        self.update(|record| record.apply(patch))
    }

    pub fn set_window_bounds(&self, bounds: WindowBounds) -> Result<()> {
        self.update(|record| record.window_bounds = bounds).map(|_| ())
    }

    pub fn set_pending_update_version(&self, version: Option<String>) -> Result<()> {
        self.update(|record| record.pending_update_version = version)
            .map(|_| ())
    }

    fn persist(&self, data: &SettingsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("settings.json")).expect("store")
    }

    #[test]
    fn first_run_uses_documented_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let prefs = store_in(&dir).preferences();

        assert!(prefs.auto_launch && prefs.auto_play && prefs.auto_volume);
        assert!(prefs.show_floating_button);
        assert_eq!(prefs.volume_level, 80);
        assert_eq!(prefs.window_bounds, WindowBounds { width: 1280, height: 800 });
        assert_eq!(prefs.pending_update_version, None);
    }

    #[test]
    fn partial_patch_leaves_other_fields_alone() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        store
            .apply_patch(&SettingsPatch {
                auto_play: Some(false),
                volume_level: Some(35),
                ..Default::default()
            })
            .expect("seed");

        let patch: SettingsPatch =
            serde_json::from_str(r#"{"floatingButtonVisible": false}"#).expect("patch");
        let after = store.apply_patch(&patch).expect("patch applied");

        assert!(!after.show_floating_button);
        assert!(!after.auto_play);
        assert!(after.auto_volume);
        assert_eq!(after.volume_level, 35);
    }

    #[test]
    fn repeated_patch_is_idempotent() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        let patch: SettingsPatch = serde_json::from_str(r#"{"autoLaunch": true}"#).expect("patch");

        let once = store.apply_patch(&patch).expect("first");
        let twice = store.apply_patch(&patch).expect("second");

        assert_eq!(once, twice);
        assert_eq!(store_in(&dir).preferences(), once);
    }

    #[test]
    fn volume_is_clamped_on_patch_and_on_load() {
        let patch: SettingsPatch =
            serde_json::from_str(r#"{"volumeLevel": 140}"#).expect("patch");
        assert_eq!(patch.volume_level, Some(100));
        let patch: SettingsPatch = serde_json::from_str(r#"{"volumeLevel": -3}"#).expect("patch");
        assert_eq!(patch.volume_level, Some(0));

        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"player": {"volumeLevel": 250, "autoPlay": false}}"#)
            .expect("write");
        let prefs = SettingsStore::new(path).expect("store").preferences();
        assert_eq!(prefs.volume_level, 100);
        assert!(!prefs.auto_play);
        assert!(prefs.auto_launch, "absent fields fall back to defaults");
    }

    #[test]
    fn failed_write_leaves_preferences_unchanged() {
        let dir = tempfile::tempdir().expect("temp dir");
        // A regular file where the settings directory should be.
        let blocker = dir.path().join("config");
        fs::write(&blocker, "").expect("write blocker");
        let store = SettingsStore::new(blocker.join("settings.json")).expect("store");

        let result = store.apply_patch(&SettingsPatch {
            auto_play: Some(false),
            volume_level: Some(20),
            ..Default::default()
        });

        assert!(result.is_err());
        assert_eq!(store.preferences(), PreferenceRecord::default());
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").expect("write");

        let prefs = SettingsStore::new(path).expect("store").preferences();
        assert_eq!(prefs, PreferenceRecord::default());
    }

    #[test]
    fn pending_update_version_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = store_in(&dir);
        store
            .set_pending_update_version(Some("1.3.0".into()))
            .expect("set");
        assert_eq!(
            store_in(&dir).preferences().pending_update_version.as_deref(),
            Some("1.3.0")
        );

        store.set_pending_update_version(None).expect("clear");
        assert_eq!(store_in(&dir).preferences().pending_update_version, None);
    }

    #[test]
    fn page_settings_expose_the_panel_subset() {
        let json = serde_json::to_value(PageSettings::from(&PreferenceRecord::default()))
            .expect("serialize");
        assert_eq!(json["volumeLevel"], 80);
        assert_eq!(json["showFloatingButton"], true);
        assert!(json.get("windowBounds").is_none());
    }
}
