//! Preferences that reach outside the app: login item and system volume.

use anyhow::{Context, Result};
use log::{info, warn};
use tauri::AppHandle;
use tauri_plugin_autostart::ManagerExt as AutostartManagerExt;

use crate::{
    config::HELPER_TIMEOUT,
    platform::{volume::set_system_volume, Platform, ProcessRunner},
    settings::{PreferenceRecord, SettingsPatch, SettingsStore},
};

pub trait OsEffects: Send + Sync {
    /// Register or unregister launch at login. Calling it with the current
    /// state is a no-op.
    fn set_auto_launch(&self, enabled: bool) -> Result<()>;
    /// Start applying the volume; the outcome is only logged.
    fn apply_volume(&self, percent: u8);
}

pub struct TauriEffects {
    app: AppHandle,
    platform: Platform,
}

impl TauriEffects {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            platform: Platform::current(),
        }
    }
}

impl OsEffects for TauriEffects {
    fn set_auto_launch(&self, enabled: bool) -> Result<()> {
        let autolaunch = self.app.autolaunch();
        let current = autolaunch
            .is_enabled()
            .context("failed to read launch-at-login state")?;
        if current == enabled {
            return Ok(());
        }
        let result = if enabled {
            autolaunch.enable()
        } else {
            autolaunch.disable()
        };
        result.context("failed to change launch-at-login state")?;
        info!("Launch at login {}", if enabled { "enabled" } else { "disabled" });
        Ok(())
    }

    fn apply_volume(&self, percent: u8) {
        let platform = self.platform;
        tauri::async_runtime::spawn(async move {
            let runner = ProcessRunner::new(HELPER_TIMEOUT);
            match set_system_volume(&runner, platform, percent).await {
                Ok(method) => info!("System volume set to {percent}% via {method:?}"),
                Err(err) => warn!("Failed to set system volume to {percent}%: {err}"),
            }
        });
    }
}

/// Persist a settings patch and apply the OS effect of each present field.
/// Volume is only re-applied while auto-volume is on after the patch.
pub fn save_settings(
    store: &SettingsStore,
    effects: &dyn OsEffects,
    patch: &SettingsPatch,
) -> Result<PreferenceRecord> {
    let record = store.apply_patch(patch)?;

    if let Some(enabled) = patch.auto_launch {
        if let Err(err) = effects.set_auto_launch(enabled) {
            warn!("{err:#}");
        }
    }
    if patch.volume_level.is_some() && record.auto_volume {
        effects.apply_volume(record.volume_level);
    }
    Ok(record)
}

/// Effects owed at startup, before the window is shown.
pub fn apply_startup(record: &PreferenceRecord, effects: &dyn OsEffects) {
    if record.auto_launch {
        if let Err(err) = effects.set_auto_launch(true) {
            warn!("{err:#}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Tracks login-item state like the real plugin and records volume calls.
    #[derive(Default)]
    struct FakeEffects {
        registered: Mutex<bool>,
        registrations: Mutex<usize>,
        volumes: Mutex<Vec<u8>>,
    }

    impl OsEffects for FakeEffects {
        fn set_auto_launch(&self, enabled: bool) -> Result<()> {
            let mut registered = self.registered.lock().expect("registered");
            if *registered != enabled {
                *registered = enabled;
                *self.registrations.lock().expect("registrations") += 1;
            }
            Ok(())
        }

        fn apply_volume(&self, percent: u8) {
            self.volumes.lock().expect("volumes").push(percent);
        }
    }

    fn store(dir: &tempfile::TempDir) -> SettingsStore {
        SettingsStore::new(dir.path().join("settings.json")).expect("store")
    }

    #[test]
    fn volume_applies_once_with_auto_volume() {
        for level in [0, 1, 65, 99, 100] {
            let dir = tempfile::tempdir().expect("tempdir");
            let store = store(&dir);
            let effects = FakeEffects::default();

            let patch = SettingsPatch {
                volume_level: Some(level),
                ..Default::default()
            };
            let record = save_settings(&store, &effects, &patch).expect("save");
            assert_eq!(record.volume_level, level);
            assert_eq!(*effects.volumes.lock().expect("volumes"), vec![level], "level {level}");
        }
    }

    #[test]
    fn volume_is_stored_but_not_applied_without_auto_volume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let effects = FakeEffects::default();

        let patch = SettingsPatch {
            auto_volume: Some(false),
            volume_level: Some(40),
            ..Default::default()
        };
        let record = save_settings(&store, &effects, &patch).expect("save");
        assert_eq!(record.volume_level, 40);
        assert!(effects.volumes.lock().expect("volumes").is_empty());
    }

    #[test]
    fn toggling_auto_volume_alone_does_not_touch_volume() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let effects = FakeEffects::default();

        let patch = SettingsPatch {
            auto_volume: Some(true),
            ..Default::default()
        };
        save_settings(&store, &effects, &patch).expect("save");
        assert!(effects.volumes.lock().expect("volumes").is_empty());
    }

    #[test]
    fn repeated_auto_launch_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = store(&dir);
        let effects = FakeEffects::default();
        let patch = SettingsPatch {
            auto_launch: Some(true),
            ..Default::default()
        };

        let once = save_settings(&store, &effects, &patch).expect("first");
        let twice = save_settings(&store, &effects, &patch).expect("second");

        assert_eq!(once, twice);
        assert_eq!(*effects.registrations.lock().expect("registrations"), 1);
        assert!(*effects.registered.lock().expect("registered"));
    }

    #[test]
    fn startup_registers_login_item_when_enabled() {
        let effects = FakeEffects::default();
        apply_startup(&PreferenceRecord::default(), &effects);
        assert!(*effects.registered.lock().expect("registered"));

        let effects = FakeEffects::default();
        let record = PreferenceRecord {
            auto_launch: false,
            ..Default::default()
        };
        apply_startup(&record, &effects);
        assert_eq!(*effects.registrations.lock().expect("registrations"), 0);
    }
}
