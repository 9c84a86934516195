//! Commands the supervisor script invokes from the player page.

use tauri::{AppHandle, State};
use tauri_plugin_dialog::DialogExt;
use tauri_plugin_opener::OpenerExt;

use crate::{
    effects,
    page::{
        channel::PageCommand,
        intercept::{external_url, SaveFileResult, SaveRequest},
        playback::{MediaElementState, MediaEvent},
        probe::ControlSnapshot,
    },
    settings::{PageSettings, SettingsPatch},
    supervisor::PageEvent,
    update::{UpdateCommandResult, UpdateController, UpdateStatus},
    AppState,
};

fn updates_from_state(state: &State<'_, AppState>) -> UpdateController {
    state.updates.clone()
}

#[tauri::command]
pub fn get_settings(state: State<'_, AppState>) -> Result<PageSettings, String> {
    Ok(PageSettings::from(&state.settings.preferences()))
}

#[tauri::command]
pub fn save_settings(state: State<'_, AppState>, patch: SettingsPatch) -> Result<bool, String> {
    let record = effects::save_settings(&state.settings, state.effects.as_ref(), &patch)
        .map_err(|e| e.to_string())?;
    state
        .supervisor
        .send(PageCommand::SettingsChanged(PageSettings::from(&record)));
    Ok(true)
}

#[tauri::command]
pub async fn save_file(
    app: AppHandle,
    data: String,
    filename: String,
    mime_type: String,
) -> Result<SaveFileResult, String> {
    let request = match SaveRequest::decode(&data, &filename, &mime_type) {
        Ok(request) => request,
        Err(err) => return Ok(SaveFileResult::failed(format!("{err:#}"))),
    };

    let mut dialog = app.dialog().file().set_file_name(&request.file_name);
    if let Some((name, extensions)) = request.filter() {
        let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
        dialog = dialog.add_filter(name, &extensions);
    }

    let (tx, rx) = tokio::sync::oneshot::channel();
    dialog.save_file(move |path| {
        let _ = tx.send(path);
    });
    let Some(path) = rx.await.ok().flatten() else {
        return Ok(SaveFileResult::canceled());
    };

    let path = match path.into_path() {
        Ok(path) => path,
        Err(err) => return Ok(SaveFileResult::failed(err)),
    };
    match tokio::fs::write(&path, &request.bytes).await {
        Ok(()) => {
            log::info!(
                "Saved {} ({}, {} bytes) to {}",
                request.file_name,
                request.mime_type,
                request.bytes.len(),
                path.display()
            );
            Ok(SaveFileResult::saved(path.display().to_string()))
        }
        Err(err) => Ok(SaveFileResult::failed(err)),
    }
}

#[tauri::command]
pub fn get_app_version(app: AppHandle) -> String {
    app.package_info().version.to_string()
}

#[tauri::command]
pub async fn check_for_updates(state: State<'_, AppState>) -> Result<UpdateCommandResult, String> {
    let updates = updates_from_state(&state);
    Ok(UpdateCommandResult::from_result(updates.check().await, |info| info))
}

#[tauri::command]
pub async fn download_update(state: State<'_, AppState>) -> Result<UpdateCommandResult, String> {
    let updates = updates_from_state(&state);
    Ok(UpdateCommandResult::from_result(updates.download().await, |_| None))
}

/// Installs and restarts; only returns on failure.
#[tauri::command]
pub fn install_update(state: State<'_, AppState>) -> Result<(), String> {
    state.updates.install().map_err(|e| format!("{e:#}"))
}

#[tauri::command]
pub fn get_update_status(state: State<'_, AppState>) -> UpdateStatus {
    state.updates.status()
}

#[tauri::command]
pub fn heartbeat_pong(state: State<'_, AppState>) {
    state.supervisor.heartbeat_ack();
}

#[tauri::command]
pub fn page_ready(state: State<'_, AppState>, url: String) {
    state.supervisor.on_page_event(PageEvent::PageReady { url });
}

#[tauri::command]
pub fn report_media_event(state: State<'_, AppState>, event: MediaEvent) {
    state.supervisor.media_event(event);
}

#[tauri::command]
pub fn report_control_snapshot(state: State<'_, AppState>, snapshot: ControlSnapshot) {
    state.supervisor.control_snapshot(&snapshot);
}

#[tauri::command]
pub fn report_media_snapshot(state: State<'_, AppState>, media: Vec<MediaElementState>) {
    state.supervisor.media_snapshot(&media);
}

#[tauri::command]
pub fn open_external(app: AppHandle, url: String) -> Result<(), String> {
    let url = external_url(&url).ok_or_else(|| format!("refusing to open {url}"))?;
    app.opener()
        .open_url(url.as_str(), None::<&str>)
        .map_err(|e| e.to_string())
}
