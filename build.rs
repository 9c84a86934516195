/// Commands the hosted player page is allowed to invoke. Each one gets an
/// `allow-<command>` permission that `capabilities/player-page.json` grants
/// to the remote origin.
const PAGE_COMMANDS: &[&str] = &[
    "get_settings",
    "save_settings",
    "save_file",
    "get_app_version",
    "check_for_updates",
    "download_update",
    "install_update",
    "get_update_status",
    "heartbeat_pong",
    "page_ready",
    "report_media_event",
    "report_control_snapshot",
    "report_media_snapshot",
    "open_external",
];

fn main() {
    tauri_build::try_build(
        tauri_build::Attributes::new()
            .app_manifest(tauri_build::AppManifest::new().commands(PAGE_COMMANDS)),
    )
    .expect("failed to run tauri-build");
}
