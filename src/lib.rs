mod commands;
mod config;
mod effects;
mod page;
mod platform;
mod settings;
mod supervisor;
mod tray;
mod update;
mod utils;
mod window;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use commands::{
    check_for_updates, download_update, get_app_version, get_settings, get_update_status,
    heartbeat_pong, install_update, open_external, page_ready, report_control_snapshot,
    report_media_event, report_media_snapshot, save_file, save_settings,
};
use config::{LaunchOptions, HELPER_TIMEOUT, HIDDEN_FLAG, MAIN_WINDOW, SETTINGS_FILE};
use effects::{OsEffects, TauriEffects};
use log::{info, warn};
use page::channel::WebviewChannel;
use platform::{Platform, ProcessRunner};
use settings::SettingsStore;
use supervisor::{PageEvent, Supervisor, SupervisorWorker};
use tauri::{webview::PageLoadEvent, AppHandle, Manager, RunEvent};
use tauri_plugin_autostart::MacosLauncher;
use update::UpdateController;

/// Everything the shell owns for the lifetime of the process.
pub(crate) struct AppState {
    pub(crate) settings: Arc<SettingsStore>,
    pub(crate) supervisor: Supervisor<WebviewChannel>,
    pub(crate) updates: UpdateController,
    pub(crate) effects: Arc<dyn OsEffects>,
    pub(crate) worker: tokio::sync::Mutex<SupervisorWorker>,
    pub(crate) launch: LaunchOptions,
    quitting: AtomicBool,
}

impl AppState {
    pub(crate) fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::SeqCst)
    }

    /// Quit for real: the close button no longer hides to the tray.
    pub(crate) fn quit(&self, app: &AppHandle) {
        self.quitting.store(true, Ordering::SeqCst);
        app.exit(0);
    }

    fn shutdown(&self) {
        tauri::async_runtime::block_on(async {
            if let Err(err) = self.worker.lock().await.stop().await {
                warn!("{err:#}");
            }
        });
        self.updates.install_on_quit();
    }
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    utils::logging::init(config::debug_mode());

    let launch = LaunchOptions::from_args(std::env::args());
    info!("JMT Player starting (hidden: {})", launch.start_hidden);

    let mut builder = tauri::Builder::default();

    #[cfg(desktop)]
    {
        builder = builder.plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            info!("Second instance launched; focusing the existing window");
            window::show_main_window(app);
        }));
    }

    let app = builder
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .plugin(tauri_plugin_updater::Builder::new().build())
        .plugin(tauri_plugin_autostart::init(
            MacosLauncher::LaunchAgent,
            Some(vec![HIDDEN_FLAG]),
        ))
        .on_page_load(|webview, payload| {
            if webview.label() != MAIN_WINDOW {
                return;
            }
            let Some(state) = webview.app_handle().try_state::<AppState>() else {
                return;
            };
            let url = payload.url().to_string();
            let event = match payload.event() {
                PageLoadEvent::Started => PageEvent::LoadStarted { url },
                PageLoadEvent::Finished => PageEvent::LoadFinished { url },
            };
            state.supervisor.on_page_event(event);
        })
        .on_window_event(window::handle_window_event)
        .setup(move |app| {
            let result = (|| -> anyhow::Result<()> {
                let handle = app.handle().clone();
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let settings = Arc::new(SettingsStore::new(app_data_dir.join(SETTINGS_FILE))?);
                let preferences = settings.preferences();

                let supervisor =
                    Supervisor::new(WebviewChannel::new(handle.clone())?, Arc::clone(&settings));
                let updates =
                    UpdateController::new(handle.clone(), Arc::clone(&settings), supervisor.clone());
                let effects: Arc<dyn OsEffects> = Arc::new(TauriEffects::new(handle.clone()));
                effects::apply_startup(&preferences, effects.as_ref());

                let mut worker = SupervisorWorker::new();
                worker.start(
                    supervisor.clone(),
                    ProcessRunner::new(HELPER_TIMEOUT),
                    Platform::current(),
                )?;

                let play_state = supervisor.subscribe_play_state();
                let loads = supervisor.subscribe_loads();

                app.manage(AppState {
                    settings,
                    supervisor,
                    updates,
                    effects,
                    worker: tokio::sync::Mutex::new(worker),
                    launch,
                    quitting: AtomicBool::new(false),
                });

                tray::build_tray(&handle, play_state).context("failed to create tray icon")?;
                window::create_main_window(&handle, preferences.window_bounds)?;
                window::reveal_after_first_load(handle, loads);

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_settings,
            save_settings,
            save_file,
            get_app_version,
            check_for_updates,
            download_update,
            install_update,
            get_update_status,
            heartbeat_pong,
            page_ready,
            report_media_event,
            report_control_snapshot,
            report_media_snapshot,
            open_external,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application");

    app.run(|app_handle, event| {
        if let RunEvent::Exit = event {
            if let Some(state) = app_handle.try_state::<AppState>() {
                info!("JMT Player shutting down");
                state.shutdown();
            }
        }
    });
}
