use anyhow::{Context, Result};
use log::{info, warn};
use tauri::{
    utils::config::BackgroundThrottlingPolicy, AppHandle, Manager, Url, WebviewUrl, WebviewWindow,
    WebviewWindowBuilder, Window, WindowEvent,
};
use tokio::sync::watch;

use crate::{
    config::{
        LOAD_TIMEOUT, MAIN_WINDOW, MIN_WINDOW_HEIGHT, MIN_WINDOW_WIDTH, TARGET_URL, WINDOW_TITLE,
    },
    page::{crash::watch_renderer, supervisor_script},
    settings::WindowBounds,
    AppState,
};

/// Builds the hidden main window pointed at the player page.
pub fn create_main_window(app: &AppHandle, bounds: WindowBounds) -> Result<WebviewWindow> {
    let url = Url::parse(TARGET_URL).context("invalid target url")?;
    let width = f64::from(bounds.width).max(MIN_WINDOW_WIDTH);
    let height = f64::from(bounds.height).max(MIN_WINDOW_HEIGHT);

    let window = WebviewWindowBuilder::new(app, MAIN_WINDOW, WebviewUrl::External(url))
        .title(WINDOW_TITLE)
        .inner_size(width, height)
        .min_inner_size(MIN_WINDOW_WIDTH, MIN_WINDOW_HEIGHT)
        .center()
        .visible(false)
        .initialization_script(&supervisor_script())
        .background_throttling(BackgroundThrottlingPolicy::Disabled)
        .build()
        .context("failed to create main window")?;

    let handle = app.clone();
    let watched = watch_renderer(&window, move |exit| {
        warn!("Renderer gone ({}): {}", if exit.clean { "clean" } else { "crash" }, exit.reason);
        if let Some(state) = handle.try_state::<AppState>() {
            state.supervisor.on_page_event(exit.into());
        }
    });
    if let Err(err) = watched {
        warn!("Renderer crashes will only be caught by heartbeats: {err}");
    }

    Ok(window)
}

pub fn show_main_window(app: &AppHandle) {
    let Some(window) = app.get_webview_window(MAIN_WINDOW) else {
        warn!("Main window is gone; nothing to show");
        return;
    };
    if window.is_minimized().unwrap_or(false) {
        let _ = window.unminimize();
    }
    let _ = window.show();
    let _ = window.set_focus();

    if let Some(state) = app.try_state::<AppState>() {
        state.updates.on_window_visible();
    }
}

/// Waits for the first successful page load, then shows the window (unless
/// launched hidden) and applies the startup volume. A page that never loads
/// still gets its window shown after the load timeout so the user sees it.
pub fn reveal_after_first_load(app: AppHandle, mut loads: watch::Receiver<u64>) {
    tauri::async_runtime::spawn(async move {
        let loaded = tokio::time::timeout(LOAD_TIMEOUT, loads.wait_for(|count| *count > 0))
            .await
            .map(|result| result.is_ok())
            .unwrap_or(false);
        if !loaded {
            warn!("Player page has not loaded within {LOAD_TIMEOUT:?}; showing window anyway");
        }

        let Some(state) = app.try_state::<AppState>() else {
            return;
        };
        if state.launch.start_hidden {
            info!("Started hidden; window stays in the tray");
        } else {
            show_main_window(&app);
        }

        let preferences = state.settings.preferences();
        if loaded && preferences.auto_volume {
            state.effects.apply_volume(preferences.volume_level);
        }
    });
}

pub fn handle_window_event(window: &Window, event: &WindowEvent) {
    if window.label() != MAIN_WINDOW {
        return;
    }
    let app = window.app_handle();
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };

    match event {
        WindowEvent::CloseRequested { api, .. } => {
            if state.is_quitting() {
                return;
            }
            api.prevent_close();
            let _ = window.hide();
        }
        WindowEvent::Resized(size) => {
            let maximized = window.is_maximized().unwrap_or(false);
            let minimized = window.is_minimized().unwrap_or(false);
            if maximized || minimized || size.width == 0 || size.height == 0 {
                return;
            }
            let scale = window.scale_factor().unwrap_or(1.0);
            let logical = size.to_logical::<f64>(scale);
            let bounds = WindowBounds {
                width: logical.width.round() as u32,
                height: logical.height.round() as u32,
            };
            if let Err(err) = state.settings.set_window_bounds(bounds) {
                warn!("Failed to persist window size: {err:#}");
            }
        }
        _ => {}
    }
}
