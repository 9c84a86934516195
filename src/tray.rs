use tauri::{
    menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem},
    tray::{MouseButton, MouseButtonState, TrayIcon, TrayIconBuilder, TrayIconEvent},
    AppHandle, Manager, Wry,
};
use tokio::sync::watch;

use crate::{config::TRAY_TOOLTIP, page::channel::PageCommand, window::show_main_window, AppState};

const TRAY_ID: &str = "jmt-tray";

const TOGGLE_PLAY: &str = "toggle_play";
const SHOW: &str = "show";
const SETTINGS: &str = "settings";
const REFRESH: &str = "refresh";
const QUIT: &str = "quit";

pub fn toggle_label(playing: bool) -> &'static str {
    if playing {
        "⏸ 暂停"
    } else {
        "▶ 播放"
    }
}

pub fn build_tray(app: &AppHandle, play_state: watch::Receiver<Option<bool>>) -> tauri::Result<TrayIcon> {
    let toggle = MenuItem::with_id(app, TOGGLE_PLAY, toggle_label(false), true, None::<&str>)?;
    let show = MenuItem::with_id(app, SHOW, "打开主窗口", true, None::<&str>)?;
    let settings = MenuItem::with_id(app, SETTINGS, "设置", true, None::<&str>)?;
    let refresh = MenuItem::with_id(app, REFRESH, "刷新页面", true, None::<&str>)?;
    let quit = MenuItem::with_id(app, QUIT, "退出", true, None::<&str>)?;

    let menu = Menu::with_items(
        app,
        &[
            &toggle,
            &PredefinedMenuItem::separator(app)?,
            &show,
            &settings,
            &refresh,
            &PredefinedMenuItem::separator(app)?,
            &quit,
        ],
    )?;

    let mut builder = TrayIconBuilder::with_id(TRAY_ID)
        .tooltip(TRAY_TOOLTIP)
        .menu(&menu)
        .show_menu_on_left_click(false)
        .on_menu_event(handle_menu_event)
        .on_tray_icon_event(|tray, event| match event {
            TrayIconEvent::Click {
                button: MouseButton::Left,
                button_state: MouseButtonState::Up,
                ..
            }
            | TrayIconEvent::DoubleClick {
                button: MouseButton::Left,
                ..
            } => show_main_window(tray.app_handle()),
            _ => {}
        });
    if let Some(icon) = app.default_window_icon() {
        builder = builder.icon(icon.clone());
    }
    let tray = builder.build(app)?;

    follow_play_state(toggle, play_state);
    Ok(tray)
}

fn follow_play_state(toggle: MenuItem<Wry>, mut play_state: watch::Receiver<Option<bool>>) {
    tauri::async_runtime::spawn(async move {
        while play_state.changed().await.is_ok() {
            let playing = play_state.borrow_and_update().unwrap_or(false);
            if let Err(err) = toggle.set_text(toggle_label(playing)) {
                log::warn!("Failed to update tray label: {err}");
            }
        }
    });
}

fn handle_menu_event(app: &AppHandle, event: MenuEvent) {
    let Some(state) = app.try_state::<AppState>() else {
        return;
    };
    match event.id.as_ref() {
        TOGGLE_PLAY => state.supervisor.send(PageCommand::TogglePlay),
        SHOW => show_main_window(app),
        SETTINGS => {
            show_main_window(app);
            state.supervisor.send(PageCommand::OpenSettings);
        }
        REFRESH => state.supervisor.reload(),
        QUIT => state.quit(app),
        other => log::debug!("Unhandled tray menu item {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_names_the_action_not_the_state() {
        assert_eq!(toggle_label(true), "⏸ 暂停");
        assert_eq!(toggle_label(false), "▶ 播放");
    }
}
