//! Host → page half of the message channel.
//!
//! Commands are delivered by evaluating a call into the supervisor script.
//! Every command is safe to deliver twice, so there is no sequencing.

use serde::Serialize;
use tauri::{AppHandle, Manager, Url};
use thiserror::Error;

use crate::{
    config::{MAIN_WINDOW, TARGET_URL},
    settings::PageSettings,
    update::{UpdateInfo, UpdateProgress},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum PageCommand {
    AutoPlay,
    TogglePlay,
    OpenSettings,
    HeartbeatPing,
    ResumeMedia { indices: Vec<usize> },
    SettingsChanged(PageSettings),
    UpdateChecking,
    UpdateAvailable(UpdateInfo),
    UpdateNotAvailable,
    UpdateProgress(UpdateProgress),
    UpdateDownloaded { version: String },
    UpdateError { message: String },
    UpdateDevMode,
}

impl PageCommand {
    pub fn name(&self) -> &'static str {
        match self {
            PageCommand::AutoPlay => "auto-play",
            PageCommand::TogglePlay => "toggle-play",
            PageCommand::OpenSettings => "open-settings",
            PageCommand::HeartbeatPing => "heartbeat-ping",
            PageCommand::ResumeMedia { .. } => "resume-media",
            PageCommand::SettingsChanged(_) => "settings-changed",
            PageCommand::UpdateChecking => "update-checking",
            PageCommand::UpdateAvailable(_) => "update-available",
            PageCommand::UpdateNotAvailable => "update-not-available",
            PageCommand::UpdateProgress(_) => "update-progress",
            PageCommand::UpdateDownloaded { .. } => "update-downloaded",
            PageCommand::UpdateError { .. } => "update-error",
            PageCommand::UpdateDevMode => "update-dev-mode",
        }
    }

    /// JavaScript that hands this command to the supervisor script. JSON is a
    /// valid JS expression, so the payload is embedded as-is.
    pub fn to_script(&self) -> Result<String, ChannelError> {
        let json = serde_json::to_string(self)?;
        Ok(format!(
            "window.__jmtSupervisor && window.__jmtSupervisor.dispatch({json});"
        ))
    }
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("main window is not open")]
    NoWindow,
    /// The webview refused the script; the window or its event loop is gone.
    #[error("webview rejected script: {0}")]
    Rejected(String),
    #[error("failed to encode page command: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ChannelError {
    pub fn renderer_gone(&self) -> bool {
        matches!(self, ChannelError::Rejected(_))
    }
}

/// The narrow surface the supervisor needs from the embedded page.
pub trait PageChannel: Send + Sync + 'static {
    fn send(&self, command: &PageCommand) -> Result<(), ChannelError>;
    /// Navigate back to the fixed target URL.
    fn reload(&self) -> Result<(), ChannelError>;
}

#[derive(Clone)]
pub struct WebviewChannel {
    app: AppHandle,
    target: Url,
}

impl WebviewChannel {
    pub fn new(app: AppHandle) -> anyhow::Result<Self> {
        Ok(Self {
            app,
            target: Url::parse(TARGET_URL)?,
        })
    }
}

impl PageChannel for WebviewChannel {
    fn send(&self, command: &PageCommand) -> Result<(), ChannelError> {
        let window = self
            .app
            .get_webview_window(MAIN_WINDOW)
            .ok_or(ChannelError::NoWindow)?;
        window
            .eval(&command.to_script()?)
            .map_err(|err| ChannelError::Rejected(err.to_string()))
    }

    fn reload(&self) -> Result<(), ChannelError> {
        let window = self
            .app
            .get_webview_window(MAIN_WINDOW)
            .ok_or(ChannelError::NoWindow)?;
        window
            .navigate(self.target.clone())
            .map_err(|err| ChannelError::Rejected(err.to_string()))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    };

    /// Records traffic instead of talking to a webview.
    #[derive(Default)]
    pub struct RecordingChannel {
        pub sent: Mutex<Vec<PageCommand>>,
        pub reloads: AtomicUsize,
        pub reject_sends: AtomicBool,
    }

    impl RecordingChannel {
        pub fn sent(&self) -> Vec<PageCommand> {
            self.sent.lock().expect("sent").clone()
        }

        pub fn reloads(&self) -> usize {
            self.reloads.load(Ordering::SeqCst)
        }
    }

    impl PageChannel for RecordingChannel {
        fn send(&self, command: &PageCommand) -> Result<(), ChannelError> {
            if self.reject_sends.load(Ordering::SeqCst) {
                return Err(ChannelError::Rejected("renderer exited".into()));
            }
            self.sent.lock().expect("sent").push(command.clone());
            Ok(())
        }

        fn reload(&self) -> Result<(), ChannelError> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Lets a test keep a handle on the channel it gave away.
    impl<T: PageChannel> PageChannel for Arc<T> {
        fn send(&self, command: &PageCommand) -> Result<(), ChannelError> {
            T::send(self.as_ref(), command)
        }

        fn reload(&self) -> Result<(), ChannelError> {
            T::reload(self.as_ref())
        }
    }
}
