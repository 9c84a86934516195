use std::{
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result};
use log::warn;
use tauri::AppHandle;
use tauri_plugin_dialog::{DialogExt, MessageDialogButtons, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;
use tauri_plugin_updater::{Update, UpdaterExt};

use crate::config::RELEASE_PAGE_URL;

use super::session::UpdateInfo;

const DIALOG_TITLE: &str = "JMT Player 更新";

/// Chunk size and, when known, total size of a download in progress.
pub type ChunkCallback = Box<dyn FnMut(usize, Option<u64>) + Send>;

/// The updater, dialogs and browser as seen by the update controller.
pub trait UpdateHost: Send + Sync + 'static {
    fn check(&self) -> impl Future<Output = Result<Option<UpdateInfo>>> + Send;
    /// Downloads the update found by the last successful check.
    fn download(&self, on_chunk: ChunkCallback) -> impl Future<Output = Result<Vec<u8>>> + Send;
    fn install(&self, bytes: &[u8]) -> Result<()>;
    /// Modal yes/no question; `false` when dismissed.
    fn confirm(&self, message: String, ok: &str, cancel: &str) -> impl Future<Output = bool> + Send;
    fn open_release_page(&self);
    fn restart(&self);
}

/// Backed by `tauri-plugin-updater`, `tauri-plugin-dialog` and
/// `tauri-plugin-opener`.
pub struct TauriUpdateHost {
    app: AppHandle,
    update: Mutex<Option<Update>>,
}

impl TauriUpdateHost {
    pub fn new(app: AppHandle) -> Self {
        Self {
            app,
            update: Mutex::new(None),
        }
    }

    fn update(&self) -> MutexGuard<'_, Option<Update>> {
        self.update.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UpdateHost for TauriUpdateHost {
    async fn check(&self) -> Result<Option<UpdateInfo>> {
        let found = self
            .app
            .updater()
            .context("updater is not configured")?
            .check()
            .await
            .context("update check failed")?;

        let info = found.as_ref().map(|update| UpdateInfo {
            version: update.version.clone(),
            release_date: update.date.map(|date| date.to_string()),
            notes: update.body.clone(),
        });
        *self.update() = found;
        Ok(info)
    }

    async fn download(&self, on_chunk: ChunkCallback) -> Result<Vec<u8>> {
        let update = self
            .update()
            .clone()
            .context("no update has been found yet")?;
        update
            .download(on_chunk, || {})
            .await
            .context("update download failed")
    }

    fn install(&self, bytes: &[u8]) -> Result<()> {
        let update = self
            .update()
            .clone()
            .context("downloaded update is no longer tracked")?;
        update.install(bytes).context("failed to install update")
    }

    async fn confirm(&self, message: String, ok: &str, cancel: &str) -> bool {
        let (tx, rx) = tokio::sync::oneshot::channel();
        self.app
            .dialog()
            .message(message)
            .title(DIALOG_TITLE)
            .kind(MessageDialogKind::Info)
            .buttons(MessageDialogButtons::OkCancelCustom(ok.to_string(), cancel.to_string()))
            .show(move |confirmed| {
                let _ = tx.send(confirmed);
            });
        rx.await.unwrap_or(false)
    }

    fn open_release_page(&self) {
        if let Err(err) = self.app.opener().open_url(RELEASE_PAGE_URL, None::<&str>) {
            warn!("Failed to open release page: {err}");
        }
    }

    fn restart(&self) {
        self.app.restart()
    }
}
