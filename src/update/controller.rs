use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Instant,
};

use anyhow::{anyhow, Context, Result};
use log::{error, info, warn};
use serde::Serialize;
use tauri::AppHandle;

use crate::{
    config::UPDATE_CHECK_DELAY,
    page::channel::{PageChannel, WebviewChannel},
    settings::SettingsStore,
    supervisor::Supervisor,
};

use super::{
    host::{TauriUpdateHost, UpdateHost},
    session::{
        DownloadProgress, PendingVersion, UpdateInfo, UpdateProgress, UpdateSession, UpdateState,
        UpdateStatus,
    },
};

/// Reply to the page's update commands.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCommandResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub info: Option<UpdateInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UpdateCommandResult {
    pub fn from_result<T>(result: Result<T>, info: impl FnOnce(T) -> Option<UpdateInfo>) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                info: info(value),
                error: None,
            },
            Err(err) => Self {
                success: false,
                info: None,
                error: Some(format!("{err:#}")),
            },
        }
    }
}

/// Drives an [`UpdateHost`] through [`UpdateSession`], persisting the
/// reminder and forwarding every transition to the page.
pub struct UpdateController<H: UpdateHost = TauriUpdateHost, C: PageChannel = WebviewChannel> {
    host: Arc<H>,
    settings: Arc<SettingsStore>,
    supervisor: Supervisor<C>,
    session: Arc<Mutex<UpdateSession>>,
    bytes: Arc<Mutex<Option<Vec<u8>>>>,
    startup_scheduled: Arc<AtomicBool>,
    dev_mode: bool,
}

impl<H: UpdateHost, C: PageChannel> Clone for UpdateController<H, C> {
    fn clone(&self) -> Self {
        Self {
            host: Arc::clone(&self.host),
            settings: Arc::clone(&self.settings),
            supervisor: self.supervisor.clone(),
            session: Arc::clone(&self.session),
            bytes: Arc::clone(&self.bytes),
            startup_scheduled: Arc::clone(&self.startup_scheduled),
            dev_mode: self.dev_mode,
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl UpdateController {
    pub fn new(
        app: AppHandle,
        settings: Arc<SettingsStore>,
        supervisor: Supervisor<WebviewChannel>,
    ) -> Self {
        Self::with_host(
            TauriUpdateHost::new(app),
            settings,
            supervisor,
            cfg!(debug_assertions),
        )
    }
}

impl<H: UpdateHost, C: PageChannel> UpdateController<H, C> {
    /// `dev_mode` reports `update-dev-mode` instead of checking.
    pub fn with_host(
        host: H,
        settings: Arc<SettingsStore>,
        supervisor: Supervisor<C>,
        dev_mode: bool,
    ) -> Self {
        let pending = settings.preferences().pending_update_version;
        Self {
            host: Arc::new(host),
            settings,
            supervisor,
            session: Arc::new(Mutex::new(UpdateSession::restore(pending))),
            bytes: Arc::new(Mutex::new(None)),
            startup_scheduled: Arc::new(AtomicBool::new(false)),
            dev_mode,
        }
    }

    pub fn status(&self) -> UpdateStatus {
        lock(&self.session).status()
    }

    fn transition(&self, next: UpdateState) {
        let pending = lock(&self.session).transition(next.clone());
        self.publish(pending, &next);
    }

    /// Enter a busy state, refusing when a check or download already runs.
    fn begin(&self, next: UpdateState) -> Result<()> {
        let pending = lock(&self.session)
            .begin(next.clone())
            .ok_or_else(|| anyhow!("an update check or download is already running"))?;
        self.publish(pending, &next);
        Ok(())
    }

    fn publish(&self, pending: PendingVersion, state: &UpdateState) {
        let persisted = match pending {
            PendingVersion::Keep => Ok(()),
            PendingVersion::Set(version) => self.settings.set_pending_update_version(Some(version)),
            PendingVersion::Clear => self.settings.set_pending_update_version(None),
        };
        if let Err(err) = persisted {
            warn!("Failed to persist pending update version: {err:#}");
        }
        if let Some(command) = state.page_command() {
            self.supervisor.send(command);
        }
    }

    /// Schedules the startup reminder or check once the window is first shown.
    pub fn on_window_visible(&self) {
        if self.startup_scheduled.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(UPDATE_CHECK_DELAY).await;
            this.startup().await;
        });
    }

    /// A reminder left by the previous run is asked about before any network
    /// check; declining it skips the check for this run.
    async fn startup(&self) {
        let reminder = lock(&self.session).take_startup_reminder();
        if let Some(version) = reminder {
            info!("Reminding about pending update {version}");
            let message = format!("新版本 {version} 已可用，是否现在下载？");
            if self.host.confirm(message, "下载", "稍后").await {
                match self.check().await {
                    Ok(Some(_)) => self.download_then_prompt().await,
                    Ok(None) => info!("Pending update {version} is no longer offered"),
                    Err(err) => warn!("Update check failed: {err:#}"),
                }
            }
            return;
        }

        match self.check().await {
            Ok(Some(info)) => self.prompt_download(info).await,
            Ok(None) => {}
            Err(err) => warn!("Update check failed: {err:#}"),
        }
    }

    pub async fn check(&self) -> Result<Option<UpdateInfo>> {
        if self.dev_mode {
            self.transition(UpdateState::DevMode);
            return Ok(None);
        }
        self.begin(UpdateState::Checking)?;

        match self.host.check().await {
            Ok(Some(info)) => {
                info!("Update {} is available", info.version);
                self.transition(UpdateState::Available(info.clone()));
                Ok(Some(info))
            }
            Ok(None) => {
                info!("Already on the latest version");
                self.transition(UpdateState::NotAvailable);
                Ok(None)
            }
            Err(err) => {
                self.transition(UpdateState::Error {
                    message: format!("{err:#}"),
                });
                Err(err)
            }
        }
    }

    async fn prompt_download(&self, info: UpdateInfo) {
        let mut message = format!("发现新版本 {}，是否现在下载？", info.version);
        if let Some(notes) = info.notes.as_deref().filter(|notes| !notes.trim().is_empty()) {
            message.push_str("\n\n");
            message.push_str(notes.trim());
        }
        if self.host.confirm(message, "下载", "稍后").await {
            self.download_then_prompt().await;
        }
    }

    async fn download_then_prompt(&self) {
        match self.download().await {
            Ok(version) => self.prompt_install(version).await,
            Err(err) => warn!("Update download failed: {err:#}"),
        }
    }

    /// Downloads the announced update. On failure the release page is opened
    /// instead of retrying.
    pub async fn download(&self) -> Result<String> {
        let version = lock(&self.session)
            .info()
            .map(|info| info.version.clone())
            .context("no update has been found yet")?;
        self.begin(UpdateState::Downloading(UpdateProgress::default()))?;

        let mut progress = DownloadProgress::new(Instant::now());
        let mut last_percent = 0;
        let this = self.clone();
        let on_chunk = Box::new(move |chunk: usize, total: Option<u64>| {
            let report = progress.advance(chunk, total, Instant::now());
            let whole = report.percent.floor() as u64;
            if whole != last_percent {
                last_percent = whole;
                this.transition(UpdateState::Downloading(report));
            }
        });

        match self.host.download(on_chunk).await {
            Ok(bytes) => {
                info!("Update {version} downloaded ({} bytes)", bytes.len());
                *lock(&self.bytes) = Some(bytes);
                self.transition(UpdateState::Downloaded {
                    version: version.clone(),
                });
                Ok(version)
            }
            Err(err) => {
                self.transition(UpdateState::Error {
                    message: format!("{err:#}"),
                });
                self.host.open_release_page();
                Err(err)
            }
        }
    }

    async fn prompt_install(&self, version: String) {
        let message = format!("新版本 {version} 已下载完成，是否立即重启并安装？");
        if self.host.confirm(message, "立即安装", "退出时安装").await {
            if let Err(err) = self.install() {
                error!("Update install failed: {err:#}");
            }
        }
    }

    /// Installs the downloaded update and restarts into it.
    pub fn install(&self) -> Result<()> {
        self.install_downloaded()?;
        self.host.restart();
        Ok(())
    }

    /// Called on process exit: a completed download is never left behind.
    pub fn install_on_quit(&self) {
        if !lock(&self.session).downloaded_but_not_installed() {
            return;
        }
        info!("Installing downloaded update before exit");
        if let Err(err) = self.install_downloaded() {
            error!("Install on quit failed: {err:#}");
        }
    }

    /// The bytes are only released once the installer accepted them, so a
    /// failed attempt can be repeated on quit.
    fn install_downloaded(&self) -> Result<()> {
        let mut bytes = lock(&self.bytes);
        let downloaded = bytes.as_deref().context("no downloaded update to install")?;
        self.host.install(downloaded)?;
        *bytes = None;
        drop(bytes);
        lock(&self.session).mark_installed();
        Ok(())
    }
}
