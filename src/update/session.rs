use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::page::channel::PageCommand;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub version: String,
    pub release_date: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgress {
    pub percent: f64,
    pub transferred: u64,
    pub total: Option<u64>,
    pub bytes_per_second: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "kebab-case")]
pub enum UpdateState {
    Idle,
    Checking,
    Available(UpdateInfo),
    NotAvailable,
    Downloading(UpdateProgress),
    Downloaded { version: String },
    Error { message: String },
    DevMode,
}

impl UpdateState {
    /// The `update-*` event forwarded to the page for this state.
    pub fn page_command(&self) -> Option<PageCommand> {
        Some(match self {
            UpdateState::Idle => return None,
            UpdateState::Checking => PageCommand::UpdateChecking,
            UpdateState::Available(info) => PageCommand::UpdateAvailable(info.clone()),
            UpdateState::NotAvailable => PageCommand::UpdateNotAvailable,
            UpdateState::Downloading(progress) => PageCommand::UpdateProgress(progress.clone()),
            UpdateState::Downloaded { version } => PageCommand::UpdateDownloaded {
                version: version.clone(),
            },
            UpdateState::Error { message } => PageCommand::UpdateError {
                message: message.clone(),
            },
            UpdateState::DevMode => PageCommand::UpdateDevMode,
        })
    }
}

/// What a transition means for the persisted reminder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingVersion {
    Keep,
    Set(String),
    Clear,
}

/// Reply to `get-update-status`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub info: Option<UpdateInfo>,
    pub state: UpdateState,
    pub downloaded: bool,
    pub last_checked_at: Option<DateTime<Utc>>,
}

/// In-memory update lifecycle for one process run.
#[derive(Debug, Clone)]
pub struct UpdateSession {
    state: UpdateState,
    info: Option<UpdateInfo>,
    downloaded_but_not_installed: bool,
    last_checked_at: Option<DateTime<Utc>>,
    startup_reminder: Option<String>,
}

impl Default for UpdateSession {
    fn default() -> Self {
        Self::restore(None)
    }
}

impl UpdateSession {
    /// Start a session from the version a previous run left pending.
    pub fn restore(pending_version: Option<String>) -> Self {
        Self {
            state: UpdateState::Idle,
            info: None,
            downloaded_but_not_installed: false,
            last_checked_at: None,
            startup_reminder: pending_version,
        }
    }

    pub fn info(&self) -> Option<&UpdateInfo> {
        self.info.as_ref()
    }

    pub fn downloaded_but_not_installed(&self) -> bool {
        self.downloaded_but_not_installed
    }

    pub fn is_busy(&self) -> bool {
        matches!(self.state, UpdateState::Checking | UpdateState::Downloading(_))
    }

    /// The reminder left by a previous run. Yields it once.
    pub fn take_startup_reminder(&mut self) -> Option<String> {
        self.startup_reminder.take()
    }

    /// Enter a busy state (checking or downloading) unless one is already
    /// running. The test and the transition happen under the same borrow.
    pub fn begin(&mut self, next: UpdateState) -> Option<PendingVersion> {
        if self.is_busy() {
            return None;
        }
        Some(self.transition(next))
    }

    pub fn transition(&mut self, next: UpdateState) -> PendingVersion {
        let pending = match &next {
            UpdateState::Checking => {
                self.last_checked_at = Some(Utc::now());
                PendingVersion::Keep
            }
            UpdateState::Available(info) => {
                self.info = Some(info.clone());
                PendingVersion::Set(info.version.clone())
            }
            UpdateState::NotAvailable => {
                self.info = None;
                PendingVersion::Clear
            }
            UpdateState::Downloaded { .. } => {
                self.downloaded_but_not_installed = true;
                PendingVersion::Clear
            }
            _ => PendingVersion::Keep,
        };
        self.state = next;
        pending
    }

    pub fn mark_installed(&mut self) {
        self.downloaded_but_not_installed = false;
        self.state = UpdateState::Idle;
    }

    pub fn status(&self) -> UpdateStatus {
        UpdateStatus {
            info: self.info.clone(),
            state: self.state.clone(),
            downloaded: self.downloaded_but_not_installed,
            last_checked_at: self.last_checked_at,
        }
    }
}

/// Accumulates download chunks into progress reports.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    started_at: Instant,
    transferred: u64,
    total: Option<u64>,
}

impl DownloadProgress {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            transferred: 0,
            total: None,
        }
    }

    pub fn advance(&mut self, chunk: usize, total: Option<u64>, now: Instant) -> UpdateProgress {
        self.transferred = self.transferred.saturating_add(chunk as u64);
        if total.is_some() {
            self.total = total;
        }

        let percent = match self.total {
            Some(total) if total > 0 => (self.transferred as f64 / total as f64 * 100.0).min(100.0),
            _ => 0.0,
        };
        let elapsed = now.saturating_duration_since(self.started_at).as_secs_f64();
        let bytes_per_second = if elapsed > 0.0 {
            (self.transferred as f64 / elapsed) as u64
        } else {
            0
        };

        UpdateProgress {
            percent,
            transferred: self.transferred,
            total: self.total,
            bytes_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use std::time::Duration;

    fn info(version: &str) -> UpdateInfo {
        UpdateInfo {
            version: version.into(),
            release_date: None,
            notes: Some("修复若干问题".into()),
        }
    }

    /// Mirrors what the controller does with each transition.
    fn drive(session: &mut UpdateSession, store: &SettingsStore, next: UpdateState) {
        match session.transition(next) {
            PendingVersion::Keep => {}
            PendingVersion::Set(version) => store.set_pending_update_version(Some(version)).expect("set"),
            PendingVersion::Clear => store.set_pending_update_version(None).expect("clear"),
        }
    }

    #[test]
    fn available_version_survives_a_restart_and_reminds_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.json");

        let store = SettingsStore::new(path.clone()).expect("store");
        let mut session = UpdateSession::restore(store.preferences().pending_update_version);
        assert_eq!(session.take_startup_reminder(), None);
        drive(&mut session, &store, UpdateState::Checking);
        drive(&mut session, &store, UpdateState::Available(info("1.3.0")));
        drop(store);

        let store = SettingsStore::new(path).expect("reopen");
        let mut session = UpdateSession::restore(store.preferences().pending_update_version);
        assert_eq!(session.take_startup_reminder(), Some("1.3.0".to_string()));
        assert_eq!(session.take_startup_reminder(), None);

        drive(&mut session, &store, UpdateState::NotAvailable);
        assert_eq!(store.preferences().pending_update_version, None);
    }

    #[test]
    fn download_clears_reminder_and_arms_install_on_quit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SettingsStore::new(dir.path().join("settings.json")).expect("store");
        let mut session = UpdateSession::default();

        drive(&mut session, &store, UpdateState::Available(info("1.3.0")));
        assert_eq!(store.preferences().pending_update_version.as_deref(), Some("1.3.0"));

        drive(&mut session, &store, UpdateState::Downloaded { version: "1.3.0".into() });
        assert_eq!(store.preferences().pending_update_version, None);
        assert!(session.downloaded_but_not_installed());

        session.mark_installed();
        assert!(!session.downloaded_but_not_installed());
    }

    #[test]
    fn errors_keep_the_reminder() {
        let mut session = UpdateSession::default();
        session.transition(UpdateState::Available(info("2.0.0")));
        let pending = session.transition(UpdateState::Error { message: "timeout".into() });
        assert_eq!(pending, PendingVersion::Keep);
        assert_eq!(session.status().info, Some(info("2.0.0")));
    }

    #[test]
    fn busy_session_refuses_a_second_start() {
        let mut session = UpdateSession::default();
        session.transition(UpdateState::Available(info("1.3.0")));

        let downloading = UpdateState::Downloading(UpdateProgress::default());
        assert_eq!(session.begin(downloading.clone()), Some(PendingVersion::Keep));
        assert_eq!(session.begin(downloading), None);
        assert_eq!(session.begin(UpdateState::Checking), None);

        session.transition(UpdateState::Downloaded { version: "1.3.0".into() });
        assert!(session.begin(UpdateState::Checking).is_some());
    }

    #[test]
    fn states_map_to_page_events() {
        assert_eq!(UpdateState::Idle.page_command(), None);
        assert_eq!(
            UpdateState::Checking.page_command(),
            Some(PageCommand::UpdateChecking)
        );
        assert_eq!(
            UpdateState::Downloaded { version: "1.3.0".into() }.page_command(),
            Some(PageCommand::UpdateDownloaded { version: "1.3.0".into() })
        );
    }

    #[test]
    fn progress_reports_percent_and_rate() {
        let start = Instant::now();
        let mut progress = DownloadProgress::new(start);
        progress.advance(250, Some(1_000), start + Duration::from_millis(500));
        let report = progress.advance(250, None, start + Duration::from_secs(1));

        assert_eq!(report.transferred, 500);
        assert_eq!(report.total, Some(1_000));
        assert!((report.percent - 50.0).abs() < f64::EPSILON);
        assert_eq!(report.bytes_per_second, 500);
    }

    #[test]
    fn unknown_size_reports_zero_percent() {
        let start = Instant::now();
        let report = DownloadProgress::new(start).advance(4_096, None, start);
        assert_eq!(report.percent, 0.0);
        assert_eq!(report.bytes_per_second, 0);
    }
}
