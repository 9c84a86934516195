use std::time::{Duration, Instant};

use tauri::Url;

/// Lifecycle notifications about the main webview's page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    LoadStarted { url: String },
    LoadFinished { url: String },
    /// The supervisor script reached `DOMContentLoaded` on the target origin.
    PageReady { url: String },
    RendererGone { clean: bool, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Nothing to do yet.
    Pending,
    Loaded,
    /// Retry after the fixed delay.
    Failed,
    /// Reload immediately.
    Crashed,
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadPhase {
    Idle,
    Loading { deadline: Instant },
    /// Navigation finished on the target; waiting for the script to report in.
    AwaitingReady { deadline: Instant },
    Ready,
    /// A reload has been or will be issued; further failures are the same one.
    Recovering,
}

/// Decides how each page event is recovered from.
#[derive(Debug, Clone)]
pub struct LoadRecovery {
    target_origin: String,
    load_timeout: Duration,
    ready_grace: Duration,
    phase: LoadPhase,
    /// Bumped on every navigation so deferred work can tell it went stale.
    epoch: u64,
}

impl LoadRecovery {
    pub fn new(target_origin: &str, load_timeout: Duration, ready_grace: Duration) -> Self {
        Self {
            target_origin: target_origin.trim_end_matches('/').to_string(),
            load_timeout,
            ready_grace,
            phase: LoadPhase::Idle,
            epoch: 0,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_ready(&self) -> bool {
        self.phase == LoadPhase::Ready
    }

    fn is_target(&self, url: &str) -> bool {
        Url::parse(url)
            .map(|url| url.origin().ascii_serialization() == self.target_origin)
            .unwrap_or(false)
    }

    pub fn on_event(&mut self, event: &PageEvent, now: Instant) -> LoadOutcome {
        match event {
            PageEvent::LoadStarted { .. } => {
                self.epoch += 1;
                self.phase = LoadPhase::Loading {
                    deadline: now + self.load_timeout,
                };
                LoadOutcome::Pending
            }
            PageEvent::LoadFinished { url } => match self.phase {
                LoadPhase::Ready | LoadPhase::Recovering => LoadOutcome::Ignored,
                _ if !self.is_target(url) => {
                    self.phase = LoadPhase::Recovering;
                    LoadOutcome::Failed
                }
                _ => {
                    self.phase = LoadPhase::AwaitingReady {
                        deadline: now + self.ready_grace,
                    };
                    LoadOutcome::Pending
                }
            },
            PageEvent::PageReady { url } => match self.phase {
                LoadPhase::Ready | LoadPhase::Recovering => LoadOutcome::Ignored,
                _ if !self.is_target(url) => LoadOutcome::Ignored,
                _ => {
                    self.phase = LoadPhase::Ready;
                    LoadOutcome::Loaded
                }
            },
            PageEvent::RendererGone { clean: true, .. } => LoadOutcome::Ignored,
            PageEvent::RendererGone { clean: false, .. } => {
                if self.phase == LoadPhase::Recovering {
                    return LoadOutcome::Ignored;
                }
                self.phase = LoadPhase::Recovering;
                LoadOutcome::Crashed
            }
        }
    }

    /// Watchdog check: a load that never finished, or finished without the
    /// script reporting ready, counts as a failed load.
    pub fn check_deadline(&mut self, now: Instant) -> LoadOutcome {
        match self.phase {
            LoadPhase::Loading { deadline } | LoadPhase::AwaitingReady { deadline }
                if now >= deadline =>
            {
                self.phase = LoadPhase::Recovering;
                LoadOutcome::Failed
            }
            _ => LoadOutcome::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LOAD_TIMEOUT, READY_GRACE, TARGET_ORIGIN, TARGET_URL};

    fn recovery() -> LoadRecovery {
        LoadRecovery::new(TARGET_ORIGIN, LOAD_TIMEOUT, READY_GRACE)
    }

    fn started() -> PageEvent {
        PageEvent::LoadStarted { url: TARGET_URL.into() }
    }

    fn finished(url: &str) -> PageEvent {
        PageEvent::LoadFinished { url: url.into() }
    }

    fn ready() -> PageEvent {
        PageEvent::PageReady { url: format!("{TARGET_URL}#/home") }
    }

    #[test]
    fn normal_load_is_loaded_once() {
        let now = Instant::now();
        let mut recovery = recovery();
        assert_eq!(recovery.on_event(&started(), now), LoadOutcome::Pending);
        assert_eq!(recovery.on_event(&ready(), now), LoadOutcome::Loaded);
        assert_eq!(recovery.on_event(&finished(TARGET_URL), now), LoadOutcome::Ignored);
        assert!(recovery.is_ready());
        assert_eq!(recovery.check_deadline(now + LOAD_TIMEOUT * 2), LoadOutcome::Pending);
    }

    #[test]
    fn error_page_is_a_failed_load() {
        let now = Instant::now();
        let mut recovery = recovery();
        recovery.on_event(&started(), now);
        assert_eq!(
            recovery.on_event(&finished("chrome-error://chromewebdata/"), now),
            LoadOutcome::Failed
        );
        assert_eq!(recovery.check_deadline(now + LOAD_TIMEOUT), LoadOutcome::Pending);
    }

    #[test]
    fn load_without_finish_times_out_once() {
        let now = Instant::now();
        let mut recovery = recovery();
        recovery.on_event(&started(), now);
        assert_eq!(recovery.check_deadline(now + Duration::from_secs(29)), LoadOutcome::Pending);
        assert_eq!(recovery.check_deadline(now + LOAD_TIMEOUT), LoadOutcome::Failed);
        assert_eq!(recovery.check_deadline(now + LOAD_TIMEOUT * 2), LoadOutcome::Pending);
    }

    #[test]
    fn finished_without_ready_fails_after_grace() {
        let now = Instant::now();
        let mut recovery = recovery();
        recovery.on_event(&started(), now);
        let finished_at = now + Duration::from_secs(2);
        recovery.on_event(&finished(TARGET_URL), finished_at);
        assert_eq!(recovery.check_deadline(finished_at + Duration::from_secs(1)), LoadOutcome::Pending);
        assert_eq!(recovery.check_deadline(finished_at + READY_GRACE), LoadOutcome::Failed);
    }

    #[test]
    fn crash_reloads_once_until_next_navigation() {
        let now = Instant::now();
        let mut recovery = recovery();
        recovery.on_event(&started(), now);
        recovery.on_event(&ready(), now);

        let crash = PageEvent::RendererGone { clean: false, reason: "killed".into() };
        assert_eq!(recovery.on_event(&crash, now), LoadOutcome::Crashed);
        assert_eq!(recovery.on_event(&crash, now), LoadOutcome::Ignored);

        let epoch = recovery.epoch();
        recovery.on_event(&started(), now);
        assert_eq!(recovery.epoch(), epoch + 1);
        recovery.on_event(&ready(), now);
        assert_eq!(recovery.on_event(&crash, now), LoadOutcome::Crashed);
    }

    #[test]
    fn clean_exit_is_not_a_crash() {
        let mut recovery = recovery();
        let exit = PageEvent::RendererGone { clean: true, reason: "shutdown".into() };
        assert_eq!(recovery.on_event(&exit, Instant::now()), LoadOutcome::Ignored);
    }

    #[test]
    fn ready_from_foreign_origin_is_ignored() {
        let now = Instant::now();
        let mut recovery = recovery();
        recovery.on_event(&started(), now);
        let foreign = PageEvent::PageReady { url: "https://example.com/".into() };
        assert_eq!(recovery.on_event(&foreign, now), LoadOutcome::Ignored);
        assert!(!recovery.is_ready());
    }
}
