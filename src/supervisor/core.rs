use std::time::{Duration, Instant};

use crate::{
    config::{AUTO_PLAY_DELAY, HEARTBEAT_TIMEOUT, LOAD_RETRY_DELAY, LOAD_TIMEOUT, READY_GRACE, TARGET_ORIGIN},
    page::{
        channel::PageCommand,
        playback::{MediaElementState, MediaEvent},
        probe::ControlSnapshot,
        PageSupervisor,
    },
};

use super::{
    liveness::{HeartbeatTick, LivenessMonitor},
    recovery::{LoadOutcome, LoadRecovery, PageEvent},
};

/// Side effects the executor carries out on behalf of [`SupervisorCore`].
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Send(PageCommand),
    Reload,
    /// Reload after a delay unless another navigation happened first.
    ReloadAfter { delay: Duration, epoch: u64 },
    /// Ask the core again after a delay whether auto-play is still wanted.
    AutoPlayAfter { delay: Duration, epoch: u64 },
    PlayStateChanged(bool),
    PageLoaded,
}

/// All supervisor decisions, free of timers and webviews.
pub struct SupervisorCore {
    liveness: LivenessMonitor,
    recovery: LoadRecovery,
    page: PageSupervisor,
}

impl SupervisorCore {
    pub fn new(now: Instant) -> Self {
        Self::with_page(now, PageSupervisor::default())
    }

    pub fn with_page(now: Instant, page: PageSupervisor) -> Self {
        Self {
            liveness: LivenessMonitor::new(now, HEARTBEAT_TIMEOUT),
            recovery: LoadRecovery::new(TARGET_ORIGIN, LOAD_TIMEOUT, READY_GRACE),
            page,
        }
    }

    pub fn page(&self) -> &PageSupervisor {
        &self.page
    }

    pub fn on_page_event(&mut self, event: &PageEvent, now: Instant, auto_play: bool) -> Vec<Action> {
        match self.recovery.on_event(event, now) {
            LoadOutcome::Loaded => {
                self.liveness.reset(now);
                self.page.reset();
                let mut actions = vec![Action::PageLoaded];
                if auto_play {
                    actions.push(Action::AutoPlayAfter {
                        delay: AUTO_PLAY_DELAY,
                        epoch: self.recovery.epoch(),
                    });
                }
                actions
            }
            LoadOutcome::Failed => vec![self.retry()],
            LoadOutcome::Crashed => vec![Action::Reload],
            LoadOutcome::Pending | LoadOutcome::Ignored => Vec::new(),
        }
    }

    fn retry(&self) -> Action {
        Action::ReloadAfter {
            delay: LOAD_RETRY_DELAY,
            epoch: self.recovery.epoch(),
        }
    }

    pub fn on_watchdog(&mut self, now: Instant) -> Vec<Action> {
        match self.recovery.check_deadline(now) {
            LoadOutcome::Failed => vec![self.retry()],
            _ => Vec::new(),
        }
    }

    pub fn on_heartbeat_tick(&mut self, now: Instant) -> Vec<Action> {
        match self.liveness.tick(now) {
            HeartbeatTick::Ping => vec![Action::Send(PageCommand::HeartbeatPing)],
            HeartbeatTick::ReloadThenPing => {
                vec![Action::Reload, Action::Send(PageCommand::HeartbeatPing)]
            }
        }
    }

    pub fn on_heartbeat_ack(&mut self, now: Instant) -> Option<Duration> {
        self.liveness.on_ack(now)
    }

    pub fn on_media_event(&mut self, event: MediaEvent) -> bool {
        self.page.on_media_event(event)
    }

    pub fn on_control_snapshot(&mut self, snapshot: &ControlSnapshot) -> Vec<Action> {
        self.page
            .on_control_snapshot(snapshot)
            .map(Action::PlayStateChanged)
            .into_iter()
            .collect()
    }

    pub fn on_media_snapshot(&mut self, media: &[MediaElementState]) -> Vec<Action> {
        let indices = self.page.resume_targets(media);
        if indices.is_empty() {
            Vec::new()
        } else {
            vec![Action::Send(PageCommand::ResumeMedia { indices })]
        }
    }

    /// A deferred retry is dropped when the page already navigated again.
    pub fn reload_due(&self, epoch: u64) -> bool {
        self.recovery.epoch() == epoch
    }

    /// Auto-play clicks the play control, which toggles; an already playing
    /// page must be left alone.
    pub fn auto_play_due(&self, epoch: u64) -> Vec<Action> {
        if self.recovery.epoch() != epoch || !self.recovery.is_ready() {
            return Vec::new();
        }
        if self.page.play_state() == Some(true) {
            return Vec::new();
        }
        vec![Action::Send(PageCommand::AutoPlay)]
    }
}
