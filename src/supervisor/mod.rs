//! Liveness and recovery supervision of the hosted page.
//!
//! [`SupervisorCore`] makes every decision; [`Supervisor`] carries them out
//! against a [`PageChannel`] and publishes what the rest of the shell watches
//! (play state for the tray, page loads for the window).

mod core;
mod liveness;
mod recovery;
mod worker;

pub use self::core::{Action, SupervisorCore};
pub use recovery::PageEvent;
pub use worker::SupervisorWorker;

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Instant,
};

use tokio::sync::watch;

use crate::{
    page::{
        channel::{PageChannel, PageCommand},
        playback::{MediaElementState, MediaEvent},
        probe::ControlSnapshot,
    },
    settings::SettingsStore,
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

pub struct Supervisor<C: PageChannel> {
    core: Arc<Mutex<SupervisorCore>>,
    channel: Arc<C>,
    settings: Arc<SettingsStore>,
    play_state: Arc<watch::Sender<Option<bool>>>,
    loads: Arc<watch::Sender<u64>>,
}

impl<C: PageChannel> Clone for Supervisor<C> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            channel: Arc::clone(&self.channel),
            settings: Arc::clone(&self.settings),
            play_state: Arc::clone(&self.play_state),
            loads: Arc::clone(&self.loads),
        }
    }
}

impl<C: PageChannel> Supervisor<C> {
    pub fn new(channel: C, settings: Arc<SettingsStore>) -> Self {
        Self {
            core: Arc::new(Mutex::new(SupervisorCore::new(Instant::now()))),
            channel: Arc::new(channel),
            settings,
            play_state: Arc::new(watch::channel(None).0),
            loads: Arc::new(watch::channel(0).0),
        }
    }

    fn core(&self) -> MutexGuard<'_, SupervisorCore> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Last inferred play state of the page; `None` until the control is seen.
    pub fn subscribe_play_state(&self) -> watch::Receiver<Option<bool>> {
        self.play_state.subscribe()
    }

    /// Counts successful page loads.
    pub fn subscribe_loads(&self) -> watch::Receiver<u64> {
        self.loads.subscribe()
    }

    pub fn playback_expected(&self) -> bool {
        self.core().page().playback_expected()
    }

    pub fn on_page_event(&self, event: PageEvent) {
        log_debug!("page event: {event:?}");
        let auto_play = self.settings.preferences().auto_play;
        let actions = self.core().on_page_event(&event, Instant::now(), auto_play);
        self.execute(actions);
    }

    pub fn heartbeat(&self) {
        let actions = self.core().on_heartbeat_tick(Instant::now());
        self.execute(actions);
    }

    pub fn heartbeat_ack(&self) {
        if let Some(round_trip) = self.core().on_heartbeat_ack(Instant::now()) {
            log_debug!("heartbeat answered in {round_trip:?}");
        }
    }

    pub fn watchdog(&self) {
        let actions = self.core().on_watchdog(Instant::now());
        self.execute(actions);
    }

    pub fn media_event(&self, event: MediaEvent) {
        if self.core().on_media_event(event) {
            log_debug!("playback intent changed by {:?}", event.kind);
        }
    }

    pub fn control_snapshot(&self, snapshot: &ControlSnapshot) {
        let actions = self.core().on_control_snapshot(snapshot);
        self.execute(actions);
    }

    pub fn media_snapshot(&self, media: &[MediaElementState]) {
        let actions = self.core().on_media_snapshot(media);
        self.execute(actions);
    }

    /// Deliver a command from elsewhere in the shell (tray, settings, updates).
    pub fn send(&self, command: PageCommand) {
        self.execute(vec![Action::Send(command)]);
    }

    pub fn reload(&self) {
        self.execute(vec![Action::Reload]);
    }

    fn execute(&self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Send(command) => self.deliver(&command),
                Action::Reload => {
                    log_info!("reloading page");
                    if let Err(err) = self.channel.reload() {
                        log_warn!("page reload failed: {err}");
                    }
                }
                Action::ReloadAfter { delay, epoch } => {
                    log_info!("page load failed; retrying in {delay:?}");
                    let this = self.clone();
                    tauri::async_runtime::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if this.core().reload_due(epoch) {
                            this.execute(vec![Action::Reload]);
                        }
                    });
                }
                Action::AutoPlayAfter { delay, epoch } => {
                    let this = self.clone();
                    tauri::async_runtime::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let actions = this.core().auto_play_due(epoch);
                        this.execute(actions);
                    });
                }
                Action::PlayStateChanged(playing) => {
                    log_debug!("play state changed: playing={playing}");
                    self.play_state.send_replace(Some(playing));
                }
                Action::PageLoaded => {
                    log_info!("page loaded");
                    self.loads.send_modify(|count| *count += 1);
                }
            }
        }
    }

    fn deliver(&self, command: &PageCommand) {
        match self.channel.send(command) {
            Ok(()) => {}
            Err(err) if err.renderer_gone() => {
                log_warn!("{} not delivered: {err}", command.name());
                self.on_page_event(PageEvent::RendererGone {
                    clean: false,
                    reason: err.to_string(),
                });
            }
            Err(err) => log_debug!("{} not delivered: {err}", command.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TARGET_URL, page::channel::testing::RecordingChannel};
    use std::sync::atomic::Ordering;

    fn supervisor(dir: &tempfile::TempDir) -> Supervisor<RecordingChannel> {
        let settings = SettingsStore::new(dir.path().join("settings.json")).expect("store");
        settings
            .apply_patch(&crate::settings::SettingsPatch {
                auto_play: Some(false),
                ..Default::default()
            })
            .expect("disable auto-play");
        Supervisor::new(RecordingChannel::default(), Arc::new(settings))
    }

    fn load(supervisor: &Supervisor<RecordingChannel>) {
        supervisor.on_page_event(PageEvent::LoadStarted { url: TARGET_URL.into() });
        supervisor.on_page_event(PageEvent::PageReady { url: TARGET_URL.into() });
    }

    #[tokio::test]
    async fn rejected_script_reloads_the_page() {
        let dir = tempfile::tempdir().expect("tempdir");
        let supervisor = supervisor(&dir);
        load(&supervisor);

        supervisor.channel.reject_sends.store(true, Ordering::SeqCst);
        supervisor.heartbeat();
        supervisor.heartbeat();

        assert_eq!(supervisor.channel.reloads(), 1);
    }

    #[tokio::test]
    async fn loads_and_play_state_are_published() {
        let dir = tempfile::tempdir().expect("tempdir");
        let supervisor = supervisor(&dir);
        let loads = supervisor.subscribe_loads();
        let play_state = supervisor.subscribe_play_state();

        load(&supervisor);
        supervisor.control_snapshot(&ControlSnapshot {
            found: true,
            aria_label: Some("Pause".into()),
            ..Default::default()
        });

        assert_eq!(*loads.borrow(), 1);
        assert_eq!(*play_state.borrow(), Some(true));
        assert!(supervisor.playback_expected());
    }

    #[tokio::test]
    async fn heartbeat_and_resume_go_through_the_channel() {
        let dir = tempfile::tempdir().expect("tempdir");
        let supervisor = supervisor(&dir);
        load(&supervisor);

        supervisor.heartbeat();
        supervisor.media_event(MediaEvent {
            kind: crate::page::playback::MediaEventKind::Play,
            at_ms: 0,
        });
        supervisor.media_snapshot(&[MediaElementState {
            index: 1,
            paused: true,
            ended: false,
            ready_state: 3,
        }]);

        assert_eq!(
            supervisor.channel.sent(),
            vec![
                PageCommand::HeartbeatPing,
                PageCommand::ResumeMedia { indices: vec![1] },
            ]
        );
    }
}
