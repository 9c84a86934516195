//! The page-side supervisor.
//!
//! A thin script injected into the hosted page reports what it sees and
//! performs DOM actions; every decision about those observations is made
//! here so it can be exercised without a browser.

pub mod channel;
pub mod crash;
pub mod intercept;
pub mod playback;
pub mod probe;

use crate::config::{PROBE_INTERVAL_MS, RESUME_INTERVAL_MS, TARGET_ORIGIN};

use playback::{resume_targets, MediaElementState, MediaEvent, PlaybackIntent};
use probe::{ControlSnapshot, FallbackProbe, PlayState, PlaybackStateProbe};

const SCRIPT_TEMPLATE: &str = include_str!("supervisor.js");

/// The injected script with its timings and origin filled in.
pub fn supervisor_script() -> String {
    SCRIPT_TEMPLATE
        .replace("__PROBE_INTERVAL_MS__", &PROBE_INTERVAL_MS.to_string())
        .replace("__RESUME_INTERVAL_MS__", &RESUME_INTERVAL_MS.to_string())
        .replace("__TARGET_ORIGIN__", TARGET_ORIGIN)
}

/// Per-load playback bookkeeping. Reset whenever the page reloads.
pub struct PageSupervisor {
    probe: Box<dyn PlaybackStateProbe>,
    intent: PlaybackIntent,
    play_state: Option<bool>,
}

impl Default for PageSupervisor {
    fn default() -> Self {
        Self::new(Box::new(FallbackProbe::default()))
    }
}

impl PageSupervisor {
    pub fn new(probe: Box<dyn PlaybackStateProbe>) -> Self {
        Self {
            probe,
            intent: PlaybackIntent::default(),
            play_state: None,
        }
    }

    pub fn reset(&mut self) {
        self.intent.reset();
        self.play_state = None;
    }

    pub fn should_be_playing(&self) -> bool {
        self.intent.should_be_playing()
    }

    /// Last inferred state of the page's play control, if ever known.
    pub fn play_state(&self) -> Option<bool> {
        self.play_state
    }

    /// Audio is expected either because the user started it or because the
    /// control says it is running.
    pub fn playback_expected(&self) -> bool {
        self.intent.should_be_playing() || self.play_state == Some(true)
    }

    pub fn on_media_event(&mut self, event: MediaEvent) -> bool {
        self.intent.observe(event)
    }

    /// Probe a control snapshot; returns the new play state when it changed.
    pub fn on_control_snapshot(&mut self, snapshot: &ControlSnapshot) -> Option<bool> {
        let playing = match self.probe.probe(snapshot) {
            PlayState::Playing => true,
            PlayState::Paused => false,
            PlayState::Unknown => return None,
        };
        if self.play_state == Some(playing) {
            return None;
        }
        self.play_state = Some(playing);
        Some(playing)
    }

    pub fn resume_targets(&self, elements: &[MediaElementState]) -> Vec<usize> {
        resume_targets(&self.intent, elements)
    }
}
