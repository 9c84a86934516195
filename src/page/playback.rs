use serde::Deserialize;

use crate::config::PAUSE_GRACE_MS;

/// `HTMLMediaElement.HAVE_CURRENT_DATA`
pub const HAVE_CURRENT_DATA: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaEventKind {
    Play,
    Pause,
    Ended,
}

/// A native media event seen by the supervisor script, stamped with the
/// page's `Date.now()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MediaEvent {
    pub kind: MediaEventKind,
    #[serde(rename = "at")]
    pub at_ms: u64,
}

/// Whether the page *should* be playing, as opposed to whether it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackIntent {
    should_be_playing: bool,
    last_play_started_at: Option<u64>,
}

impl PlaybackIntent {
    pub fn should_be_playing(&self) -> bool {
        self.should_be_playing
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Returns true when the intent changed.
    pub fn observe(&mut self, event: MediaEvent) -> bool {
        let before = self.should_be_playing;
        match event.kind {
            MediaEventKind::Play => {
                self.should_be_playing = true;
                self.last_play_started_at = Some(event.at_ms);
            }
            MediaEventKind::Ended => self.should_be_playing = false,
            MediaEventKind::Pause => {
                if !self.is_transient_pause(event.at_ms) {
                    self.should_be_playing = false;
                }
            }
        }
        before != self.should_be_playing
    }

    fn is_transient_pause(&self, at_ms: u64) -> bool {
        self.last_play_started_at
            .map(|started| at_ms.saturating_sub(started) <= PAUSE_GRACE_MS)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaElementState {
    pub index: usize,
    pub paused: bool,
    pub ended: bool,
    pub ready_state: u8,
}

impl MediaElementState {
    /// Stalled but able to continue: paused, not finished, and buffered.
    pub fn can_resume(&self) -> bool {
        self.paused && !self.ended && self.ready_state >= HAVE_CURRENT_DATA
    }
}

/// Indices of the media elements the recovery poll should call `play()` on.
pub fn resume_targets(intent: &PlaybackIntent, elements: &[MediaElementState]) -> Vec<usize> {
    if !intent.should_be_playing() {
        return Vec::new();
    }
    elements
        .iter()
        .filter(|element| element.can_resume())
        .map(|element| element.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: MediaEventKind, at_ms: u64) -> MediaEvent {
        MediaEvent { kind, at_ms }
    }

    fn playing_since(at_ms: u64) -> PlaybackIntent {
        let mut intent = PlaybackIntent::default();
        intent.observe(event(MediaEventKind::Play, at_ms));
        intent
    }

    #[test]
    fn pause_inside_grace_window_is_buffering() {
        let mut intent = playing_since(10_000);
        intent.observe(event(MediaEventKind::Pause, 10_000 + PAUSE_GRACE_MS));
        assert!(intent.should_be_playing());
    }

    #[test]
    fn pause_after_grace_window_is_deliberate() {
        let mut intent = playing_since(10_000);
        let changed = intent.observe(event(MediaEventKind::Pause, 10_000 + PAUSE_GRACE_MS + 1));
        assert!(changed);
        assert!(!intent.should_be_playing());
    }

    #[test]
    fn ended_always_clears_intent() {
        let mut intent = playing_since(10_000);
        intent.observe(event(MediaEventKind::Ended, 10_050));
        assert!(!intent.should_be_playing());
    }

    #[test]
    fn pause_without_play_is_deliberate() {
        let mut intent = PlaybackIntent::default();
        assert!(!intent.observe(event(MediaEventKind::Pause, 5)));
        assert!(!intent.should_be_playing());
    }

    #[test]
    fn stalled_buffered_media_is_resumed() {
        let intent = playing_since(0);
        let elements = [
            MediaElementState { index: 0, paused: true, ended: false, ready_state: 2 },
            MediaElementState { index: 1, paused: true, ended: true, ready_state: 4 },
            MediaElementState { index: 2, paused: false, ended: false, ready_state: 4 },
            MediaElementState { index: 3, paused: true, ended: false, ready_state: 1 },
        ];
        assert_eq!(resume_targets(&intent, &elements), vec![0]);
    }

    #[test]
    fn nothing_resumes_without_intent() {
        let elements = [MediaElementState { index: 0, paused: true, ended: false, ready_state: 4 }];
        assert!(resume_targets(&PlaybackIntent::default(), &elements).is_empty());
    }

    #[test]
    fn media_state_parses_from_script_payload() {
        let state: MediaElementState =
            serde_json::from_str(r#"{"index": 1, "paused": true, "ended": false, "readyState": 3}"#)
                .expect("state");
        assert!(state.can_resume());
    }
}
