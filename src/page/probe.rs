//! Play/pause inference from the hosted page's play control.
//!
//! The page never tells us whether it is playing; all we get is a snapshot of
//! the primary control button. Each probe reads one kind of fingerprint and
//! answers `Unknown` when it cannot tell. Any markup change on the hosted page
//! can silently break these, so they stay small and independently swappable.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Unknown,
}

/// What the supervisor script could see of the play control.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlSnapshot {
    pub found: bool,
    /// Class names of the button and everything inside it.
    pub class_names: Vec<String>,
    /// `d` attributes of every SVG path inside the button.
    pub path_data: Vec<String>,
    pub aria_label: Option<String>,
}

pub trait PlaybackStateProbe: Send + Sync {
    fn probe(&self, snapshot: &ControlSnapshot) -> PlayState;
}

/// Reads class-name words. State words (`is-playing`, `paused`) say what the
/// player is doing; icon words name the action the button performs, so an
/// `icon-pause` glyph means audio is playing.
pub struct IconClassProbe;

impl IconClassProbe {
    fn classify(word: &str) -> PlayState {
        match word {
            "playing" | "pause" => PlayState::Playing,
            "paused" | "play" => PlayState::Paused,
            _ => PlayState::Unknown,
        }
    }
}

impl PlaybackStateProbe for IconClassProbe {
    fn probe(&self, snapshot: &ControlSnapshot) -> PlayState {
        snapshot
            .class_names
            .iter()
            .flat_map(|names| names.split_whitespace())
            .flat_map(|token| token.split(['-', '_']))
            .map(|word| Self::classify(&word.to_ascii_lowercase()))
            .find(|state| *state != PlayState::Unknown)
            .unwrap_or(PlayState::Unknown)
    }
}

pub struct AriaLabelProbe;

impl PlaybackStateProbe for AriaLabelProbe {
    fn probe(&self, snapshot: &ControlSnapshot) -> PlayState {
        let Some(label) = snapshot.aria_label.as_deref() else {
            return PlayState::Unknown;
        };
        let label = label.to_lowercase();

        if label.contains("pause") || label.contains("暂停") {
            PlayState::Playing
        } else if label.contains("play") || label.contains("播放") {
            PlayState::Paused
        } else {
            PlayState::Unknown
        }
    }
}

/// Reads the SVG path shape: a pause glyph is two straight-edged bars, a
/// play glyph a single triangle. Sub-paths with curves are treated as
/// decoration (circles, rings) and ignored.
pub struct PathShapeProbe;

impl PathShapeProbe {
    fn glyph_subpaths(data: &str) -> usize {
        let mut count = 0;
        let mut current_is_glyph = false;
        let mut in_subpath = false;

        for ch in data.chars() {
            match ch {
                'M' | 'm' => {
                    if in_subpath && current_is_glyph {
                        count += 1;
                    }
                    in_subpath = true;
                    current_is_glyph = true;
                }
                'C' | 'c' | 'S' | 's' | 'Q' | 'q' | 'T' | 't' | 'A' | 'a' => {
                    current_is_glyph = false;
                }
                _ => {}
            }
        }
        if in_subpath && current_is_glyph {
            count += 1;
        }
        count
    }
}

impl PlaybackStateProbe for PathShapeProbe {
    fn probe(&self, snapshot: &ControlSnapshot) -> PlayState {
        let subpaths: usize = snapshot
            .path_data
            .iter()
            .map(|d| Self::glyph_subpaths(d))
            .sum();

        match subpaths {
            0 => PlayState::Unknown,
            1 => PlayState::Paused,
            _ => PlayState::Playing,
        }
    }
}

/// Asks each probe in turn and keeps the first definite answer.
pub struct FallbackProbe {
    probes: Vec<Box<dyn PlaybackStateProbe>>,
}

impl FallbackProbe {
    pub fn new(probes: Vec<Box<dyn PlaybackStateProbe>>) -> Self {
        Self { probes }
    }
}

impl Default for FallbackProbe {
    fn default() -> Self {
        Self::new(vec![
            Box::new(IconClassProbe),
            Box::new(AriaLabelProbe),
            Box::new(PathShapeProbe),
        ])
    }
}

impl PlaybackStateProbe for FallbackProbe {
    fn probe(&self, snapshot: &ControlSnapshot) -> PlayState {
        if !snapshot.found {
            return PlayState::Unknown;
        }
        self.probes
            .iter()
            .map(|probe| probe.probe(snapshot))
            .find(|state| *state != PlayState::Unknown)
            .unwrap_or(PlayState::Unknown)
    }
}
