//! Fixed addresses, timings and launch flags for the player shell.
//!
//! Timings are constants, not user configuration. Only the debug switch is
//! read from the environment.

use std::time::Duration;

pub const TARGET_URL: &str = "https://player.coren.xin/";
pub const TARGET_ORIGIN: &str = "https://player.coren.xin";
pub const RELEASE_PAGE_URL: &str = "https://player.coren.xin/desktop/";

pub const MAIN_WINDOW: &str = "main";
pub const WINDOW_TITLE: &str = "JMT Player";
pub const TRAY_TOOLTIP: &str = "JMT Player - 济民堂广告播放器";
pub const MIN_WINDOW_WIDTH: f64 = 800.0;
pub const MIN_WINDOW_HEIGHT: f64 = 600.0;

pub const SETTINGS_FILE: &str = "settings.json";
pub const HIDDEN_FLAG: &str = "--hidden";
pub const DEBUG_ENV: &str = "JMT_PLAYER_DEBUG";

pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Two missed heartbeat cycles.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(60);
/// Pause between detecting a failed load and reloading. Counted from the
/// detection, so an error page served under the target URL reloads
/// `READY_GRACE + 3 s` after it finished, and a stalled navigation
/// `LOAD_TIMEOUT + 3 s` after it started. A foreign-origin finish reloads
/// after 3 s.
pub const LOAD_RETRY_DELAY: Duration = Duration::from_secs(3);
/// Upper bound between a navigation starting and the supervisor script reporting in.
pub const LOAD_TIMEOUT: Duration = Duration::from_secs(30);
/// How long a finished navigation may stay silent before it counts as an
/// error page. The script reports at `DOMContentLoaded`, which precedes the
/// finish, so a healthy page is never close to this.
pub const READY_GRACE: Duration = Duration::from_secs(3);
pub const LOAD_WATCHDOG_TICK: Duration = Duration::from_secs(1);
pub const AUTO_PLAY_DELAY: Duration = Duration::from_secs(3);
pub const KEEP_AWAKE_INTERVAL: Duration = Duration::from_secs(300);
pub const UPDATE_CHECK_DELAY: Duration = Duration::from_secs(5);
pub const HELPER_TIMEOUT: Duration = Duration::from_secs(10);

/// A pause this soon after a play start is buffering, not the user.
pub const PAUSE_GRACE_MS: u64 = 1_000;
pub const PROBE_INTERVAL_MS: u64 = 1_000;
pub const RESUME_INTERVAL_MS: u64 = 5_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    /// Create the main window but never show it on startup.
    pub start_hidden: bool,
}

impl LaunchOptions {
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            start_hidden: args.into_iter().any(|arg| arg.as_ref() == HIDDEN_FLAG),
        }
    }
}

pub fn debug_mode() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_flag_is_detected_anywhere_in_args() {
        let opts = LaunchOptions::from_args(["jmt-player.exe", "--autostart", "--hidden"]);
        assert!(opts.start_hidden);
    }

    #[test]
    fn plain_launch_is_visible() {
        let opts = LaunchOptions::from_args(["jmt-player.exe"]);
        assert_eq!(opts, LaunchOptions::default());
    }

    #[test]
    fn timeout_covers_two_heartbeats() {
        assert_eq!(HEARTBEAT_TIMEOUT, HEARTBEAT_INTERVAL * 2);
    }
}
