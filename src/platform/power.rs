use super::{HelperCommand, HelperError, HelperRunner, Platform};

/// A command that resets the OS idle timer once, keeping the display and
/// system awake for another refresh interval.
pub fn keep_awake_command(platform: Platform) -> Option<HelperCommand> {
    match platform {
        // F15 exists on no physical keyboard, so tapping it only counts as activity.
        Platform::Windows => Some(HelperCommand::new(
            "powershell",
            [
                "-NoProfile",
                "-NonInteractive",
                "-Command",
                "(New-Object -ComObject WScript.Shell).SendKeys('{F15}')",
            ],
        )),
        Platform::MacOs => Some(HelperCommand::new("caffeinate", ["-u", "-t", "1"])),
        Platform::Linux => Some(HelperCommand::new("xdg-screensaver", ["reset"])),
        Platform::Other => None,
    }
}

pub async fn refresh_keep_awake<R: HelperRunner>(
    runner: &R,
    platform: Platform,
) -> Result<(), HelperError> {
    let command = keep_awake_command(platform).ok_or(HelperError::Unsupported)?;
    runner.run(&command).await
}
