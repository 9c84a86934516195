use super::{HelperCommand, HelperError, HelperRunner, Platform};
use crate::settings::MAX_VOLUME;

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Volume keys move the level in 2% steps, so 50 presses cover the full range.
pub const KEY_STEPS: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMethod {
    Helper,
    KeyPresses,
}

/// Presses of "volume up" needed to reach `percent` from silence.
pub fn key_presses_for(percent: u8) -> u32 {
    (u32::from(percent.min(MAX_VOLUME)) * KEY_STEPS + 50) / 100
}

pub fn primary_command(platform: Platform, percent: u8) -> Option<HelperCommand> {
    let percent = percent.min(MAX_VOLUME);
    match platform {
        Platform::Windows => {
            let level = u32::from(percent) * 65_535 / 100;
            Some(HelperCommand::new(
                "nircmd.exe",
                ["setsysvolume".to_string(), level.to_string()],
            ))
        }
        Platform::MacOs => Some(HelperCommand::new(
            "osascript",
            ["-e".to_string(), format!("set volume output volume {percent}")],
        )),
        Platform::Linux => Some(HelperCommand::new(
            "pactl",
            [
                "set-sink-volume".to_string(),
                "@DEFAULT_SINK@".to_string(),
                format!("{percent}%"),
            ],
        )),
        Platform::Other => None,
    }
}

/// Mute-to-zero with volume-down presses, then climb back up.
pub fn fallback_command(platform: Platform, percent: u8) -> Option<HelperCommand> {
    let presses = key_presses_for(percent);
    match platform {
        Platform::Windows => {
            let mut script = format!(
                "$obj = New-Object -ComObject WScript.Shell; \
                 1..{KEY_STEPS} | ForEach-Object {{ $obj.SendKeys([char]174) }}; \
                 Start-Sleep -Milliseconds 100;"
            );
            // `1..0` iterates twice in PowerShell
            if presses > 0 {
                script.push_str(&format!(
                    " 1..{presses} | ForEach-Object {{ $obj.SendKeys([char]175) }}"
                ));
            }
            Some(HelperCommand::new(
                "powershell",
                [
                    "-NoProfile".to_string(),
                    "-NonInteractive".to_string(),
                    "-Command".to_string(),
                    script,
                ],
            ))
        }
        Platform::Linux => {
            let mut args = vec![
                "key".to_string(),
                "--repeat".to_string(),
                KEY_STEPS.to_string(),
                "--delay".to_string(),
                "5".to_string(),
                "XF86AudioLowerVolume".to_string(),
            ];
            if presses > 0 {
                args.extend([
                    "key".to_string(),
                    "--repeat".to_string(),
                    presses.to_string(),
                    "--delay".to_string(),
                    "5".to_string(),
                    "XF86AudioRaiseVolume".to_string(),
                ]);
            }
            Some(HelperCommand::new("xdotool", args))
        }
        Platform::MacOs | Platform::Other => None,
    }
}

/// Set the output volume, falling back to simulated key presses when the
/// primary helper fails.
pub async fn set_system_volume<R: HelperRunner>(
    runner: &R,
    platform: Platform,
    percent: u8,
) -> Result<VolumeMethod, HelperError> {
    let percent = percent.min(MAX_VOLUME);

    let primary_err = match primary_command(platform, percent) {
        Some(command) => match runner.run(&command).await {
            Ok(()) => {
                log_info!("System volume set to {percent}% via {}", command.program);
                return Ok(VolumeMethod::Helper);
            }
            Err(err) => {
                log_warn!("Volume helper failed ({err}); trying key presses");
                err
            }
        },
        None => HelperError::Unsupported,
    };

    match fallback_command(platform, percent) {
        Some(command) => {
            runner.run(&command).await?;
            log_info!("System volume set to {percent}% via key presses");
            Ok(VolumeMethod::KeyPresses)
        }
        None => Err(primary_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::testing::RecordingRunner;

    #[test]
    fn key_presses_scale_to_fifty_steps() {
        assert_eq!(key_presses_for(0), 0);
        assert_eq!(key_presses_for(80), 40);
        assert_eq!(key_presses_for(100), 50);
        assert_eq!(key_presses_for(33), 17);
        assert_eq!(key_presses_for(255), 50);
    }

    #[test]
    fn windows_fallback_skips_empty_raise_loop() {
        let cmd = fallback_command(Platform::Windows, 0).expect("windows fallback");
        let script = cmd.args.last().expect("script");
        assert!(script.contains("1..50"));
        assert!(!script.contains("[char]175"));

        let cmd = fallback_command(Platform::Windows, 80).expect("windows fallback");
        assert!(cmd.args.last().expect("script").contains("1..40 |"));
    }

    #[test]
    fn windows_helper_uses_full_scale_level() {
        let cmd = primary_command(Platform::Windows, 100).expect("windows helper");
        assert_eq!(cmd.args, vec!["setsysvolume", "65535"]);
    }

    #[tokio::test]
    async fn primary_success_runs_exactly_one_helper() {
        let runner = RecordingRunner::default();
        let method = set_system_volume(&runner, Platform::Linux, 65)
            .await
            .expect("volume");

        assert_eq!(method, VolumeMethod::Helper);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args.last().map(String::as_str), Some("65%"));
    }

    #[tokio::test]
    async fn failed_helper_falls_back_to_key_presses() {
        let runner = RecordingRunner::failing(&["pactl"]);
        let method = set_system_volume(&runner, Platform::Linux, 40)
            .await
            .expect("fallback");

        assert_eq!(method, VolumeMethod::KeyPresses);
        let programs: Vec<_> = runner.calls().into_iter().map(|c| c.program).collect();
        assert_eq!(programs, vec!["pactl", "xdotool"]);
    }

    #[tokio::test]
    async fn without_fallback_the_helper_error_surfaces() {
        let runner = RecordingRunner::failing(&["osascript"]);
        let err = set_system_volume(&runner, Platform::MacOs, 40)
            .await
            .expect_err("no fallback on macOS");
        assert!(matches!(err, HelperError::Failed { .. }));
        assert_eq!(runner.calls().len(), 1);
    }
}
