use anyhow::{bail, Context, Result};
use tauri::async_runtime::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{HEARTBEAT_INTERVAL, KEEP_AWAKE_INTERVAL, LOAD_WATCHDOG_TICK},
    page::channel::PageChannel,
    platform::{power::refresh_keep_awake, HelperRunner, Platform},
};

use super::Supervisor;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Owns the background loop driving heartbeats, the load watchdog and
/// keep-awake refreshes.
pub struct SupervisorWorker {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl Default for SupervisorWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl SupervisorWorker {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    pub fn start<C, R>(&mut self, supervisor: Supervisor<C>, runner: R, platform: Platform) -> Result<()>
    where
        C: PageChannel,
        R: HelperRunner + 'static,
    {
        if self.is_running() {
            bail!("supervisor loop already running");
        }

        let cancel_token = CancellationToken::new();
        let handle = tauri::async_runtime::spawn(supervisor_loop(
            supervisor,
            runner,
            platform,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("supervisor loop task failed to join")
        } else {
            Ok(())
        }
    }
}

pub async fn supervisor_loop<C, R>(
    supervisor: Supervisor<C>,
    runner: R,
    platform: Platform,
    cancel_token: CancellationToken,
) where
    C: PageChannel,
    R: HelperRunner,
{
    // The first heartbeat goes out one interval after start, not immediately.
    let mut heartbeat = tokio::time::interval_at(Instant::now() + HEARTBEAT_INTERVAL, HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut watchdog = tokio::time::interval(LOAD_WATCHDOG_TICK);
    watchdog.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut keep_awake = tokio::time::interval_at(Instant::now() + KEEP_AWAKE_INTERVAL, KEEP_AWAKE_INTERVAL);
    keep_awake.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("supervisor loop started");

    loop {
        tokio::select! {
            _ = heartbeat.tick() => supervisor.heartbeat(),
            _ = watchdog.tick() => supervisor.watchdog(),
            _ = keep_awake.tick() => {
                if !supervisor.playback_expected() {
                    log_debug!("keep-awake skipped; nothing is playing");
                    continue;
                }
                match refresh_keep_awake(&runner, platform).await {
                    Ok(()) => log_debug!("keep-awake refreshed"),
                    Err(err) => log_warn!("keep-awake refresh failed: {err}"),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("supervisor loop shutting down");
                break;
            }
        }
    }
}
