use std::time::{Duration, Instant};

/// What the heartbeat tick should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatTick {
    Ping,
    /// The page stopped answering; reload it, then ping the fresh load.
    ReloadThenPing,
}

/// Tracks heartbeat acknowledgements from the page.
#[derive(Debug, Clone)]
pub struct LivenessMonitor {
    last_ack_at: Instant,
    outstanding_ping_sent_at: Option<Instant>,
    timeout: Duration,
}

impl LivenessMonitor {
    pub fn new(now: Instant, timeout: Duration) -> Self {
        Self {
            last_ack_at: now,
            outstanding_ping_sent_at: None,
            timeout,
        }
    }

    /// Every (re)load starts a fresh liveness window.
    pub fn reset(&mut self, now: Instant) {
        self.last_ack_at = now;
        self.outstanding_ping_sent_at = None;
    }

    /// Returns the round trip of the ping being answered, if one was out.
    pub fn on_ack(&mut self, now: Instant) -> Option<Duration> {
        self.last_ack_at = now;
        self.outstanding_ping_sent_at
            .take()
            .map(|sent| now.saturating_duration_since(sent))
    }

    pub fn record_ping(&mut self, now: Instant) {
        self.outstanding_ping_sent_at.get_or_insert(now);
    }

    /// True when the page is unresponsive. The clock restarts here so one
    /// timeout yields exactly one reload.
    pub fn check_liveness(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_ack_at) > self.timeout {
            self.reset(now);
            true
        } else {
            false
        }
    }

    /// Liveness is checked before each ping.
    pub fn tick(&mut self, now: Instant) -> HeartbeatTick {
        let unresponsive = self.check_liveness(now);
        self.record_ping(now);
        if unresponsive {
            HeartbeatTick::ReloadThenPing
        } else {
            HeartbeatTick::Ping
        }
    }
}
