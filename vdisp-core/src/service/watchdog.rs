//! Idle self-termination.
//!
//! The watchdog wakes once per poll interval. When no display streams to a
//! sink and no call arrived for longer than the idle timeout, it runs its
//! idle hook once and stops. In the server binary that hook exits the
//! process.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::info;

use crate::service::activity::ActivityClock;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Reports whether any sink is currently attached.
pub type SinkProbe = Arc<dyn Fn() -> bool + Send + Sync>;

/// Runs once when the process has been idle long enough.
pub type IdleHook = Box<dyn FnOnce() + Send + 'static>;

pub struct IdleWatchdog {
    clock: Arc<ActivityClock>,
    probe: SinkProbe,
    idle_timeout: Duration,
    poll_interval: Duration,
}

impl IdleWatchdog {
    pub fn new(clock: Arc<ActivityClock>, probe: SinkProbe) -> Self {
        Self {
            clock,
            probe,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Whether the process counts as idle right now.
    pub fn is_idle(&self) -> bool {
        !(self.probe)() && self.clock.idle_for() > self.idle_timeout
    }

    /// Run on the current runtime until the hook fires.
    pub fn spawn(self, on_idle: IdleHook) -> JoinHandle<()> {
        tokio::spawn(self.run(on_idle))
    }

    pub async fn run(self, on_idle: IdleHook) {
        let mut ticker = interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if self.is_idle() {
                info!(
                    idle_ms = self.clock.idle_for().as_millis() as u64,
                    "no active clients, shutting down"
                );
                on_idle();
                return;
            }
        }
    }
}
