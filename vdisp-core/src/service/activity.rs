//! Process-wide "last client activity" timestamp.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Monotonic last-active time shared by the facade and the watchdog.
///
/// Stored as milliseconds since construction; concurrent marks only ever
/// move it forward.
#[derive(Debug)]
pub struct ActivityClock {
    origin: Instant,
    last_ms: AtomicU64,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    /// A clock that counts as active right now.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            last_ms: AtomicU64::new(0),
        }
    }

    pub fn mark_active(&self) {
        let now = self.origin.elapsed().as_millis() as u64;
        self.last_ms.fetch_max(now, Ordering::AcqRel);
    }

    pub fn last_active(&self) -> Instant {
        self.origin + Duration::from_millis(self.last_ms.load(Ordering::Acquire))
    }

    /// Time since the last mark.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(self.last_active())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn idle_time_grows_until_marked() {
        let clock = ActivityClock::new();
        tokio::time::advance(Duration::from_millis(1_500)).await;
        assert_eq!(clock.idle_for(), Duration::from_millis(1_500));

        clock.mark_active();
        assert_eq!(clock.idle_for(), Duration::ZERO);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(clock.idle_for(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn never_moves_backwards() {
        let clock = ActivityClock::new();
        tokio::time::advance(Duration::from_secs(3)).await;
        clock.mark_active();
        let marked = clock.last_active();
        // A stale store cannot rewind the timestamp.
        clock.last_ms.fetch_max(1_000, Ordering::AcqRel);
        assert_eq!(clock.last_active(), marked);
    }
}
