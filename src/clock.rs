use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Wall-clock view anchored to tokio's monotonic clock.
///
/// Durable timers are journaled as absolute UTC times; this converts them to
/// tokio deadlines. Because `now()` advances with tokio time, a paused test
/// runtime moves both in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    anchor_wall: DateTime<Utc>,
    anchor: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::starting_at(Utc::now())
    }
}

impl Clock {
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            anchor_wall: wall,
            anchor: Instant::now(),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.anchor.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor_wall
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Absolute time `after` from now.
    pub fn fire_at(&self, after: Duration) -> DateTime<Utc> {
        let delta = TimeDelta::from_std(after).unwrap_or(TimeDelta::MAX);
        self.now()
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Time left until `at`, zero if already past.
    pub fn remaining(&self, at: DateTime<Utc>) -> Duration {
        (at - self.now()).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn deadline(&self, at: DateTime<Utc>) -> Instant {
        Instant::now() + self.remaining(at)
    }
}
