//! Sources of "now".
//!
//! Nothing else in the crate reads the system time directly; the engine,
//! the session view and the ticker all go through a [`Clock`].

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl Clock for RealClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Largest accepted test-mode speed-up.
pub const MAX_SCALE_FACTOR: f64 = 100_000.0;

/// Parameters of an accelerated time-base.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AcceleratedConfig {
    /// Simulated seconds per wall-clock second.
    pub scale_factor: f64,
    /// Simulated instant that corresponds to `wall_anchor`.
    pub epoch: DateTime<Utc>,
    /// Wall-clock instant at which the simulation started.
    pub wall_anchor: DateTime<Utc>,
}

/// Compresses a day into minutes for test-mode runs.
///
/// `now = epoch + (wall - wall_anchor) * scale_factor`
#[derive(Debug, Clone)]
pub struct AcceleratedClock {
    config: AcceleratedConfig,
}

impl AcceleratedClock {
    pub fn new(config: AcceleratedConfig) -> Self {
        let scale_factor = if config.scale_factor.is_finite() && config.scale_factor > 0.0 {
            config.scale_factor.min(MAX_SCALE_FACTOR)
        } else {
            1.0
        };
        Self {
            config: AcceleratedConfig {
                scale_factor,
                ..config
            },
        }
    }

    /// Start a simulation now, with simulated time beginning at `epoch`.
    pub fn starting_now(scale_factor: f64, epoch: DateTime<Utc>) -> Self {
        Self::new(AcceleratedConfig {
            scale_factor,
            epoch,
            wall_anchor: Utc::now(),
        })
    }

    pub fn config(&self) -> AcceleratedConfig {
        self.config
    }

    /// Map a wall-clock instant onto the simulated time-base.
    ///
    /// Saturates at the limits of `DateTime<Utc>`.
    pub fn at_wall(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let elapsed = wall.signed_duration_since(self.config.wall_anchor);
        let scaled_ms = (elapsed.num_milliseconds() as f64 * self.config.scale_factor).round() as i64;
        Duration::try_milliseconds(scaled_ms)
            .and_then(|scaled| self.config.epoch.checked_add_signed(scaled))
            .unwrap_or(if scaled_ms < 0 {
                DateTime::<Utc>::MIN_UTC
            } else {
                DateTime::<Utc>::MAX_UTC
            })
    }
}

impl Clock for AcceleratedClock {
    fn now(&self) -> DateTime<Utc> {
        self.at_wall(Utc::now())
    }
}

/// A clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut guard = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *guard = *guard + by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
