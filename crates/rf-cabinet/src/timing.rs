//! Timing profiles for staged round effects

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Timing profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimingProfile {
    /// Cabinet floor timing
    Normal,
    /// No staged waits (bench tests)
    Instant,
    /// Custom timing multiplier
    Custom,
}

impl Default for TimingProfile {
    fn default() -> Self {
        Self::Normal
    }
}

/// Detailed timing configuration (all values in milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Profile type
    pub profile: TimingProfile,

    // ═══ POLLING ═══
    /// Lever input poll interval
    pub lever_poll_ms: f64,

    /// All-reels-stopped poll interval
    pub stop_poll_ms: f64,

    /// Position sensor poll interval inside a reel worker
    pub sensor_poll_ms: f64,

    // ═══ ROUND FLOW ═══
    /// Hold after `start` before the first round
    pub startup_hold_ms: f64,

    /// Pause between rounds
    pub round_gap_ms: f64,

    /// Settle delay after the lever engages
    pub lever_settle_ms: f64,

    /// Delay between reel starts on a staggered round
    pub stagger_interval_ms: f64,

    /// Extra travel after the sensor on a losing stop (the longer slip)
    pub lose_slip_ms: f64,

    /// Pause between the misleading `lose` and the replay
    pub after_notice_pause_ms: f64,

    /// Celebration hold after `bonus`
    pub celebration_ms: f64,

    // ═══ FREEZE ═══
    /// Rest hold before the crawl
    pub freeze_rest_ms: f64,

    /// Crawl duration
    pub freeze_crawl_ms: f64,

    /// Rest hold before rotation resumes
    pub freeze_resume_rest_ms: f64,

    // ═══ TEARDOWN ═══
    /// Time given to the drive to apply the rest throttle on shutdown
    pub teardown_settle_ms: f64,
}

impl TimingConfig {
    /// Cabinet floor timing
    pub fn normal() -> Self {
        Self {
            profile: TimingProfile::Normal,
            lever_poll_ms: 10.0,
            stop_poll_ms: 5.0,
            sensor_poll_ms: 1.0,
            startup_hold_ms: 3000.0,
            round_gap_ms: 500.0,
            lever_settle_ms: 300.0,
            stagger_interval_ms: 500.0,
            lose_slip_ms: 200.0,
            after_notice_pause_ms: 500.0,
            celebration_ms: 10_000.0,
            freeze_rest_ms: 2000.0,
            freeze_crawl_ms: 8000.0,
            freeze_resume_rest_ms: 1000.0,
            teardown_settle_ms: 100.0,
        }
    }

    /// Bench timing: staged waits collapse to zero, polling stays tight
    pub fn instant() -> Self {
        Self {
            profile: TimingProfile::Instant,
            lever_poll_ms: 1.0,
            stop_poll_ms: 1.0,
            sensor_poll_ms: 0.2,
            ..Self::normal().scaled(0.0)
        }
    }

    /// Scale staged waits by factor (< 1.0 = faster). Poll intervals are kept.
    pub fn scaled(&self, factor: f64) -> Self {
        let factor = factor.max(0.0);
        Self {
            profile: TimingProfile::Custom,
            lever_poll_ms: self.lever_poll_ms,
            stop_poll_ms: self.stop_poll_ms,
            sensor_poll_ms: self.sensor_poll_ms,
            startup_hold_ms: self.startup_hold_ms * factor,
            round_gap_ms: self.round_gap_ms * factor,
            lever_settle_ms: self.lever_settle_ms * factor,
            stagger_interval_ms: self.stagger_interval_ms * factor,
            lose_slip_ms: self.lose_slip_ms * factor,
            after_notice_pause_ms: self.after_notice_pause_ms * factor,
            celebration_ms: self.celebration_ms * factor,
            freeze_rest_ms: self.freeze_rest_ms * factor,
            freeze_crawl_ms: self.freeze_crawl_ms * factor,
            freeze_resume_rest_ms: self.freeze_resume_rest_ms * factor,
            teardown_settle_ms: self.teardown_settle_ms * factor,
        }
    }

    /// Total staged freeze duration (rest + crawl + rest)
    pub fn freeze_total_ms(&self) -> f64 {
        self.freeze_rest_ms + self.freeze_crawl_ms + self.freeze_resume_rest_ms
    }

    /// Check all values are finite and non-negative, poll intervals positive
    pub fn validate(&self) -> Result<(), String> {
        let polls = [
            ("lever_poll_ms", self.lever_poll_ms),
            ("stop_poll_ms", self.stop_poll_ms),
            ("sensor_poll_ms", self.sensor_poll_ms),
        ];
        for (name, value) in polls {
            if !value.is_finite() || value <= 0.0 {
                return Err(format!("{} must be > 0 (got {})", name, value));
            }
        }
        let waits = [
            self.startup_hold_ms,
            self.round_gap_ms,
            self.lever_settle_ms,
            self.stagger_interval_ms,
            self.lose_slip_ms,
            self.after_notice_pause_ms,
            self.celebration_ms,
            self.freeze_rest_ms,
            self.freeze_crawl_ms,
            self.freeze_resume_rest_ms,
            self.teardown_settle_ms,
        ];
        if waits.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err("staged waits must be finite and >= 0".into());
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self::normal()
    }
}

/// Convert a millisecond config value to a `Duration`
#[inline]
pub fn ms(value: f64) -> Duration {
    Duration::from_secs_f64(value.max(0.0) / 1000.0)
}
