//! Round outcome — drawing, band classification, round planning
//!
//! One value in [0, 1) is drawn per round. Its bands decide everything the
//! round does:
//!
//! ```text
//! 0.00 ─┬─ after-notice ─────────────┬─ 0.25 ─ freeze ─ 0.30 ─── win ─── 0.50 ─── lose ─── 1.00
//!       │  0.10─0.15 staggered start │
//!       │  0.15─0.20 blackout        │
//! ```

use std::collections::VecDeque;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CabinetError, CabinetResult};

// ═══════════════════════════════════════════════════════════════════════════
// BANDS
// ═══════════════════════════════════════════════════════════════════════════

/// Half-open range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub start: f64,
    pub end: f64,
}

impl Band {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value < self.end
    }
}

/// Classification bands for the drawn outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutcomeBands {
    /// Outcomes strictly above this lose
    pub lose_above: f64,

    /// Win outcomes strictly below this take the after-notice path
    pub after_notice_below: f64,

    /// Freeze sub-feature
    pub freeze: Band,

    /// Reels start one after another
    pub staggered: Band,

    /// Lamps dark while the reels turn
    pub blackout: Band,

    /// Value published to force an on-target (win) stop
    pub forced_win: f64,

    /// Value published to force an off-target (lose) stop
    pub forced_lose: f64,
}

impl Default for OutcomeBands {
    fn default() -> Self {
        Self {
            lose_above: 0.5,
            after_notice_below: 0.25,
            freeze: Band::new(0.25, 0.30),
            staggered: Band::new(0.10, 0.15),
            blackout: Band::new(0.15, 0.20),
            forced_win: 0.1,
            forced_lose: 0.9,
        }
    }
}

impl OutcomeBands {
    /// Reel stop for this value slips off-target
    #[inline]
    pub fn is_lose(&self, value: f64) -> bool {
        value > self.lose_above
    }

    #[inline]
    pub fn is_after_notice(&self, value: f64) -> bool {
        !self.is_lose(value) && value < self.after_notice_below
    }

    #[inline]
    pub fn is_freeze(&self, value: f64) -> bool {
        self.freeze.contains(value)
    }

    #[inline]
    pub fn is_staggered(&self, value: f64) -> bool {
        self.staggered.contains(value)
    }

    #[inline]
    pub fn is_blackout(&self, value: f64) -> bool {
        self.blackout.contains(value)
    }

    /// Build the plan for a drawn value
    pub fn plan(&self, outcome: f64) -> RoundPlan {
        let path = if self.is_freeze(outcome) {
            RoundPath::Freeze
        } else if self.is_after_notice(outcome) {
            RoundPath::AfterNotice
        } else {
            RoundPath::Plain
        };

        RoundPlan {
            outcome,
            path,
            verdict: if self.is_lose(outcome) {
                Verdict::Lose
            } else {
                Verdict::Bonus
            },
            staggered: path != RoundPath::Freeze && self.is_staggered(outcome),
            blackout: self.is_blackout(outcome),
        }
    }

    /// Check band layout is coherent
    pub fn validate(&self) -> Result<(), String> {
        let bands = [
            ("freeze", self.freeze),
            ("staggered", self.staggered),
            ("blackout", self.blackout),
        ];
        for (name, band) in bands {
            if !(0.0..=1.0).contains(&band.start)
                || !(0.0..=1.0).contains(&band.end)
                || band.start >= band.end
            {
                return Err(format!(
                    "{} band [{}, {}) is not a range inside [0, 1]",
                    name, band.start, band.end
                ));
            }
        }
        if self.freeze.end > self.lose_above {
            return Err("freeze band must resolve to a win".into());
        }
        if self.is_lose(self.forced_win) {
            return Err(format!("forced_win {} classifies as lose", self.forced_win));
        }
        if !self.is_lose(self.forced_lose) {
            return Err(format!("forced_lose {} classifies as win", self.forced_lose));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROUND PLAN
// ═══════════════════════════════════════════════════════════════════════════

/// Which sequence the round runs after the draw
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPath {
    /// Rotate, stop, announce
    Plain,
    /// Win that first announces `lose`, then replays into `bonus`
    AfterNotice,
    /// Stationary start, hold/crawl/resume, always a win
    Freeze,
}

/// Final verdict of a round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Lose,
    Bonus,
}

/// Everything the coordinator needs to know about a drawn value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoundPlan {
    pub outcome: f64,
    pub path: RoundPath,
    pub verdict: Verdict,
    /// Start reels one by one
    pub staggered: bool,
    /// Lamps dark during rotation
    pub blackout: bool,
}

// ═══════════════════════════════════════════════════════════════════════════
// OUTCOME SOURCES
// ═══════════════════════════════════════════════════════════════════════════

/// Supplies one outcome per round
pub trait OutcomeSource: Send {
    /// Next value in [0, 1)
    fn next_outcome(&mut self) -> f64;
}

/// Uniform draws from a seedable RNG
pub struct RandomOutcomes {
    rng: StdRng,
}

impl RandomOutcomes {
    /// Seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Seed RNG for reproducible sessions
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomOutcomes {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeSource for RandomOutcomes {
    fn next_outcome(&mut self) -> f64 {
        self.rng.random::<f64>()
    }
}

/// Fixed sequence of outcomes, repeated forever
#[derive(Debug, Clone)]
pub struct ScriptedOutcomes {
    pending: VecDeque<f64>,
    script: Vec<f64>,
}

impl ScriptedOutcomes {
    pub fn new(script: Vec<f64>) -> CabinetResult<Self> {
        if script.is_empty() {
            return Err(CabinetError::InvalidConfig(
                "scripted outcomes need at least one value".into(),
            ));
        }
        if let Some(bad) = script.iter().find(|v| !(0.0..1.0).contains(*v)) {
            return Err(CabinetError::InvalidConfig(format!(
                "scripted outcome {} outside [0, 1)",
                bad
            )));
        }
        Ok(Self {
            pending: script.iter().copied().collect(),
            script,
        })
    }
}

impl OutcomeSource for ScriptedOutcomes {
    fn next_outcome(&mut self) -> f64 {
        if self.pending.is_empty() {
            self.pending.extend(self.script.iter().copied());
        }
        self.pending.pop_front().unwrap_or(self.script[0])
    }
}
