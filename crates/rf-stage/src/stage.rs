//! Stage — The core enum defining all round milestones
//!
//! A Stage is NOT a motor command, NOT a sensor reading.
//! A Stage is the SEMANTIC MEANING of a moment in the round flow.

use serde::{Deserialize, Serialize};

/// Canonical round stage, as seen by the presentation process
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    // ═══════════════════════════════════════════════════════════════════════
    // SESSION
    // ═══════════════════════════════════════════════════════════════════════
    /// Channel established, controller ready
    Start,

    // ═══════════════════════════════════════════════════════════════════════
    // ROUND LIFECYCLE
    // ═══════════════════════════════════════════════════════════════════════
    /// Outcome drawn for this round
    Outcome {
        /// Drawn value in [0, 1)
        value: f64,
    },

    /// First reel of the (mini-)round came to rest
    FirstStop,

    // ═══════════════════════════════════════════════════════════════════════
    // CLASSIFICATION
    // ═══════════════════════════════════════════════════════════════════════
    /// Round lost, or the misleading first notice of an after-notice win
    Lose,

    /// Win confirmed
    Bonus,
}

impl Stage {
    /// Get category for this stage
    pub fn category(&self) -> StageCategory {
        match self {
            Stage::Start => StageCategory::Session,
            Stage::Outcome { .. } | Stage::FirstStop => StageCategory::RoundLifecycle,
            Stage::Lose | Stage::Bonus => StageCategory::Classification,
        }
    }

    /// Get the type name as a static string
    pub fn type_name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::Outcome { .. } => "outcome",
            Stage::FirstStop => "first_stop",
            Stage::Lose => "lose",
            Stage::Bonus => "bonus",
        }
    }

    /// Is this a classification announcement (lose/bonus)?
    pub fn is_classification(&self) -> bool {
        self.category() == StageCategory::Classification
    }

    /// Drawn outcome value, if this is an outcome stage
    pub fn outcome_value(&self) -> Option<f64> {
        match self {
            Stage::Outcome { value } => Some(*value),
            _ => None,
        }
    }
}

/// Stage category for grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageCategory {
    Session,
    RoundLifecycle,
    Classification,
}

impl StageCategory {
    pub fn display_name(&self) -> &'static str {
        match self {
            StageCategory::Session => "Session",
            StageCategory::RoundLifecycle => "Round Lifecycle",
            StageCategory::Classification => "Classification",
        }
    }
}
