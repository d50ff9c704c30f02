//! StageTrace — The sequence of stage events one round emitted
//!
//! A trace captures what the presentation process was told, in order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::StageEvent;
use crate::stage::Stage;

/// A complete trace of stage events for one round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTrace {
    /// Round number within the session (1-based)
    pub round: u64,

    /// All events in emission order
    pub events: Vec<StageEvent>,

    /// When the round started
    pub recorded_at: DateTime<Utc>,
}

impl StageTrace {
    /// Create a new empty trace
    pub fn new(round: u64) -> Self {
        Self {
            round,
            events: Vec::new(),
            recorded_at: Utc::now(),
        }
    }

    /// Add an event to the trace
    pub fn push(&mut self, event: StageEvent) {
        self.events.push(event);
    }

    /// Add an event and return self (builder pattern)
    pub fn with_event(mut self, event: StageEvent) -> Self {
        self.events.push(event);
        self
    }

    /// Stages only, in order
    pub fn stages(&self) -> Vec<Stage> {
        self.events.iter().map(|e| e.stage).collect()
    }

    /// Get total duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        match (self.events.first(), self.events.last()) {
            (Some(first), Some(last)) => last.timestamp_ms - first.timestamp_ms,
            _ => 0.0,
        }
    }

    /// Number of events of a given stage type
    pub fn count(&self, type_name: &str) -> usize {
        self.events
            .iter()
            .filter(|e| e.stage.type_name() == type_name)
            .count()
    }

    /// Index of the first event of a given stage type
    pub fn position(&self, type_name: &str) -> Option<usize> {
        self.events
            .iter()
            .position(|e| e.stage.type_name() == type_name)
    }

    /// Check if trace contains a specific stage type
    pub fn has_stage(&self, type_name: &str) -> bool {
        self.position(type_name).is_some()
    }

    /// Last classification stage (the round's final verdict)
    pub fn final_classification(&self) -> Option<Stage> {
        self.events
            .iter()
            .rev()
            .map(|e| e.stage)
            .find(Stage::is_classification)
    }

    /// Drawn outcome reported in this trace
    pub fn outcome(&self) -> Option<f64> {
        self.events.iter().find_map(|e| e.stage.outcome_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn after_notice_trace() -> StageTrace {
        StageTrace::new(7)
            .with_event(StageEvent::new(Stage::Outcome { value: 0.05 }, 0.0))
            .with_event(StageEvent::new(Stage::FirstStop, 900.0))
            .with_event(StageEvent::new(Stage::Lose, 1500.0))
            .with_event(StageEvent::new(Stage::FirstStop, 2600.0))
            .with_event(StageEvent::new(Stage::Bonus, 3100.0))
    }

    #[test]
    fn test_trace_queries() {
        let trace = after_notice_trace();
        assert_eq!(trace.round, 7);
        assert_eq!(trace.count("first_stop"), 2);
        assert_eq!(trace.position("lose"), Some(2));
        assert!(trace.has_stage("bonus"));
        assert_eq!(trace.final_classification(), Some(Stage::Bonus));
        assert_eq!(trace.outcome(), Some(0.05));
        assert_eq!(trace.duration_ms(), 3100.0);
    }

    #[test]
    fn test_empty_trace() {
        let trace = StageTrace::new(1);
        assert_eq!(trace.duration_ms(), 0.0);
        assert_eq!(trace.final_classification(), None);
        assert!(trace.stages().is_empty());
    }
}
