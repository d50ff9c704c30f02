//! StageEvent — A stage occurrence with metadata
//!
//! Wraps a Stage with timing and source information.

use serde::{Deserialize, Serialize};

use crate::stage::Stage;

/// A stage event with full metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageEvent {
    /// The canonical stage
    pub stage: Stage,

    /// Milliseconds since the start of the round (or session for `Start`)
    pub timestamp_ms: f64,

    /// Producer that emitted the stage (`round`, `reel1`..`reel3`)
    #[serde(default)]
    pub source: Option<String>,
}

impl StageEvent {
    /// Create a new stage event
    pub fn new(stage: Stage, timestamp_ms: f64) -> Self {
        Self {
            stage,
            timestamp_ms,
            source: None,
        }
    }

    /// Add source info
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get stage type name
    pub fn type_name(&self) -> &'static str {
        self.stage.type_name()
    }
}
