//! Hardware seams — the collaborators the controller drives
//!
//! GPIO setup, PWM chip access and debouncing live behind these traits.
//! The controller only sees throttles, position pulses, stop-button edges,
//! the lever level, lamp duty and a stop cue.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::HardwareError;

/// Number of reels on the cabinet
pub const REEL_COUNT: usize = 3;

/// Reel identifier (0-indexed internally, 1-indexed in logs)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReelId(u8);

impl ReelId {
    pub const ALL: [ReelId; REEL_COUNT] = [ReelId(0), ReelId(1), ReelId(2)];

    /// Reel by index, `None` past the last reel
    pub fn new(index: usize) -> Option<Self> {
        (index < REEL_COUNT).then_some(ReelId(index as u8))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Log/source tag (`reel1`..`reel3`)
    pub fn tag(self) -> String {
        format!("reel{}", self.0 + 1)
    }
}

impl fmt::Display for ReelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reel{}", self.0 + 1)
    }
}

/// Per-reel continuous servo
pub trait ReelDrive: Send + Sync {
    /// Command a throttle in roughly [-1, 1]
    fn set_throttle(&self, reel: ReelId, throttle: f64) -> Result<(), HardwareError>;
}

/// Per-reel position marker sensor (polled)
pub trait PositionSensor: Send + Sync {
    /// True while the marker is passing
    fn position_reached(&self, reel: ReelId) -> bool;
}

/// Debounced stop-button edge handler. Must not block.
pub type StopHandler = Arc<dyn Fn(ReelId) + Send + Sync>;

/// Stop-button interrupt bank
pub trait StopButtonBank: Send + Sync {
    /// Attach edge detection on all buttons, replacing any previous handler
    fn enable(&self, handler: StopHandler) -> Result<(), HardwareError>;
    /// Detach edge detection on all buttons; presses are dropped
    fn disable(&self) -> Result<(), HardwareError>;
}

/// Start lever
pub trait Lever: Send + Sync {
    fn is_engaged(&self) -> Result<bool, HardwareError>;
}

/// Lamp channels driven together
pub trait LampBank: Send + Sync {
    fn set_duty(&self, duty: u16) -> Result<(), HardwareError>;
}

/// Stop sound effect
pub trait CuePlayer: Send + Sync {
    fn play_stop(&self, reel: ReelId);
}

/// All collaborators of one cabinet
#[derive(Clone)]
pub struct Hardware {
    pub drive: Arc<dyn ReelDrive>,
    pub sensors: Arc<dyn PositionSensor>,
    pub buttons: Arc<dyn StopButtonBank>,
    pub lever: Arc<dyn Lever>,
    pub lamps: Arc<dyn LampBank>,
    pub cue: Arc<dyn CuePlayer>,
}
