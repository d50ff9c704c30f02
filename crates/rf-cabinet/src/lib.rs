//! # rf-cabinet — Three-Reel Cabinet Controller
//!
//! Drives a physical three-reel cabinet: one continuous servo, one position
//! sensor and one stop button per reel, a start lever and a lamp bank. Each
//! round draws an outcome, spins the reels, lets the player stop them and
//! reports milestones (`rf_stage::Stage`) to a presentation process over a
//! line-delimited channel.
//!
//! ## Architecture
//!
//! ```text
//! RoundCoordinator (round thread)
//!     │
//!     ├── OutcomeSource ──→ RoundPlan (path, verdict, stagger, blackout)
//!     ├── RoundContext (outcome, stop gate, first-stop latch)
//!     │       │
//!     │       └── ReelStopController ×3 (worker threads)
//!     ├── IndicatorController (lamps, flash thread)
//!     └── NotificationChannel ──→ "start" / <outcome> / "first_stop" / "lose" / "bonus"
//! ```
//!
//! Hardware sits behind the traits in [`hardware`]; [`bench`] provides a
//! simulated cabinet.

pub mod bench;
pub mod config;
pub mod context;
pub mod error;
pub mod hardware;
pub mod indicator;
pub mod notify;
pub mod outcome;
pub mod reel;
pub mod round;
pub mod teardown;
pub mod timing;
pub mod token;

pub use config::*;
pub use context::*;
pub use error::*;
pub use hardware::*;
pub use indicator::*;
pub use notify::*;
pub use outcome::*;
pub use reel::*;
pub use round::*;
pub use teardown::*;
pub use timing::*;
pub use token::*;
