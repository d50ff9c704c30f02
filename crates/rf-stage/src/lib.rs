//! # rf-stage — ReelForge Cabinet Round Stages
//!
//! Defines the milestones a cabinet round reports to the presentation process.
//! The presentation side never sees motor or sensor events — only STAGES.
//!
//! ## Philosophy
//!
//! Every round, regardless of which sub-feature it runs, passes through the
//! same small set of milestones:
//! - Outcome drawn → First reel stopped → Lose / Bonus announced
//!
//! This crate defines those stages, their one-line wire form, and a trace
//! type for recording what a round actually emitted.

pub mod stage;
pub mod event;
pub mod trace;
pub mod wire;

pub use stage::*;
pub use event::*;
pub use trace::*;
pub use wire::*;
