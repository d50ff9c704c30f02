//! RoundContext — state shared by the round thread and the reel workers
//!
//! Each field has its own primitive so one reel's stop sequence never waits
//! on another's:
//!
//! | field          | primitive        | written by              |
//! |----------------|------------------|-------------------------|
//! | outcome        | `RwLock<f64>`    | round thread            |
//! | stop gate      | `AtomicBool`     | round thread            |
//! | first-stop     | `Mutex<bool>`    | reel workers / round    |
//! | channel        | internal `Mutex` | everyone                |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};

use rf_stage::Stage;

use crate::config::CabinetConfig;
use crate::error::{CabinetError, CabinetResult};
use crate::hardware::{Hardware, ReelId};
use crate::notify::NotificationChannel;
use crate::token::StopToken;

/// Shared round state
pub struct RoundContext {
    config: CabinetConfig,
    hardware: Hardware,
    channel: Arc<NotificationChannel>,
    token: StopToken,

    /// Outcome the reel workers settle against
    outcome: RwLock<f64>,
    /// Stop requests accepted only while reels physically rotate
    stop_gate: AtomicBool,
    /// `first_stop` already sent this (mini-)round
    first_stop_sent: Mutex<bool>,
}

impl RoundContext {
    pub fn new(
        config: CabinetConfig,
        hardware: Hardware,
        channel: Arc<NotificationChannel>,
        token: StopToken,
    ) -> Self {
        Self {
            config,
            hardware,
            channel,
            token,
            outcome: RwLock::new(0.0),
            stop_gate: AtomicBool::new(false),
            first_stop_sent: Mutex::new(false),
        }
    }

    pub fn config(&self) -> &CabinetConfig {
        &self.config
    }

    pub fn hardware(&self) -> &Hardware {
        &self.hardware
    }

    pub fn channel(&self) -> &NotificationChannel {
        &self.channel
    }

    pub fn token(&self) -> &StopToken {
        &self.token
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PUBLISHED OUTCOME
    // ═══════════════════════════════════════════════════════════════════════

    /// Publish the value reel workers settle against
    ///
    /// Refused while the stop gate is open: a worker may be mid-pass on the
    /// current value.
    pub fn publish_outcome(&self, value: f64) -> CabinetResult<()> {
        if self.stop_accepting() {
            return Err(CabinetError::OutcomeLocked);
        }
        *self.outcome.write() = value;
        log::debug!("[Round] Published outcome {}", value);
        Ok(())
    }

    pub fn published_outcome(&self) -> f64 {
        *self.outcome.read()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // STOP GATE
    // ═══════════════════════════════════════════════════════════════════════

    pub fn open_stop_gate(&self) {
        self.stop_gate.store(true, Ordering::Release);
    }

    pub fn close_stop_gate(&self) {
        self.stop_gate.store(false, Ordering::Release);
    }

    pub fn stop_accepting(&self) -> bool {
        self.stop_gate.load(Ordering::Acquire)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FIRST-STOP LATCH
    // ═══════════════════════════════════════════════════════════════════════

    pub fn reset_first_stop(&self) {
        *self.first_stop_sent.lock() = false;
    }

    /// Send `first_stop` if no reel has yet this round
    ///
    /// The latch stays held across the send, so a reel that loses the race
    /// returns only after the line is on the wire.
    pub fn notify_first_stop_once(&self, reel: ReelId) -> bool {
        let mut sent = self.first_stop_sent.lock();
        if *sent {
            return false;
        }
        *sent = true;
        self.channel.send(Stage::FirstStop, &reel.tag());
        true
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DRIVE (errors logged, never propagated)
    // ═══════════════════════════════════════════════════════════════════════

    pub fn drive(&self, reel: ReelId, throttle: f64) {
        if let Err(e) = self.hardware.drive.set_throttle(reel, throttle) {
            log::error!("[{}] Throttle {} failed: {}", reel, throttle, e);
        }
    }

    pub fn drive_all(&self, throttle: f64) {
        for reel in ReelId::ALL {
            self.drive(reel, throttle);
        }
    }
}
