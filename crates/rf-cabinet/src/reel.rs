//! Reel Stop Controller — one worker thread per reel
//!
//! The button handler only raises `pending_stop`; the worker does the
//! blocking part. On a lose outcome the reel runs past the marker for an
//! extra settle (the long slip); on a win it halts on the marker.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::context::RoundContext;
use crate::error::CabinetResult;
use crate::hardware::ReelId;
use crate::timing::ms;

/// How often an idle worker rechecks for shutdown
const SHUTDOWN_POLL: Duration = Duration::from_millis(50);

/// Per-reel round state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReelState {
    /// Stop requested, not yet picked up by the worker
    pub pending_stop: bool,
    /// Reel halted this round
    pub stopped: bool,
}

/// Stop engine for a single reel
pub struct ReelStopController {
    reel: ReelId,
    ctx: Arc<RoundContext>,
    state: Mutex<ReelState>,
    wake: Condvar,
    /// Completed physical stop passes (process lifetime)
    passes: AtomicU64,
    /// Passes that slipped past the marker on a lose outcome
    slips: AtomicU64,
}

impl ReelStopController {
    pub fn new(reel: ReelId, ctx: Arc<RoundContext>) -> Self {
        Self {
            reel,
            ctx,
            state: Mutex::new(ReelState::default()),
            wake: Condvar::new(),
            passes: AtomicU64::new(0),
            slips: AtomicU64::new(0),
        }
    }

    pub fn reel(&self) -> ReelId {
        self.reel
    }

    /// Ask the reel to stop. Never blocks beyond the state lock.
    ///
    /// Returns false when the stop gate is closed or the reel already stopped
    /// this round. The gate is read under the state lock, so a request racing
    /// `close_stop_gate` + `reset_for_new_round` is either cleared by the
    /// reset or refused here.
    pub fn request_stop(&self) -> bool {
        let mut state = self.state.lock();
        if state.stopped || !self.ctx.stop_accepting() {
            return false;
        }
        state.pending_stop = true;
        self.wake.notify_one();
        true
    }

    /// Drop a request the worker has not picked up yet
    pub fn discard_pending(&self) {
        self.state.lock().pending_stop = false;
    }

    /// Clear both flags for the next round
    ///
    /// Caller must have seen `is_stopped()` (or never started this reel), so
    /// no stop pass is in flight.
    pub fn reset_for_new_round(&self) {
        *self.state.lock() = ReelState::default();
    }

    pub fn is_stopped(&self) -> bool {
        self.state.lock().stopped
    }

    pub fn state(&self) -> ReelState {
        *self.state.lock()
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn slips(&self) -> u64 {
        self.slips.load(Ordering::Relaxed)
    }

    /// Start the worker thread
    pub fn spawn(self: &Arc<Self>) -> io::Result<thread::JoinHandle<()>> {
        let controller = Arc::clone(self);
        thread::Builder::new()
            .name(self.reel.tag())
            .spawn(move || controller.run())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // WORKER
    // ═══════════════════════════════════════════════════════════════════════

    fn run(&self) {
        log::debug!("[{}] Worker started", self.reel);
        while self.wait_for_request() {
            if let Err(e) = self.stop_pass() {
                log::debug!("[{}] Stop pass aborted: {}", self.reel, e);
                break;
            }
        }
        log::debug!("[{}] Worker exited", self.reel);
    }

    /// Block until a request for a still-moving reel arrives. False on shutdown.
    fn wait_for_request(&self) -> bool {
        let mut state = self.state.lock();
        loop {
            if self.ctx.token().is_stopped() {
                return false;
            }
            if state.pending_stop {
                state.pending_stop = false;
                if !state.stopped && self.ctx.stop_accepting() {
                    return true;
                }
                log::debug!("[{}] Stale stop request dropped", self.reel);
                continue;
            }
            self.wake.wait_for(&mut state, SHUTDOWN_POLL);
        }
    }

    fn stop_pass(&self) -> CabinetResult<()> {
        let config = self.ctx.config();
        self.await_marker()?;

        // Read at the marker: the value is fixed once the gate is open.
        let outcome = self.ctx.published_outcome();
        if config.bands.is_lose(outcome) {
            log::info!("[{}] STOP (outcome={}): miss, slipping past marker", self.reel, outcome);
            self.ctx.token().sleep(ms(config.timing.lose_slip_ms))?;
            self.slips.fetch_add(1, Ordering::Relaxed);
        } else {
            log::info!("[{}] STOP (outcome={}): hit, stopping on marker", self.reel, outcome);
        }

        self.ctx.drive(self.reel, config.throttle.rest);
        self.passes.fetch_add(1, Ordering::Relaxed);

        // first_stop goes out before `stopped` is visible, so the round
        // thread cannot classify ahead of it.
        self.ctx.notify_first_stop_once(self.reel);
        self.state.lock().stopped = true;

        self.ctx.hardware().cue.play_stop(self.reel);
        log::info!("[{}] Motor stopped", self.reel);
        Ok(())
    }

    /// Poll the position sensor. No timeout: a dead sensor stalls this reel.
    fn await_marker(&self) -> CabinetResult<()> {
        let sensors = &self.ctx.hardware().sensors;
        let poll = ms(self.ctx.config().timing.sensor_poll_ms);
        self.ctx
            .token()
            .poll_until(poll, || sensors.position_reached(self.reel))?;
        log::debug!("[{}] Marker reached", self.reel);
        Ok(())
    }
}
