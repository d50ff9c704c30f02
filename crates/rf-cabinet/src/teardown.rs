//! Teardown — leave the cabinet safe on any exit path
//!
//! Held for the life of a session; `Drop` runs on normal return, on `?`
//! propagation and on unwind.

use std::sync::Arc;
use std::thread;

use crate::context::RoundContext;
use crate::indicator::IndicatorController;
use crate::timing::ms;

/// Safe-state guard
pub struct Teardown {
    ctx: Arc<RoundContext>,
    indicator: Arc<IndicatorController>,
    done: bool,
}

impl Teardown {
    pub fn new(ctx: Arc<RoundContext>, indicator: Arc<IndicatorController>) -> Self {
        Self {
            ctx,
            indicator,
            done: false,
        }
    }

    /// Stop waits, rest the reels, detach buttons, darken lamps, close the channel
    pub fn run(&mut self) {
        if self.done {
            return;
        }
        self.done = true;
        log::info!("[Teardown] Cleaning up");

        self.ctx.token().stop();
        self.ctx.close_stop_gate();
        self.ctx.drive_all(self.ctx.config().throttle.rest);
        // Token is already stopped, so this wait cannot go through it.
        thread::sleep(ms(self.ctx.config().timing.teardown_settle_ms));

        if let Err(e) = self.ctx.hardware().buttons.disable() {
            log::error!("[Teardown] Disabling stop buttons failed: {}", e);
        }
        self.indicator.shutdown();
        self.ctx.channel().close();
        log::info!("[Teardown] Done");
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}
