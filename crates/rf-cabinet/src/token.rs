//! StopToken — cooperative cancellation for blocking waits
//!
//! Every sleep and polling loop in the controller goes through a token so a
//! shutdown request (or a flash cancel) wakes it immediately instead of
//! waiting out a 10 s celebration hold.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{CabinetError, CabinetResult};

#[derive(Default)]
struct TokenState {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Cloneable cancellation token
#[derive(Clone, Default)]
pub struct StopToken {
    state: Arc<TokenState>,
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop and wake every waiter
    pub fn stop(&self) {
        let mut stopped = self.state.stopped.lock();
        if !*stopped {
            *stopped = true;
            self.state.wake.notify_all();
        }
    }

    pub fn is_stopped(&self) -> bool {
        *self.state.stopped.lock()
    }

    /// Sleep for `duration`, returning early with `Shutdown` on stop
    pub fn sleep(&self, duration: Duration) -> CabinetResult<()> {
        let deadline = Instant::now() + duration;
        let mut stopped = self.state.stopped.lock();
        while !*stopped {
            if self
                .state
                .wake
                .wait_until(&mut stopped, deadline)
                .timed_out()
            {
                break;
            }
        }
        if *stopped {
            Err(CabinetError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Poll `ready` every `interval` until it returns true
    ///
    /// No timeout: a condition that never holds blocks until stop.
    pub fn poll_until<F>(&self, interval: Duration, mut ready: F) -> CabinetResult<()>
    where
        F: FnMut() -> bool,
    {
        loop {
            if ready() {
                return Ok(());
            }
            self.sleep(interval)?;
        }
    }
}
