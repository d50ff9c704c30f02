//! Indicator Controller — cabinet lamps
//!
//! Steady-on between rounds, a timed flash on wins, and a blackout override
//! for the dark-rotation band. While blacked out the flash thread keeps its
//! cadence but its writes are masked.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::config::LampConfig;
use crate::hardware::LampBank;
use crate::timing::ms;
use crate::token::StopToken;

struct LampShared {
    lamps: Arc<dyn LampBank>,
    config: LampConfig,
    /// Blackout override
    dark: AtomicBool,
    /// Serializes duty writes from the round and flash threads
    write_lock: Mutex<()>,
}

impl LampShared {
    /// Write a duty unless blacked out
    fn write(&self, duty: u16) {
        let _guard = self.write_lock.lock();
        if self.dark.load(Ordering::Acquire) {
            return;
        }
        self.write_unmasked(duty);
    }

    fn write_unmasked(&self, duty: u16) {
        if let Err(e) = self.lamps.set_duty(duty) {
            log::error!("[Lamp] Duty {:#06x} failed: {}", duty, e);
        }
    }
}

struct FlashTask {
    cancel: StopToken,
    handle: JoinHandle<()>,
}

impl FlashTask {
    fn join(self) {
        if self.handle.join().is_err() {
            log::error!("[Lamp] Flash thread panicked");
        }
    }
}

/// Lamp sequencing
pub struct IndicatorController {
    shared: Arc<LampShared>,
    flash: Mutex<Option<FlashTask>>,
}

impl IndicatorController {
    pub fn new(lamps: Arc<dyn LampBank>, config: LampConfig) -> Self {
        Self {
            shared: Arc::new(LampShared {
                lamps,
                config,
                dark: AtomicBool::new(false),
                write_lock: Mutex::new(()),
            }),
            flash: Mutex::new(None),
        }
    }

    /// Steady on
    pub fn on(&self) {
        self.shared.write(self.shared.config.on_duty);
    }

    /// Flash with the configured duration and interval
    pub fn flash_default(&self) -> bool {
        let config = &self.shared.config;
        self.flash(ms(config.flash_duration_ms), ms(config.flash_interval_ms))
    }

    /// Toggle on/off every `interval` for `duration` in the background, then steady on
    ///
    /// Ignored (returns false) while an earlier flash is still running.
    pub fn flash(&self, duration: Duration, interval: Duration) -> bool {
        let mut slot = self.flash.lock();
        if let Some(task) = slot.as_ref() {
            if !task.handle.is_finished() {
                log::debug!("[Lamp] Flash already running, request ignored");
                return false;
            }
        }
        if let Some(task) = slot.take() {
            task.join();
        }

        let cancel = StopToken::new();
        let shared = Arc::clone(&self.shared);
        let token = cancel.clone();
        let spawned = thread::Builder::new()
            .name("lamp-flash".into())
            .spawn(move || flash_loop(&shared, &token, duration, interval));

        match spawned {
            Ok(handle) => {
                log::info!("[Lamp] Flash {:?} @ {:?}", duration, interval);
                *slot = Some(FlashTask { cancel, handle });
                true
            }
            Err(e) => {
                log::error!("[Lamp] Could not start flash thread: {}", e);
                false
            }
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.flash
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Force dark; masks flash writes until `restore`
    pub fn blackout(&self) {
        let _guard = self.shared.write_lock.lock();
        self.shared.dark.store(true, Ordering::Release);
        self.shared.write_unmasked(self.shared.config.off_duty);
        log::info!("[Lamp] Blackout");
    }

    /// Lift the blackout and return to steady on
    pub fn restore(&self) {
        let _guard = self.shared.write_lock.lock();
        self.shared.dark.store(false, Ordering::Release);
        self.shared.write_unmasked(self.shared.config.on_duty);
        log::info!("[Lamp] Restored");
    }

    pub fn is_dark(&self) -> bool {
        self.shared.dark.load(Ordering::Acquire)
    }

    /// Cancel any flash and leave the lamps off
    pub fn shutdown(&self) {
        if let Some(task) = self.flash.lock().take() {
            task.cancel.stop();
            task.join();
        }
        let _guard = self.shared.write_lock.lock();
        self.shared.dark.store(true, Ordering::Release);
        self.shared.write_unmasked(self.shared.config.off_duty);
        log::info!("[Lamp] Off");
    }
}

fn flash_loop(shared: &LampShared, cancel: &StopToken, duration: Duration, interval: Duration) {
    let end = Instant::now() + duration;
    let mut lit = true;
    while Instant::now() < end {
        lit = !lit;
        shared.write(if lit {
            shared.config.on_duty
        } else {
            shared.config.off_duty
        });
        if cancel.sleep(interval).is_err() {
            return;
        }
    }
    shared.write(shared.config.on_duty);
}
