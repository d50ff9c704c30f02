//! Bench cabinet — simulated collaborators for tests and the demo daemon
//!
//! The position sensor pulses every `pulse_period` polls, but only while its
//! reel's throttle differs from rest, so a stopped reel never reaches a marker.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use rand::Rng;

use crate::config::CabinetConfig;
use crate::error::HardwareError;
use crate::hardware::{
    CuePlayer, Hardware, LampBank, Lever, PositionSensor, REEL_COUNT, ReelDrive, ReelId,
    StopButtonBank, StopHandler,
};
use crate::token::StopToken;

/// Sensor polls between marker pulses
pub const DEFAULT_PULSE_PERIOD: u32 = 8;

/// Drive commands kept for inspection
pub const DEFAULT_DRIVE_HISTORY: usize = 4096;

/// Lamp duty writes kept for inspection
pub const DEFAULT_LAMP_HISTORY: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════
// DRIVE
// ═══════════════════════════════════════════════════════════════════════════

/// One recorded throttle command
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    pub reel: ReelId,
    pub throttle: f64,
}

/// Records the most recent throttle commands in order
pub struct BenchDrive {
    commands: Mutex<VecDeque<DriveCommand>>,
    history: usize,
    current: Mutex<[f64; REEL_COUNT]>,
}

impl BenchDrive {
    pub fn new(rest: f64) -> Self {
        Self::with_history(rest, DEFAULT_DRIVE_HISTORY)
    }

    /// Keep at most `history` commands; older ones are dropped first
    pub fn with_history(rest: f64, history: usize) -> Self {
        Self {
            commands: Mutex::new(VecDeque::new()),
            history: history.max(1),
            current: Mutex::new([rest; REEL_COUNT]),
        }
    }

    pub fn commands(&self) -> Vec<DriveCommand> {
        self.commands.lock().iter().copied().collect()
    }

    pub fn commands_for(&self, reel: ReelId) -> Vec<f64> {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.reel == reel)
            .map(|c| c.throttle)
            .collect()
    }

    pub fn throttle(&self, reel: ReelId) -> f64 {
        self.current.lock()[reel.index()]
    }
}

impl ReelDrive for BenchDrive {
    fn set_throttle(&self, reel: ReelId, throttle: f64) -> Result<(), HardwareError> {
        self.current.lock()[reel.index()] = throttle;
        let mut commands = self.commands.lock();
        if commands.len() == self.history {
            commands.pop_front();
        }
        commands.push_back(DriveCommand { reel, throttle });
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SENSORS
// ═══════════════════════════════════════════════════════════════════════════

/// Marker sensors tied to the bench drive
pub struct BenchSensors {
    drive: Arc<BenchDrive>,
    rest: f64,
    pulse_period: u32,
    polls: [AtomicU32; REEL_COUNT],
    jammed: [AtomicBool; REEL_COUNT],
}

impl BenchSensors {
    pub fn new(drive: Arc<BenchDrive>, rest: f64, pulse_period: u32) -> Self {
        Self {
            drive,
            rest,
            pulse_period: pulse_period.max(1),
            polls: Default::default(),
            jammed: Default::default(),
        }
    }

    /// Sensor never reports the marker again
    pub fn jam(&self, reel: ReelId) {
        self.jammed[reel.index()].store(true, Ordering::Release);
    }
}

impl PositionSensor for BenchSensors {
    fn position_reached(&self, reel: ReelId) -> bool {
        if self.jammed[reel.index()].load(Ordering::Acquire) {
            return false;
        }
        if self.drive.throttle(reel) == self.rest {
            return false;
        }
        let polls = self.polls[reel.index()].fetch_add(1, Ordering::Relaxed) + 1;
        polls % self.pulse_period == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BUTTONS
// ═══════════════════════════════════════════════════════════════════════════

/// Stop buttons pressed from code
#[derive(Default)]
pub struct BenchButtons {
    handler: Mutex<Option<StopHandler>>,
    enables: AtomicU32,
    disables: AtomicU32,
}

impl BenchButtons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an edge. False when edge detection is detached.
    pub fn press(&self, reel: ReelId) -> bool {
        let handler = self.handler.lock().clone();
        match handler {
            Some(handler) => {
                handler(reel);
                true
            }
            None => false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.handler.lock().is_some()
    }

    pub fn enable_count(&self) -> u32 {
        self.enables.load(Ordering::Relaxed)
    }

    pub fn disable_count(&self) -> u32 {
        self.disables.load(Ordering::Relaxed)
    }

    /// Press a random reel every `min..=max` until `token` stops
    pub fn spawn_presser(
        self: &Arc<Self>,
        token: StopToken,
        min: Duration,
        max: Duration,
    ) -> io::Result<JoinHandle<()>> {
        let buttons = Arc::clone(self);
        thread::Builder::new()
            .name("bench-presser".into())
            .spawn(move || {
                let mut rng = rand::rng();
                loop {
                    let delay = if max > min {
                        rng.random_range(min..=max)
                    } else {
                        min
                    };
                    if token.sleep(delay).is_err() {
                        break;
                    }
                    let index = rng.random_range(0..REEL_COUNT);
                    if let Some(reel) = ReelId::new(index) {
                        buttons.press(reel);
                    }
                }
            })
    }
}

impl StopButtonBank for BenchButtons {
    fn enable(&self, handler: StopHandler) -> Result<(), HardwareError> {
        *self.handler.lock() = Some(handler);
        self.enables.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn disable(&self) -> Result<(), HardwareError> {
        *self.handler.lock() = None;
        self.disables.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// LEVER / LAMPS / CUE
// ═══════════════════════════════════════════════════════════════════════════

/// Lever, pulled by default
pub struct BenchLever {
    engaged: AtomicBool,
    failing: AtomicBool,
}

impl BenchLever {
    pub fn new(engaged: bool) -> Self {
        Self {
            engaged: AtomicBool::new(engaged),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_engaged(&self, engaged: bool) {
        self.engaged.store(engaged, Ordering::Release);
    }

    /// Make every read fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl Lever for BenchLever {
    fn is_engaged(&self) -> Result<bool, HardwareError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(HardwareError::Lever("bench lever unreadable".into()));
        }
        Ok(self.engaged.load(Ordering::Acquire))
    }
}

/// Records the most recent successful duty writes
#[derive(Default)]
pub struct BenchLamps {
    writes: Mutex<VecDeque<u16>>,
    failing: AtomicBool,
}

impl BenchLamps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<u16> {
        self.writes.lock().iter().copied().collect()
    }

    pub fn last_duty(&self) -> Option<u16> {
        self.writes.lock().back().copied()
    }

    /// Make every write fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }
}

impl LampBank for BenchLamps {
    fn set_duty(&self, duty: u16) -> Result<(), HardwareError> {
        if self.failing.load(Ordering::Acquire) {
            return Err(HardwareError::Lamp {
                channel: 0,
                message: "bench lamp offline".into(),
            });
        }
        let mut writes = self.writes.lock();
        if writes.len() == DEFAULT_LAMP_HISTORY {
            writes.pop_front();
        }
        writes.push_back(duty);
        Ok(())
    }
}

/// Counts stop cues per reel
#[derive(Default)]
pub struct BenchCue {
    plays: [AtomicU64; REEL_COUNT],
}

impl BenchCue {
    pub fn plays(&self, reel: ReelId) -> u64 {
        self.plays[reel.index()].load(Ordering::Relaxed)
    }
}

impl CuePlayer for BenchCue {
    fn play_stop(&self, reel: ReelId) {
        self.plays[reel.index()].fetch_add(1, Ordering::Relaxed);
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CABINET
// ═══════════════════════════════════════════════════════════════════════════

/// Full simulated cabinet; keeps typed handles for inspection
#[derive(Clone)]
pub struct BenchCabinet {
    pub drive: Arc<BenchDrive>,
    pub sensors: Arc<BenchSensors>,
    pub buttons: Arc<BenchButtons>,
    pub lever: Arc<BenchLever>,
    pub lamps: Arc<BenchLamps>,
    pub cue: Arc<BenchCue>,
}

impl BenchCabinet {
    pub fn new(config: &CabinetConfig) -> Self {
        Self::with_pulse_period(config, DEFAULT_PULSE_PERIOD)
    }

    pub fn with_pulse_period(config: &CabinetConfig, pulse_period: u32) -> Self {
        let rest = config.throttle.rest;
        let drive = Arc::new(BenchDrive::new(rest));
        Self {
            sensors: Arc::new(BenchSensors::new(Arc::clone(&drive), rest, pulse_period)),
            drive,
            buttons: Arc::new(BenchButtons::new()),
            lever: Arc::new(BenchLever::new(true)),
            lamps: Arc::new(BenchLamps::new()),
            cue: Arc::new(BenchCue::default()),
        }
    }

    pub fn hardware(&self) -> Hardware {
        Hardware {
            drive: self.drive.clone(),
            sensors: self.sensors.clone(),
            buttons: self.buttons.clone(),
            lever: self.lever.clone(),
            lamps: self.lamps.clone(),
            cue: self.cue.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// MEMORY SINK
// ═══════════════════════════════════════════════════════════════════════════

/// Shared in-memory writer for capturing the notification stream
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_owned).collect()
    }
}

impl Write for MemorySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
