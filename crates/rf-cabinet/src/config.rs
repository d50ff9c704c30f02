//! Cabinet configuration

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CabinetError, CabinetResult};
use crate::outcome::OutcomeBands;
use crate::timing::TimingConfig;

/// Drive throttle set points
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Value at which the servo holds still (calibrated per cabinet)
    pub rest: f64,
    /// Normal spin speed
    pub spin: f64,
    /// Slow freeze crawl
    pub freeze_crawl: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            rest: 0.3,
            spin: 0.8,
            freeze_crawl: 0.08,
        }
    }
}

impl ThrottleConfig {
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("rest", self.rest),
            ("spin", self.spin),
            ("freeze_crawl", self.freeze_crawl),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(format!("throttle.{} {} outside [-1, 1]", name, value));
            }
        }
        if self.spin == self.rest || self.freeze_crawl == self.rest || self.spin == self.freeze_crawl
        {
            return Err("rest, spin and freeze_crawl throttles must differ".into());
        }
        Ok(())
    }
}

/// Lamp duty and flash settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct LampConfig {
    /// Duty cycle for lit
    pub on_duty: u16,
    /// Duty cycle for dark
    pub off_duty: u16,
    /// Flash length (ms)
    pub flash_duration_ms: f64,
    /// Flash toggle interval (ms)
    pub flash_interval_ms: f64,
}

impl Default for LampConfig {
    fn default() -> Self {
        Self {
            on_duty: 0xFFFF,
            off_duty: 0x0000,
            flash_duration_ms: 3000.0,
            flash_interval_ms: 80.0,
        }
    }
}

/// Outbound notification channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Named pipe the presentation process reads
    pub fifo_path: PathBuf,
    /// Poll interval while waiting for the reader to attach (ms)
    pub attach_poll_ms: f64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            fifo_path: PathBuf::from("/tmp/notify_pipe"),
            attach_poll_ms: 100.0,
        }
    }
}

/// After-notice behavior
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AfterNoticeConfig {
    /// Publish the forced lose value for the first pass so reels visibly miss
    pub decoy_first_pass: bool,
}

/// Complete cabinet configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CabinetConfig {
    pub throttle: ThrottleConfig,
    pub timing: TimingConfig,
    pub bands: OutcomeBands,
    pub lamps: LampConfig,
    pub notify: NotifyConfig,
    pub after_notice: AfterNoticeConfig,
}

impl CabinetConfig {
    /// Bench config: instant timing, everything else default
    pub fn bench() -> Self {
        Self {
            timing: TimingConfig::instant(),
            lamps: LampConfig {
                flash_duration_ms: 5.0,
                flash_interval_ms: 1.0,
                ..LampConfig::default()
            },
            ..Self::default()
        }
    }

    /// Load from a JSON file
    pub fn load(path: impl AsRef<Path>) -> CabinetResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("[Config] Loaded {}", path.display());
        Ok(config)
    }

    /// Parse and validate JSON
    pub fn from_json(json: &str) -> CabinetResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Export config as JSON
    pub fn to_json(&self) -> CabinetResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> CabinetResult<()> {
        self.throttle
            .validate()
            .and_then(|_| self.timing.validate())
            .and_then(|_| self.bands.validate())
            .and_then(|_| {
                if self.lamps.flash_interval_ms <= 0.0 {
                    Err("lamps.flash_interval_ms must be > 0".to_string())
                } else {
                    Ok(())
                }
            })
            .map_err(CabinetError::InvalidConfig)
    }
}
