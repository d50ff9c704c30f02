//! Round Coordinator — lever to verdict
//!
//! Runs on the calling thread and owns the round state machine:
//!
//! ```text
//! WaitLever → Rotating ───────────────→ StoppingWait → Classifying → Announcing
//!           ↘ FreezeHold → FreezeRotating ↗
//! ```
//!
//! The outcome is published before any reel turns and before the stop gate
//! opens, and it is never rewritten while the gate is open. The only
//! rewrites are the forced wins of the freeze resume and the after-notice
//! replay, both done with the gate closed.

use std::sync::Arc;
use std::thread::JoinHandle;

use serde::{Deserialize, Serialize};

use rf_stage::{Stage, StageTrace};

use crate::context::RoundContext;
use crate::error::{CabinetError, CabinetResult};
use crate::hardware::{REEL_COUNT, ReelId, StopHandler};
use crate::indicator::IndicatorController;
use crate::outcome::{OutcomeSource, RoundPath, RoundPlan, Verdict};
use crate::reel::ReelStopController;
use crate::timing::ms;

const SOURCE: &str = "round";

/// Coordinator state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Idle,
    WaitLever,
    Rotating,
    FreezeHold,
    FreezeRotating,
    StoppingWait,
    Classifying,
    Announcing,
}

/// What one round did
#[derive(Debug, Clone)]
pub struct RoundReport {
    pub number: u64,
    pub plan: RoundPlan,
    /// Everything sent on the channel during the round
    pub trace: StageTrace,
}

impl RoundReport {
    pub fn verdict(&self) -> Verdict {
        self.plan.verdict
    }
}

/// Round state machine
pub struct RoundCoordinator {
    ctx: Arc<RoundContext>,
    indicator: Arc<IndicatorController>,
    source: Box<dyn OutcomeSource>,
    reels: [Arc<ReelStopController>; REEL_COUNT],
    stop_handler: StopHandler,
    workers: Vec<JoinHandle<()>>,
    state: RoundState,
    rounds_played: u64,
    interrupts_enabled: bool,
}

impl RoundCoordinator {
    pub fn new(
        ctx: Arc<RoundContext>,
        indicator: Arc<IndicatorController>,
        source: Box<dyn OutcomeSource>,
    ) -> Self {
        let reels =
            ReelId::ALL.map(|reel| Arc::new(ReelStopController::new(reel, Arc::clone(&ctx))));

        let handler_reels = reels.clone();
        let stop_handler: StopHandler = Arc::new(move |reel: ReelId| {
            handler_reels[reel.index()].request_stop();
        });

        Self {
            ctx,
            indicator,
            source,
            reels,
            stop_handler,
            workers: Vec::with_capacity(REEL_COUNT),
            state: RoundState::Idle,
            rounds_played: 0,
            interrupts_enabled: false,
        }
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    pub fn rounds_played(&self) -> u64 {
        self.rounds_played
    }

    pub fn reel(&self, reel: ReelId) -> &ReelStopController {
        &self.reels[reel.index()]
    }

    /// Spawn the reel workers, light the lamps and attach the stop buttons
    pub fn start(&mut self) -> CabinetResult<()> {
        if !self.workers.is_empty() {
            return Ok(());
        }
        for reel in &self.reels {
            self.workers.push(reel.spawn()?);
        }
        self.indicator.on();
        self.enable_stop_interrupts();
        log::info!("[Round] {} reel workers running", self.workers.len());
        Ok(())
    }

    /// Announce the session and play rounds until shutdown or `max_rounds`
    pub fn run(&mut self, max_rounds: Option<u64>) -> CabinetResult<()> {
        self.start()?;
        let result = self.run_session(max_rounds);
        match result {
            Err(CabinetError::Shutdown) => {
                log::info!("[Round] Shutdown after {} rounds", self.rounds_played);
                Ok(())
            }
            other => other,
        }
    }

    fn run_session(&mut self, max_rounds: Option<u64>) -> CabinetResult<()> {
        self.ctx.channel().send(Stage::Start, SOURCE);
        self.ctx.token().sleep(ms(self.ctx.config().timing.startup_hold_ms))?;

        while max_rounds.is_none_or(|max| self.rounds_played < max) {
            let report = self.play_round()?;
            log::info!(
                "[Round] #{} done: {:?} via {:?} ({} stages)",
                report.number,
                report.plan.verdict,
                report.plan.path,
                report.trace.events.len()
            );
        }
        Ok(())
    }

    /// Stop the workers and wait for them
    pub fn shutdown(&mut self) {
        self.ctx.token().stop();
        self.ctx.close_stop_gate();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("[Round] Reel worker panicked");
            }
        }
        self.state = RoundState::Idle;
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ROUND
    // ═══════════════════════════════════════════════════════════════════════

    /// Play one full round
    pub fn play_round(&mut self) -> CabinetResult<RoundReport> {
        let ctx = Arc::clone(&self.ctx);
        let config = ctx.config();
        let bands = &config.bands;

        ctx.token().sleep(ms(config.timing.round_gap_ms))?;
        self.rounds_played += 1;
        let number = self.rounds_played;

        ctx.close_stop_gate();
        self.reset_reels();
        ctx.channel().begin_trace(number);

        self.enter(RoundState::WaitLever);
        self.wait_for_lever()?;

        let outcome = self.source.next_outcome();
        let plan = bands.plan(outcome);
        log::info!(
            "[Round] #{} outcome={:.4} path={:?} verdict={:?}",
            number,
            outcome,
            plan.path,
            plan.verdict
        );

        let decoy = plan.path == RoundPath::AfterNotice && config.after_notice.decoy_first_pass;
        let first_pass = if decoy {
            bands.forced_lose
        } else {
            outcome
        };
        ctx.publish_outcome(first_pass)?;

        if plan.path == RoundPath::Freeze {
            ctx.drive_all(config.throttle.rest);
            log::info!("[Freeze] Reels held, no rotation");
        } else {
            self.rotate(plan.staggered)?;
        }

        if plan.blackout {
            self.indicator.blackout();
        }
        ctx.channel().send(Stage::Outcome { value: outcome }, SOURCE);

        if plan.path == RoundPath::Freeze {
            self.run_freeze()?;
        }

        self.await_all_stopped()?;
        ctx.close_stop_gate();
        if plan.blackout {
            self.indicator.restore();
        }
        ctx.drive_all(config.throttle.rest);

        self.enter(RoundState::Classifying);
        match plan.verdict {
            Verdict::Lose => ctx.channel().send(Stage::Lose, SOURCE),
            Verdict::Bonus => self.announce_win(&plan)?,
        }

        let trace = ctx
            .channel()
            .take_trace()
            .unwrap_or_else(|| StageTrace::new(number));
        self.enter(RoundState::Idle);

        Ok(RoundReport {
            number,
            plan,
            trace,
        })
    }

    fn wait_for_lever(&self) -> CabinetResult<()> {
        let timing = &self.ctx.config().timing;
        let lever = &self.ctx.hardware().lever;
        self.ctx.token().poll_until(ms(timing.lever_poll_ms), || {
            lever.is_engaged().unwrap_or_else(|e| {
                log::warn!("[Round] Lever read failed: {}", e);
                false
            })
        })?;
        log::info!("[Round] Lever pulled");
        self.ctx.token().sleep(ms(timing.lever_settle_ms))
    }

    /// Start all reels and open the stop gate
    fn rotate(&mut self, staggered: bool) -> CabinetResult<()> {
        self.enter(RoundState::Rotating);
        let spin = self.ctx.config().throttle.spin;

        if staggered {
            let interval = ms(self.ctx.config().timing.stagger_interval_ms);
            for (i, reel) in ReelId::ALL.into_iter().enumerate() {
                if i > 0 {
                    self.ctx.token().sleep(interval)?;
                }
                self.ctx.drive(reel, spin);
            }
            log::info!("[Round] Reels started one by one");
        } else {
            self.ctx.drive_all(spin);
            log::info!("[Round] Reels started");
        }

        self.ctx.open_stop_gate();
        Ok(())
    }

    /// Uninterruptible hold, crawl and resume from a stationary start
    fn run_freeze(&mut self) -> CabinetResult<()> {
        self.enter(RoundState::FreezeHold);
        let ctx = Arc::clone(&self.ctx);
        let config = ctx.config();
        let token = ctx.token();

        self.disable_stop_interrupts();
        for reel in &self.reels {
            reel.discard_pending();
        }

        ctx.drive_all(config.throttle.rest);
        log::info!("[Freeze] Hold");
        token.sleep(ms(config.timing.freeze_rest_ms))?;

        ctx.drive_all(config.throttle.freeze_crawl);
        log::info!("[Freeze] Crawl");
        token.sleep(ms(config.timing.freeze_crawl_ms))?;

        ctx.drive_all(config.throttle.rest);
        token.sleep(ms(config.timing.freeze_resume_rest_ms))?;

        self.enter(RoundState::FreezeRotating);
        ctx.publish_outcome(config.bands.forced_win)?;
        ctx.drive_all(config.throttle.spin);
        ctx.open_stop_gate();
        self.enable_stop_interrupts();
        log::info!("[Freeze] Resumed");
        Ok(())
    }

    fn await_all_stopped(&mut self) -> CabinetResult<()> {
        self.enter(RoundState::StoppingWait);
        let poll = ms(self.ctx.config().timing.stop_poll_ms);
        let reels = &self.reels;
        self.ctx
            .token()
            .poll_until(poll, || reels.iter().all(|reel| reel.is_stopped()))
    }

    /// Bonus announcement, preceded by the lose-then-replay for after-notice wins
    fn announce_win(&mut self, plan: &RoundPlan) -> CabinetResult<()> {
        self.enter(RoundState::Announcing);
        let ctx = Arc::clone(&self.ctx);
        let config = ctx.config();

        if plan.path == RoundPath::AfterNotice {
            log::info!("[Round] After-notice: lose first, then replay");
            ctx.channel().send(Stage::Lose, SOURCE);
            ctx.token().sleep(ms(config.timing.after_notice_pause_ms))?;

            self.reset_reels();
            ctx.publish_outcome(config.bands.forced_win)?;
            self.rotate(false)?;
            self.await_all_stopped()?;
            ctx.close_stop_gate();
            ctx.drive_all(config.throttle.rest);
            self.enter(RoundState::Announcing);
        }

        self.indicator.flash_default();
        ctx.channel().send(Stage::Bonus, SOURCE);
        ctx.token().sleep(ms(config.timing.celebration_ms))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn reset_reels(&self) {
        self.ctx.reset_first_stop();
        for reel in &self.reels {
            reel.reset_for_new_round();
        }
    }

    fn enable_stop_interrupts(&mut self) {
        if self.interrupts_enabled {
            return;
        }
        match self
            .ctx
            .hardware()
            .buttons
            .enable(Arc::clone(&self.stop_handler))
        {
            Ok(()) => self.interrupts_enabled = true,
            Err(e) => log::error!("[Round] Enabling stop buttons failed: {}", e),
        }
    }

    fn disable_stop_interrupts(&mut self) {
        if !self.interrupts_enabled {
            return;
        }
        if let Err(e) = self.ctx.hardware().buttons.disable() {
            log::error!("[Round] Disabling stop buttons failed: {}", e);
        }
        self.interrupts_enabled = false;
    }

    fn enter(&mut self, state: RoundState) {
        if self.state != state {
            log::debug!("[Round] {:?} → {:?}", self.state, state);
            self.state = state;
        }
    }
}

impl Drop for RoundCoordinator {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.shutdown();
        }
    }
}
