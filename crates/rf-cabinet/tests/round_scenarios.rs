//! Round scenarios on the bench cabinet
//!
//! Full rounds with instant timing and an auto-presser hammering the stop
//! buttons, checked through the notification stream, the drive command log
//! and the lamp log.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use rf_cabinet::bench::{BenchCabinet, MemorySink};
use rf_cabinet::{
    CabinetConfig, IndicatorController, NotificationChannel, OutcomeSource, RandomOutcomes,
    ReelId, RoundContext, RoundCoordinator, RoundPath, RoundReport, ScriptedOutcomes, StopToken,
    Teardown, Verdict,
};
use rf_stage::Stage;

// ═══════════════════════════════════════════════════════════════════════════════
// RIG
// ═══════════════════════════════════════════════════════════════════════════════

struct Rig {
    config: CabinetConfig,
    bench: BenchCabinet,
    sink: MemorySink,
    ctx: Arc<RoundContext>,
    coordinator: RoundCoordinator,
    presser: Option<(StopToken, JoinHandle<()>)>,
}

impl Rig {
    fn new(config: CabinetConfig, source: Box<dyn OutcomeSource>) -> Self {
        let bench = BenchCabinet::new(&config);
        let sink = MemorySink::new();
        let channel = Arc::new(NotificationChannel::from_writer(sink.clone()));
        let ctx = Arc::new(RoundContext::new(
            config.clone(),
            bench.hardware(),
            channel,
            StopToken::new(),
        ));
        let indicator = Arc::new(IndicatorController::new(bench.lamps.clone(), config.lamps));
        let coordinator = RoundCoordinator::new(Arc::clone(&ctx), indicator, source);
        Self {
            config,
            bench,
            sink,
            ctx,
            coordinator,
            presser: None,
        }
    }

    fn scripted(config: CabinetConfig, script: &[f64]) -> Self {
        let source = ScriptedOutcomes::new(script.to_vec()).unwrap();
        Self::new(config, Box::new(source))
    }

    fn start_pressing(&mut self) {
        let token = StopToken::new();
        let handle = self
            .bench
            .buttons
            .spawn_presser(token.clone(), Duration::from_millis(1), Duration::from_millis(2))
            .unwrap();
        self.presser = Some((token, handle));
    }

    fn play(&mut self, rounds: usize) -> Vec<RoundReport> {
        self.coordinator.start().unwrap();
        if self.presser.is_none() {
            self.start_pressing();
        }
        (0..rounds)
            .map(|_| self.coordinator.play_round().unwrap())
            .collect()
    }

    fn lines(&self) -> Vec<String> {
        self.sink.lines()
    }
}

impl Drop for Rig {
    fn drop(&mut self) {
        if let Some((token, handle)) = self.presser.take() {
            token.stop();
            let _ = handle.join();
        }
        self.coordinator.shutdown();
    }
}

fn position(lines: &[String], needle: &str) -> Option<usize> {
    lines.iter().position(|l| l == needle)
}

fn count(lines: &[String], needle: &str) -> usize {
    lines.iter().filter(|l| *l == needle).count()
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_plain_win_at_042() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.42]);
    let report = rig.play(1).remove(0);
    let lines = rig.lines();

    assert_eq!(report.plan.path, RoundPath::Plain);
    assert_eq!(report.verdict(), Verdict::Bonus);
    assert_eq!(lines, vec!["0.42", "first_stop", "bonus"]);
}

#[test]
fn test_lose_above_half_is_exactly_lose() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.73]);
    let report = rig.play(1).remove(0);
    let lines = rig.lines();

    assert_eq!(report.verdict(), Verdict::Lose);
    assert_eq!(lines, vec!["0.73", "first_stop", "lose"]);
    assert_eq!(count(&lines, "bonus"), 0);
    for reel in ReelId::ALL {
        assert_eq!(rig.coordinator.reel(reel).slips(), 1);
    }
}

#[test]
fn test_half_is_a_win() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.5]);
    let report = rig.play(1).remove(0);
    assert_eq!(report.verdict(), Verdict::Bonus);
    assert_eq!(rig.lines().last().map(String::as_str), Some("bonus"));
}

#[test]
fn test_after_notice_at_005_loses_then_bonus() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.05]);
    let report = rig.play(1).remove(0);
    let lines = rig.lines();

    assert_eq!(report.plan.path, RoundPath::AfterNotice);
    assert_eq!(
        lines,
        vec!["0.05", "first_stop", "lose", "first_stop", "bonus"]
    );
    // Replay settles on the forced win value; neither pass slipped
    assert_eq!(rig.ctx.published_outcome(), rig.config.bands.forced_win);
    for reel in ReelId::ALL {
        assert_eq!(rig.coordinator.reel(reel).passes(), 2);
        assert_eq!(rig.coordinator.reel(reel).slips(), 0);
    }
}

#[test]
fn test_staggered_after_notice_spins_twice() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.12]);
    let report = rig.play(1).remove(0);
    assert!(report.plan.staggered);
    assert_eq!(report.plan.path, RoundPath::AfterNotice);

    let spin = rig.config.throttle.spin;
    let spins: Vec<ReelId> = rig
        .bench
        .drive
        .commands()
        .into_iter()
        .filter(|c| c.throttle == spin)
        .map(|c| c.reel)
        .collect();
    assert_eq!(spins.len(), 6);
    assert_eq!(&spins[..3], &ReelId::ALL);
    assert_eq!(&spins[3..], &ReelId::ALL);
}

#[test]
fn test_freeze_at_027_holds_before_rotation() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.27]);
    let report = rig.play(1).remove(0);
    let lines = rig.lines();

    assert_eq!(report.plan.path, RoundPath::Freeze);
    assert_eq!(report.verdict(), Verdict::Bonus);
    assert_eq!(lines, vec!["0.27", "first_stop", "bonus"]);

    let throttle = rig.config.throttle;
    let commands: Vec<f64> = rig
        .bench
        .drive
        .commands()
        .into_iter()
        .map(|c| c.throttle)
        .collect();
    let first_spin = commands.iter().position(|t| *t == throttle.spin).unwrap();
    let first_crawl = commands
        .iter()
        .position(|t| *t == throttle.freeze_crawl)
        .unwrap();
    let first_rest = commands.iter().position(|t| *t == throttle.rest).unwrap();

    assert!(first_rest < first_crawl);
    assert!(first_crawl < first_spin);

    // Buttons were detached for the hold and reattached for the resume
    assert!(rig.bench.buttons.disable_count() >= 1);
    assert!(rig.bench.buttons.enable_count() >= 2);
    assert!(rig.bench.buttons.is_enabled());
}

#[test]
fn test_freeze_ignores_presses_during_hold() {
    let mut config = CabinetConfig::bench();
    config.timing.freeze_crawl_ms = 30.0;
    let mut rig = Rig::scripted(config, &[0.26]);
    rig.start_pressing();
    let started = Instant::now();
    rig.play(1);

    // Every reel stopped once, after the resume
    for reel in ReelId::ALL {
        assert_eq!(rig.coordinator.reel(reel).passes(), 1);
        assert_eq!(rig.bench.cue.plays(reel), 1);
    }
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn test_staggered_start_order() {
    let mut config = CabinetConfig::bench();
    config.timing.stagger_interval_ms = 5.0;
    let mut rig = Rig::scripted(config, &[0.13]);
    let report = rig.play(1).remove(0);
    assert!(report.plan.staggered);

    let spin = rig.config.throttle.spin;
    let first: Vec<ReelId> = rig
        .bench
        .drive
        .commands()
        .into_iter()
        .filter(|c| c.throttle == spin)
        .map(|c| c.reel)
        .take(3)
        .collect();
    assert_eq!(first, ReelId::ALL.to_vec());
}

#[test]
fn test_blackout_darkens_only_while_rotating() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.62, 0.17]);
    let lamps = rig.config.lamps;

    let reports = rig.play(1);
    assert!(!reports[0].plan.blackout);
    assert_eq!(rig.bench.lamps.writes(), vec![lamps.on_duty]);

    let reports = rig.play(1);
    assert!(reports[0].plan.blackout);
    let writes = rig.bench.lamps.writes();
    assert_eq!(&writes[..3], &[lamps.on_duty, lamps.off_duty, lamps.on_duty]);
}

#[test]
fn test_decoy_first_pass_keeps_drawn_value_on_wire() {
    let mut config = CabinetConfig::bench();
    config.after_notice.decoy_first_pass = true;
    let mut rig = Rig::scripted(config, &[0.05]);
    rig.play(1);
    assert_eq!(
        rig.lines(),
        vec!["0.05", "first_stop", "lose", "first_stop", "bonus"]
    );

    // First pass slipped on the lose-coded value, the replay landed on the win
    for reel in ReelId::ALL {
        assert_eq!(rig.coordinator.reel(reel).passes(), 2);
        assert_eq!(rig.coordinator.reel(reel).slips(), 1);
    }
    assert_eq!(rig.ctx.published_outcome(), rig.config.bands.forced_win);
}

#[test]
fn test_stop_requests_ignored_while_gate_closed() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.8]);
    rig.coordinator.start().unwrap();

    for reel in ReelId::ALL {
        assert!(rig.bench.buttons.press(reel));
        assert!(!rig.coordinator.reel(reel).state().pending_stop);
    }

    rig.play(1);
    for reel in ReelId::ALL {
        assert_eq!(rig.coordinator.reel(reel).passes(), 1);
    }
}

#[test]
fn test_waits_for_lever() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.9]);
    rig.bench.lever.set_engaged(false);

    let lever = rig.bench.lever.clone();
    let puller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        lever.set_engaged(true);
    });

    let started = Instant::now();
    rig.play(1);
    puller.join().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(rig.lines(), vec!["0.9", "first_stop", "lose"]);
}

#[test]
fn test_unreadable_lever_counts_as_disengaged() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.9]);
    rig.bench.lever.set_failing(true);

    let lever = rig.bench.lever.clone();
    let fixer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        lever.set_failing(false);
    });

    let started = Instant::now();
    rig.play(1);
    fixer.join().unwrap();
    assert!(started.elapsed() >= Duration::from_millis(30));
    assert_eq!(rig.lines(), vec!["0.9", "first_stop", "lose"]);
}

#[test]
fn test_lamp_failures_do_not_stop_rounds() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.17, 0.3]);
    rig.bench.lamps.set_failing(true);
    let reports = rig.play(2);
    assert_eq!(reports.len(), 2);
    assert!(rig.bench.lamps.writes().is_empty());
    assert_eq!(count(&rig.lines(), "bonus"), 2);
}

#[test]
fn test_every_round_has_one_verdict_and_early_first_stop() {
    let mut rig = Rig::new(CabinetConfig::bench(), Box::new(RandomOutcomes::seeded(7)));
    let reports = rig.play(40);

    for report in &reports {
        let stages = report.trace.stages();
        let lose = report.trace.count("lose");
        let bonus = report.trace.count("bonus");
        let verdict = report.trace.final_classification();

        assert!(matches!(stages[0], Stage::Outcome { .. }));
        match report.plan.path {
            RoundPath::AfterNotice => {
                assert_eq!((lose, bonus), (1, 1));
                assert_eq!(report.trace.count("first_stop"), 2);
            }
            _ => {
                assert_eq!(lose + bonus, 1);
                assert_eq!(report.trace.count("first_stop"), 1);
            }
        }
        let expected = match report.verdict() {
            Verdict::Lose => Stage::Lose,
            Verdict::Bonus => Stage::Bonus,
        };
        assert_eq!(verdict, Some(expected));

        let first_stop = report.trace.position("first_stop").unwrap();
        let classification = stages.iter().position(|s| s.is_classification()).unwrap();
        assert!(first_stop < classification);
    }
}

#[test]
fn test_run_announces_start_once_and_stops_at_limit() {
    let mut rig = Rig::scripted(CabinetConfig::bench(), &[0.9, 0.4]);
    rig.start_pressing();
    rig.coordinator.run(Some(3)).unwrap();

    let lines = rig.lines();
    assert_eq!(lines[0], "start");
    assert_eq!(count(&lines, "start"), 1);
    assert_eq!(rig.coordinator.rounds_played(), 3);
    assert_eq!(position(&lines, "0.9"), Some(1));
}

#[test]
fn test_jammed_sensor_stalls_until_shutdown() {
    let config = CabinetConfig::bench();
    let bench = BenchCabinet::new(&config);
    bench.sensors.jam(ReelId::ALL[1]);
    let sink = MemorySink::new();
    let token = StopToken::new();
    let channel = Arc::new(NotificationChannel::from_writer(sink.clone()));
    let ctx = Arc::new(RoundContext::new(
        config.clone(),
        bench.hardware(),
        Arc::clone(&channel),
        token.clone(),
    ));
    let indicator = Arc::new(IndicatorController::new(bench.lamps.clone(), config.lamps));
    let source = ScriptedOutcomes::new(vec![0.9]).unwrap();

    let presser_token = StopToken::new();
    let presser = bench
        .buttons
        .spawn_presser(
            presser_token.clone(),
            Duration::from_millis(1),
            Duration::from_millis(2),
        )
        .unwrap();

    let session_ctx = Arc::clone(&ctx);
    let session_indicator = Arc::clone(&indicator);
    let session = thread::spawn(move || {
        let _teardown = Teardown::new(Arc::clone(&session_ctx), Arc::clone(&session_indicator));
        let mut coordinator = RoundCoordinator::new(session_ctx, session_indicator, Box::new(source));
        coordinator.run(None)
    });

    thread::sleep(Duration::from_millis(100));
    assert_eq!(count(&sink.lines(), "lose"), 0);

    let stopped_at = Instant::now();
    token.stop();
    assert!(session.join().unwrap().is_ok());
    assert!(stopped_at.elapsed() < Duration::from_secs(5));

    presser_token.stop();
    presser.join().unwrap();

    for reel in ReelId::ALL {
        assert_eq!(bench.drive.throttle(reel), config.throttle.rest);
    }
    assert!(!channel.is_open());
}
