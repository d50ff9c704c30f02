//! ReelForge Cabinet Daemon
//!
//! Usage:
//!   rf-cabinetd run                     - Play rounds, notify over /tmp/notify_pipe
//!   rf-cabinetd run --stdout --rounds 5 - Five rounds, milestones on stdout
//!   rf-cabinetd run --outcome 0.05,0.27 - Scripted outcomes (bench demos)
//!   rf-cabinetd listen                  - Read the pipe and log each milestone
//!   rf-cabinetd config                  - Print the default configuration

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;

use rf_cabinet::bench::BenchCabinet;
use rf_cabinet::{
    CabinetConfig, IndicatorController, NotificationChannel, OutcomeSource, RandomOutcomes,
    RoundContext, RoundCoordinator, ScriptedOutcomes, StopToken, Teardown, ms,
};
use rf_stage::Stage;

#[derive(Parser)]
#[command(name = "rf-cabinetd", about = "ReelForge three-reel cabinet controller")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the round loop on the bench cabinet
    Run(RunArgs),
    /// Read a notification pipe and log every stage
    Listen {
        /// Pipe to read (default: configured FIFO path)
        #[arg(long)]
        fifo: Option<PathBuf>,
    },
    /// Print the default configuration as JSON
    Config,
}

#[derive(Args)]
struct RunArgs {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the FIFO path
    #[arg(long, conflicts_with = "stdout")]
    fifo: Option<PathBuf>,

    /// Write milestones to stdout instead of a FIFO
    #[arg(long)]
    stdout: bool,

    /// Seed for reproducible outcome draws
    #[arg(long, conflicts_with = "outcome")]
    seed: Option<u64>,

    /// Stop after this many rounds
    #[arg(long)]
    rounds: Option<u64>,

    /// Scale staged waits (0.1 = ten times faster)
    #[arg(long, default_value_t = 1.0)]
    time_scale: f64,

    /// Scripted outcomes, cycled (comma separated)
    #[arg(long, value_delimiter = ',')]
    outcome: Vec<f64>,

    /// Shortest gap between simulated button presses (ms)
    #[arg(long, default_value_t = 400)]
    press_min_ms: u64,

    /// Longest gap between simulated button presses (ms)
    #[arg(long, default_value_t = 1500)]
    press_max_ms: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args),
        Commands::Listen { fifo } => listen(fifo),
        Commands::Config => {
            println!("{}", CabinetConfig::default().to_json()?);
            Ok(())
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUN
// ═══════════════════════════════════════════════════════════════════════════

fn run(args: RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => CabinetConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => CabinetConfig::default(),
    };
    if let Some(fifo) = &args.fifo {
        config.notify.fifo_path = fifo.clone();
    }
    if args.time_scale != 1.0 {
        config.timing = config.timing.scaled(args.time_scale);
    }
    config.validate().context("Invalid configuration")?;

    let token = StopToken::new();
    watch_signals(token.clone())?;

    let source = outcome_source(&args)?;
    let channel = match open_channel(&args, &config, &token) {
        Ok(channel) => channel,
        Err(_) if token.is_stopped() => {
            log::info!("[Notify] Shutdown before a reader attached");
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    let bench = BenchCabinet::new(&config);
    let presser = bench
        .buttons
        .spawn_presser(
            token.clone(),
            Duration::from_millis(args.press_min_ms),
            Duration::from_millis(args.press_max_ms.max(args.press_min_ms)),
        )
        .context("Failed to start button presser")?;

    let ctx = Arc::new(RoundContext::new(
        config.clone(),
        bench.hardware(),
        Arc::new(channel),
        token.clone(),
    ));
    let indicator = Arc::new(IndicatorController::new(bench.lamps.clone(), config.lamps));

    let _teardown = Teardown::new(Arc::clone(&ctx), Arc::clone(&indicator));
    let mut coordinator = RoundCoordinator::new(ctx, indicator, source);
    coordinator.run(args.rounds).context("Round loop failed")?;
    coordinator.shutdown();

    if presser.join().is_err() {
        log::warn!("[Bench] Button presser panicked");
    }
    Ok(())
}

fn outcome_source(args: &RunArgs) -> Result<Box<dyn OutcomeSource>> {
    if !args.outcome.is_empty() {
        log::info!("[Round] Scripted outcomes: {:?}", args.outcome);
        let scripted = ScriptedOutcomes::new(args.outcome.clone()).context("Bad --outcome")?;
        return Ok(Box::new(scripted));
    }
    Ok(match args.seed {
        Some(seed) => {
            log::info!("[Round] Seeded draws: {}", seed);
            Box::new(RandomOutcomes::seeded(seed))
        }
        None => Box::new(RandomOutcomes::new()),
    })
}

#[cfg(unix)]
fn open_channel(
    args: &RunArgs,
    config: &CabinetConfig,
    token: &StopToken,
) -> Result<NotificationChannel> {
    if args.stdout {
        return Ok(NotificationChannel::stdout());
    }
    let path = &config.notify.fifo_path;
    NotificationChannel::open_fifo(path, token, ms(config.notify.attach_poll_ms))
        .with_context(|| format!("Failed to open notification pipe {}", path.display()))
}

#[cfg(not(unix))]
fn open_channel(
    _args: &RunArgs,
    _config: &CabinetConfig,
    _token: &StopToken,
) -> Result<NotificationChannel> {
    Ok(NotificationChannel::stdout())
}

/// SIGINT/SIGTERM stop the token; every blocking wait then unwinds to teardown
fn watch_signals(token: StopToken) -> Result<()> {
    let mut signals =
        Signals::new([SIGINT, SIGTERM]).context("Failed to install signal handlers")?;
    thread::Builder::new()
        .name("signals".into())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                log::info!("[Signal] Received {}, shutting down", signal);
                token.stop();
            }
        })
        .context("Failed to start signal thread")?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// LISTEN
// ═══════════════════════════════════════════════════════════════════════════

fn listen(fifo: Option<PathBuf>) -> Result<()> {
    let path = fifo.unwrap_or_else(|| CabinetConfig::default().notify.fifo_path);
    log::info!("[Listen] Opening {}", path.display());
    let file = File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?;

    for line in BufReader::new(file).lines() {
        let line = line.context("Read failed")?;
        match Stage::parse_line(&line) {
            Ok(Stage::Outcome { value }) => log::info!("[Listen] outcome {:.4}", value),
            Ok(stage) => log::info!("[Listen] {} ({})", stage, stage.category().display_name()),
            Err(e) => log::warn!("[Listen] Unparseable line {:?}: {}", line, e),
        }
    }

    log::info!("[Listen] Writer closed the pipe");
    Ok(())
}
