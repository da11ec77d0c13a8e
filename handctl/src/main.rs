//! handctl - gesture and pointer control engine
//!
//! Replays a landmark trace through the engine and prints every intent
//! as an s-expression event on stdout.  Logs go to stderr.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use clap::Parser;
use tracing::{debug, info, warn};

use handctl::config::EngineConfig;
use handctl::engine::action::{ActionDispatcher, Intent, LogDispatcher};
use handctl::engine::landmarks::LandmarkFrame;
use handctl::engine::modes::Mode;
use handctl::engine::pipeline::{dispatch_intents, dispatch_output, Engine};
use handctl::error::TraceError;
use handctl::exchange::LatestSlot;
use handctl::trace::{TraceCommand, TraceEntry, TraceReader};

#[derive(Parser, Debug)]
#[command(name = "handctl", about = "Hand and gaze gesture control engine")]
struct Cli {
    /// Config file (s-expression plist)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Starting mode: menu, mouse, draw, shortcut or gaze
    #[arg(long)]
    mode: Option<String>,

    /// Landmark trace to replay, or - for stdin
    #[arg(long, default_value = "-")]
    trace: String,

    /// Pace frames by their timestamps on a producer thread
    #[arg(long)]
    realtime: bool,

    /// Flip incoming landmarks horizontally
    #[arg(long)]
    mirror: bool,

    /// Also print pointer motion events
    #[arg(long)]
    pointer: bool,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Print component status when the trace ends
    #[arg(long)]
    status: bool,
}

#[derive(Debug, Default)]
struct RunSummary {
    frames: u64,
    intents: u64,
    dispatch_failures: u64,
    skipped_lines: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handctl=info".into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(name) = &cli.mode {
        config.start_mode = Mode::parse(name)
            .ok_or_else(|| anyhow!("unknown mode {name}. Use: menu, mouse, draw, shortcut or gaze"))?;
    }
    if cli.mirror {
        config.mirror = true;
    }
    config.validate().context("invalid configuration")?;

    if cli.print_config {
        println!("{}", config.to_sexp());
        return Ok(());
    }

    info!("handctl v{} starting", env!("CARGO_PKG_VERSION"));
    info!(mode = config.start_mode.as_str(), "trace: {}", cli.trace);

    let input: Box<dyn BufRead + Send> = if cli.trace == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&cli.trace).with_context(|| format!("opening trace {}", cli.trace))?;
        Box::new(BufReader::new(file))
    };

    let mut engine = Engine::new(config);
    let mut dispatcher = LogDispatcher::new(io::stdout().lock());
    dispatcher.emit_pointer = cli.pointer;

    let summary = if cli.realtime {
        run_realtime(input, &mut engine, &mut dispatcher)?
    } else {
        run_replay(input, &mut engine, &mut dispatcher)?
    };

    info!(
        "Finished: {} frames, {} intents, {} dispatch failures, {} skipped lines",
        summary.frames, summary.intents, summary.dispatch_failures, summary.skipped_lines
    );
    if cli.status {
        println!("{}", engine.status_sexp());
    }
    Ok(())
}

/// Feed one trace entry to the engine.  Returns true when the session ends.
fn handle_entry(
    engine: &mut Engine,
    dispatcher: &mut dyn ActionDispatcher,
    entry: TraceEntry,
    summary: &mut RunSummary,
) -> bool {
    match entry {
        TraceEntry::Frame(frame) => handle_frame(engine, dispatcher, &frame, summary),
        TraceEntry::Command { command, .. } => handle_command(engine, dispatcher, command, summary),
    }
}

fn handle_frame(
    engine: &mut Engine,
    dispatcher: &mut dyn ActionDispatcher,
    frame: &LandmarkFrame,
    summary: &mut RunSummary,
) -> bool {
    let out = engine.process(frame);
    for e in &out.errors {
        debug!(frame = out.frame_index, "{}", e);
    }
    summary.frames += 1;
    summary.intents += out.intents.len() as u64;
    summary.dispatch_failures += dispatch_output(&out, dispatcher).len() as u64;
    out.is_terminal()
}

fn handle_command(
    engine: &mut Engine,
    dispatcher: &mut dyn ActionDispatcher,
    command: TraceCommand,
    summary: &mut RunSummary,
) -> bool {
    match engine.apply_command(command) {
        Ok(intents) => {
            summary.intents += intents.len() as u64;
            summary.dispatch_failures += dispatch_intents(None, &intents, dispatcher).len() as u64;
            intents.iter().any(Intent::is_terminal)
        }
        Err(e) => {
            warn!(command = command.as_str(), "Command failed: {}", e);
            false
        }
    }
}

/// Malformed lines are skipped, read failures end the run.
fn next_entry(
    result: Result<TraceEntry, TraceError>,
    summary: &mut RunSummary,
) -> anyhow::Result<Option<TraceEntry>> {
    match result {
        Ok(entry) => Ok(Some(entry)),
        Err(TraceError::Io(e)) => Err(e).context("reading trace"),
        Err(e) => {
            warn!("Skipping trace line: {}", e);
            summary.skipped_lines += 1;
            Ok(None)
        }
    }
}

/// Process every entry in order, as fast as possible.
fn run_replay(
    input: Box<dyn BufRead + Send>,
    engine: &mut Engine,
    dispatcher: &mut dyn ActionDispatcher,
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();
    for result in TraceReader::new(input) {
        let Some(entry) = next_entry(result, &mut summary)? else {
            continue;
        };
        if handle_entry(engine, dispatcher, entry, &mut summary) {
            info!("Session ended by intent");
            break;
        }
    }
    Ok(summary)
}

/// Replay at capture speed.
///
/// A producer thread plays the camera: it releases frames at their
/// timestamps into a latest-value slot, so a slow engine skips frames
/// instead of falling behind.  Commands travel on a channel and are
/// never dropped.  Both carry their position in the trace, so a command
/// is applied after every frame that precedes it and before any that
/// follows it.
fn run_realtime(
    input: Box<dyn BufRead + Send>,
    engine: &mut Engine,
    dispatcher: &mut dyn ActionDispatcher,
) -> anyhow::Result<RunSummary> {
    // Frames carry their sequence number, commands the number of frames
    // published before them.
    let slot: Arc<LatestSlot<(u64, LandmarkFrame)>> = Arc::new(LatestSlot::new());
    let (command_tx, command_rx) = mpsc::channel::<(u64, TraceCommand)>();

    let producer = {
        let slot = Arc::clone(&slot);
        thread::Builder::new()
            .name("trace-producer".to_string())
            .spawn(move || -> anyhow::Result<u64> {
                let mut skipped = RunSummary::default();
                let start = Instant::now();
                let mut first_t = None;
                let mut frames_published = 0u64;
                for result in TraceReader::new(input) {
                    let entry = match next_entry(result, &mut skipped) {
                        Ok(Some(entry)) => entry,
                        Ok(None) => continue,
                        Err(e) => {
                            slot.close();
                            return Err(e);
                        }
                    };
                    let t0 = *first_t.get_or_insert(entry.timestamp_s());
                    let Ok(due) = Duration::try_from_secs_f64((entry.timestamp_s() - t0).max(0.0)) else {
                        warn!("Skipping trace entry with unusable timestamp {}", entry.timestamp_s());
                        skipped.skipped_lines += 1;
                        continue;
                    };
                    if let Some(wait) = due.checked_sub(start.elapsed()) {
                        thread::sleep(wait);
                    }
                    let delivered = match entry {
                        TraceEntry::Frame(frame) => {
                            let seq = frames_published;
                            frames_published += 1;
                            slot.publish((seq, frame))
                        }
                        TraceEntry::Command { command, .. } => command_tx.send((frames_published, command)).is_ok(),
                    };
                    if !delivered {
                        debug!("Consumer gone, producer stopping");
                        break;
                    }
                }
                slot.close();
                Ok(skipped.skipped_lines)
            })
            .context("spawning trace producer")?
    };

    let mut summary = RunSummary::default();
    let mut pending: VecDeque<(u64, TraceCommand)> = VecDeque::new();
    // Every frame below this sequence number is processed or dropped.
    let mut next_frame = 0u64;
    let ended = loop {
        let frame = slot.wait_latest(Duration::from_millis(100));
        pending.extend(command_rx.try_iter());
        match frame {
            Some((seq, frame)) => {
                if apply_commands(engine, dispatcher, &mut pending, seq, &mut summary) {
                    break true;
                }
                if handle_frame(engine, dispatcher, &frame, &mut summary) {
                    break true;
                }
                next_frame = seq + 1;
            }
            None if slot.is_finished() => {
                // The producer closes the slot after its last send.
                pending.extend(command_rx.try_iter());
                break apply_commands(engine, dispatcher, &mut pending, u64::MAX, &mut summary);
            }
            None => {}
        }
        if apply_commands(engine, dispatcher, &mut pending, next_frame, &mut summary) {
            break true;
        }
    };
    slot.close();
    drop(command_rx);

    if slot.dropped() > 0 {
        info!("{} stale frame(s) skipped", slot.dropped());
    }
    if ended {
        // The producer may still be blocked on input; it stops at its
        // next publish.
        info!("Session ended by intent");
        return Ok(summary);
    }
    let skipped = producer
        .join()
        .map_err(|_| anyhow!("trace producer panicked"))??;
    summary.skipped_lines += skipped;
    Ok(summary)
}

/// Apply queued commands that follow no more than `frames` frames.
/// Returns true when the session ends.
fn apply_commands(
    engine: &mut Engine,
    dispatcher: &mut dyn ActionDispatcher,
    pending: &mut VecDeque<(u64, TraceCommand)>,
    frames: u64,
    summary: &mut RunSummary,
) -> bool {
    while let Some(&(after, command)) = pending.front() {
        if after > frames {
            break;
        }
        pending.pop_front();
        if handle_command(engine, dispatcher, command, summary) {
            return true;
        }
    }
    false
}
