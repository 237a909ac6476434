//! x52out — console entry point.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                      │
//! │                                                              │
//! │  ConsoleOutput     ConsoleSim     LogEventSink   SystemClock │
//! │  (OutputPort)      (SimPort)      (EventSink)    (Clock)     │
//! │                                                              │
//! │  ──────────────── Port Trait Boundary ─────────────────      │
//! │                                                              │
//! │  ┌──────────────────────────────────────────────────────┐    │
//! │  │            Engine (rule logic, no I/O)               │    │
//! │  │  Evaluator · Bindings · Modal · Targets · Scheduler  │    │
//! │  └──────────────────────────────────────────────────────┘    │
//! │                                                              │
//! │  stdin reader thread ──▶ mpsc ──▶ dispatch loop              │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each batch of lines read from stdin is one polling cycle: commands
//! are applied in order, then the modal context is refreshed.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use x52out::adapters::console::{ConsoleOutput, ConsoleSim};
use x52out::adapters::log_sink::LogEventSink;
use x52out::adapters::time::SystemClock;
use x52out::app::commands::InputCommand;
use x52out::app::service::Engine;
use x52out::config::EngineConfig;
use x52out::document::RuleDocument;

#[derive(Parser)]
#[command(
    name = "x52out",
    about = "Drive HOTAS indicators, display and shift state from a rule document",
    version
)]
struct Cli {
    /// Rule document (JSON)
    #[arg(long, short = 'r')]
    rules: PathBuf,

    /// Engine configuration (JSON); defaults apply when omitted
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    info!("x52out v{}", env!("CARGO_PKG_VERSION"));

    // ── 1. Load configuration and rules ───────────────────────
    let config = match &cli.config {
        Some(path) => EngineConfig::from_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let doc = RuleDocument::from_path(&cli.rules)
        .with_context(|| format!("loading rules {}", cli.rules.display()))?;

    // ── 2. Construct adapters and engine ──────────────────────
    let output = Arc::new(ConsoleOutput::new());
    let mut sim = ConsoleSim::new();
    let mut sink = LogEventSink::new();
    let mut engine = Engine::new(doc, config, output, Arc::new(SystemClock))
        .with_context(|| format!("validating rules {}", cli.rules.display()))?;

    for (handle, spec, delta) in engine.subscriptions() {
        match delta {
            Some(d) => info!("subscribe {} {} (delta {})", handle, spec, d),
            None => info!("subscribe {} {}", handle, spec),
        }
    }

    engine.start(&mut sink);

    // ── 3. Dispatch loop ──────────────────────────────────────
    let lines = spawn_stdin_reader()?;
    'dispatch: while let Ok(first) = lines.recv() {
        let mut batch = vec![first];
        batch.extend(lines.try_iter());

        for line in batch {
            if line.trim().is_empty() {
                continue;
            }
            let cmd = match line.parse::<InputCommand>() {
                Ok(cmd) => cmd,
                Err(e) => {
                    warn!("input: {}", e);
                    continue;
                }
            };
            if !engine.handle_command(cmd, &mut sim, &mut sink) {
                break 'dispatch;
            }
        }
        engine.refresh_modal(&mut sink);
    }

    engine.shutdown();
    Ok(())
}

/// Forward stdin lines over a channel until EOF.
fn spawn_stdin_reader() -> Result<Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("stdin-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("spawning stdin reader")?;
    Ok(rx)
}
