//! mb - macrobot CLI
//!
//! Record pointer macros, keep them in a JSON store and replay them at any speed.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use macrobot_recorder::prelude::*;
use macrobot_recorder::RecordingSummary;

#[derive(Parser)]
#[command(name = "mb")]
#[command(about = "macrobot - record and replay input macros")]
#[command(version)]
struct Cli {
    /// Macro store file (overrides the config)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    /// JSON config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Print machine-readable JSON
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record pointer movement until Ctrl+C
    Record {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Stop by itself after this many seconds
        #[arg(long)]
        duration: Option<u64>,
        /// Seconds to wait before capture starts
        #[arg(long, default_value = "2")]
        countdown: u64,
    },
    /// Play a stored macro
    Play {
        name: String,
        #[arg(short, long)]
        speed: Option<f64>,
        #[arg(long, default_value = "2")]
        countdown: u64,
    },
    /// List stored macros
    List,
    /// Show a macro
    Show {
        name: String,
        /// Print every action
        #[arg(long)]
        all: bool,
    },
    /// Delete a macro
    Delete { name: String },
    /// Create a macro from a JSON array of steps
    Create {
        name: String,
        /// Steps file: `[{"kind": "move", "x": 1, "y": 2, "delay_ms": 100}, ...]`
        steps: PathBuf,
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Write one macro to a standalone file
    Export { name: String, output: PathBuf },
    /// Add a macro from a standalone file
    Import { file: PathBuf },
    /// Store and backend status
    Status,
    /// Run a free-text command such as "play macro loot_run at 2x"
    Exec {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn print_json<T: Serialize>(data: T) -> Result<()> {
    let output = Output {
        success: true,
        data: Some(data),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// One authored step; `captured_at` is filled in on load
#[derive(Deserialize)]
struct Step {
    #[serde(flatten)]
    action: Action,
    #[serde(default)]
    delay_ms: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = run(cli);
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => MacroConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MacroConfig::default(),
    };
    if let Some(store) = cli.store {
        config.store_path = Some(store);
    }
    log::debug!("Using macro store {}", config.store_path().display());
    let engine = MacroEngine::from_config(macrobot_input::detect(), &config);
    let json = cli.json;

    match cli.command {
        Commands::Record {
            name,
            description,
            duration,
            countdown,
        } => record(&engine, &name, &description, duration, countdown, json),
        Commands::Play {
            name,
            speed,
            countdown,
        } => play(&engine, &name, speed, countdown, json),
        Commands::List => list(&engine, json),
        Commands::Show { name, all } => show(&engine, &name, all, json),
        Commands::Delete { name } => {
            let info = engine.delete_macro(&name)?;
            if json {
                return print_json(info);
            }
            println!("Deleted: {}", info.name);
            Ok(())
        }
        Commands::Create {
            name,
            steps,
            description,
        } => create(&engine, &name, &steps, &description, json),
        Commands::Export { name, output } => {
            engine.export_macro(&name, &output)?;
            println!("Exported '{}' to {}", name, output.display());
            Ok(())
        }
        Commands::Import { file } => {
            let info = engine.import_macro(&file)?;
            if json {
                return print_json(info);
            }
            println!("Imported {}", info);
            Ok(())
        }
        Commands::Status => {
            let status = engine.status();
            if json {
                return print_json(status);
            }
            println!("{}", status);
            println!("Store: {}", config.store_path().display());
            Ok(())
        }
        Commands::Exec { text } => exec(&engine, &text.join(" ")),
    }
}

fn countdown(secs: u64) {
    if secs > 0 {
        println!("Starting in {} seconds...", secs);
        thread::sleep(Duration::from_secs(secs));
    }
}

/// Flag cleared on Ctrl+C
fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl+C handler")?;
    Ok(running)
}

fn record(
    engine: &MacroEngine,
    name: &str,
    description: &str,
    duration: Option<u64>,
    secs: u64,
    json: bool,
) -> Result<()> {
    let running = interrupt_flag()?;
    countdown(secs);
    engine.start_recording(name, description)?;
    println!("Recording: {} (Ctrl+C to stop)", name);

    let summary = finish_recording(engine, &running, duration.map(Duration::from_secs))?;
    if json {
        return print_json(summary);
    }
    println!("\n{}", summary);
    Ok(())
}

/// Show the live counter until interrupted, then stop and save
fn finish_recording(
    engine: &MacroEngine,
    running: &AtomicBool,
    limit: Option<Duration>,
) -> Result<RecordingSummary> {
    let started = Instant::now();
    let mut count = 0;
    while running.load(Ordering::SeqCst) {
        let Some(recording) = engine.status().recording else {
            break;
        };
        if recording.capture_ended {
            println!("\nTime limit reached");
            break;
        }
        if limit.is_some_and(|l| started.elapsed() >= l) {
            break;
        }
        if recording.actions != count {
            count = recording.actions;
            print!("\r{} actions", count);
            io::stdout().flush()?;
        }
        thread::sleep(Duration::from_millis(50));
    }
    Ok(engine.stop_recording()?)
}

fn play(engine: &MacroEngine, name: &str, speed: Option<f64>, secs: u64, json: bool) -> Result<()> {
    let running = interrupt_flag()?;
    let info = engine.macro_info(name)?;
    println!("{}", info);
    countdown(secs);

    let started = engine.play(name, speed)?;
    println!("{} (Ctrl+C to stop)", started);

    let report = finish_playback(engine, &running)?;
    if json {
        return print_json(report);
    }
    println!("{}", report);
    for failure in &report.failures {
        println!("  #{} {}: {}", failure.index, failure.kind, failure.message);
    }
    Ok(())
}

/// Wait for playback to end, cancelling it on Ctrl+C
fn finish_playback(engine: &MacroEngine, running: &AtomicBool) -> Result<PlaybackReport> {
    loop {
        if !running.load(Ordering::SeqCst) {
            return interrupt_playback(engine);
        }
        if let Some(report) = engine.wait_for_playback(Duration::from_millis(100))? {
            return Ok(report);
        }
    }
}

fn interrupt_playback(engine: &MacroEngine) -> Result<PlaybackReport> {
    match engine.stop_playback() {
        // Finished on its own just before the interrupt landed
        Err(MacroError::NotPlaying) => engine
            .last_playback()
            .context("playback ended without a report"),
        other => Ok(other?),
    }
}

fn list(engine: &MacroEngine, json: bool) -> Result<()> {
    let infos = engine
        .list_macros()
        .iter()
        .map(|name| engine.macro_info(name))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if json {
        return print_json(infos);
    }
    if infos.is_empty() {
        println!("No macros saved.");
    }
    for info in infos {
        println!("{}", info);
    }
    Ok(())
}

fn show(engine: &MacroEngine, name: &str, all: bool, json: bool) -> Result<()> {
    let m = engine.get_macro(name)?;
    if json {
        return print_json(&m);
    }
    println!("{}", m.info());

    let mut kinds: Vec<(&str, usize)> = Vec::new();
    for record in &m.actions {
        let kind = record.action.kind();
        match kinds.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, n)) => *n += 1,
            None => kinds.push((kind, 1)),
        }
    }
    let summary: Vec<String> = kinds.iter().map(|(k, n)| format!("{} {}", n, k)).collect();
    println!("Summary: {}", summary.join(", "));

    if all {
        for (i, record) in m.actions.iter().enumerate() {
            println!("{:>4}: +{}ms {}", i, record.delay_ms, record.action);
        }
    }
    Ok(())
}

fn create(engine: &MacroEngine, name: &str, steps: &Path, description: &str, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(steps)
        .with_context(|| format!("reading steps from {}", steps.display()))?;
    let steps: Vec<Step> = serde_json::from_str(&text)
        .with_context(|| format!("parsing steps in {}", steps.display()))?;
    let actions = steps
        .into_iter()
        .map(|s| ActionRecord::new(s.action, Duration::from_millis(s.delay_ms)))
        .collect();

    let info = engine.create_macro(name, description, actions)?;
    if json {
        return print_json(info);
    }
    println!("Created {}", info);
    Ok(())
}

fn exec(engine: &MacroEngine, text: &str) -> Result<()> {
    let Some(outcome) = engine.execute_text(text) else {
        bail!("Not a macro command: '{}'", text);
    };
    println!("{}", outcome);

    // A one-shot process must see a started session through before exiting
    if engine.is_recording() {
        let running = interrupt_flag()?;
        println!("Ctrl+C to stop recording");
        println!("\n{}", finish_recording(engine, &running, None)?);
    } else if engine.is_playing() {
        let running = interrupt_flag()?;
        println!("{}", finish_playback(engine, &running)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrobot_input::HeadlessSynthesizer;

    fn engine(dir: &Path) -> MacroEngine {
        let config = MacroConfig {
            store_path: Some(dir.join("macros.json")),
            ..Default::default()
        };
        MacroEngine::from_config(Arc::new(HeadlessSynthesizer::new()), &config)
    }

    #[test]
    fn interrupt_after_natural_finish_reports_success() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        engine.create_macro("quick", "", Vec::new()).unwrap();
        engine.play("quick", None).unwrap();

        let deadline = Instant::now() + Duration::from_secs(1);
        while engine.is_playing() {
            assert!(Instant::now() < deadline);
            thread::sleep(Duration::from_millis(5));
        }

        let report = interrupt_playback(&engine).unwrap();
        assert!(report.completed());
        assert_eq!(report.name, "quick");
    }

    #[test]
    fn interrupt_with_nothing_played_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(interrupt_playback(&engine(dir.path())).is_err());
    }
}
