//! APM Tracker CLI
//!
//! Live APM and eAPM readouts in the terminal.

use anyhow::{bail, Context, Result};
use apm_tracker::{
    collector::{check_permission, Collector, CollectorConfig, CollectorError},
    config::{Settings, SourceConfig, KNOWN_KEYS},
    core::{ActivityRecorder, RecorderConfig, GRAPH_TIME_RANGE_OPTIONS},
    export::{write_export, ExportFormat, SessionExport},
    logging::enable_logging,
    render::{render_chart, render_compact, render_readout},
    session::Session,
    target::{default_probe, normalize_target, running_programs, ForegroundProbe, TargetFilter},
    VERSION,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tracing::{error, info, warn};

/// Rows per series in the activity chart.
const CHART_HEIGHT: usize = 8;

/// How often the running tracker re-reads the settings file.
const SETTINGS_RELOAD_INTERVAL: Duration = Duration::from_secs(1);

/// Main loop tick.
const TICK: Duration = Duration::from_millis(50);

#[derive(Parser)]
#[command(name = "apm-tracker")]
#[command(version = VERSION)]
#[command(about = "Live APM and effective APM tracker", long_about = None)]
struct Cli {
    /// Log level (overrides RUST_LOG and the settings file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start tracking and show live rates
    Start {
        /// Input sources to capture (keyboard, mouse, or all)
        #[arg(long)]
        sources: Option<String>,

        /// Only record while this program has focus
        #[arg(long)]
        target: Option<String>,

        /// Show the per-second activity chart
        #[arg(long)]
        chart: bool,

        /// Single-line readout
        #[arg(long)]
        compact: bool,

        /// Export the session on exit (json, jsonl or csv)
        #[arg(long)]
        export: Option<String>,

        /// Export directory
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Pause a running tracker
    Pause,

    /// Resume a paused tracker
    Resume,

    /// Show tracker status
    Status,

    /// Show configuration
    Config,

    /// Change one setting
    Set {
        /// Setting name
        key: String,
        /// New value
        value: String,
    },

    /// Show or change the target program
    Target {
        /// Program name to track
        name: Option<String>,

        /// Track input everywhere again
        #[arg(long, conflicts_with_all = ["name", "foreground"])]
        clear: bool,

        /// Use the program that currently has focus
        #[arg(long, conflicts_with = "name")]
        foreground: bool,
    },

    /// List running programs
    Programs,
}

struct StartOptions {
    sources: Option<String>,
    target: Option<String>,
    chart: bool,
    compact: bool,
    export: Option<String>,
    output: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let settings_level = Settings::load_or_default().log_level;
    let log_dir = Settings::log_dir();
    let log_dir = match std::fs::create_dir_all(&log_dir) {
        Ok(()) => Some(log_dir),
        Err(e) => {
            eprintln!("Warning: Could not create log directory {log_dir:?}: {e}");
            None
        }
    };
    if let Err(e) = enable_logging(
        log_dir.as_deref(),
        cli.log_level.as_deref(),
        &settings_level,
        true,
    ) {
        eprintln!("Warning: Could not set up logging: {e}");
    }

    let result = match cli.command {
        Commands::Start {
            sources,
            target,
            chart,
            compact,
            export,
            output,
        } => cmd_start(StartOptions {
            sources,
            target,
            chart,
            compact,
            export,
            output,
        }),
        Commands::Pause => cmd_pause(),
        Commands::Resume => cmd_resume(),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
        Commands::Set { key, value } => cmd_set(&key, &value),
        Commands::Target {
            name,
            clear,
            foreground,
        } => cmd_target(name, clear, foreground),
        Commands::Programs => cmd_programs(),
    };

    if let Err(e) = result {
        error!("{e:#}");
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn cmd_start(opts: StartOptions) -> Result<()> {
    println!("APM Tracker v{VERSION}");
    println!();

    let export_format = opts
        .export
        .as_deref()
        .map(str::parse::<ExportFormat>)
        .transpose()?;

    let mut settings = Settings::load_or_default();

    let sources = match opts.sources.as_deref() {
        Some(csv) => SourceConfig::from_csv(csv),
        None => settings.sources.clone(),
    };
    if !sources.any_enabled() {
        bail!("at least one source must be enabled (keyboard or mouse)");
    }

    // A --target given here applies to this run only; later edits of the
    // settings file still take over
    let mut file_target = settings.target_program.clone();
    let target = match opts.target.as_deref() {
        Some(name) => Some(normalize_target(name)),
        None => settings.target().map(str::to_string),
    };

    println!("Starting tracker...");
    println!("  Keyboard: {}", enabled(sources.keyboard));
    println!("  Mouse: {}", enabled(sources.mouse));
    println!(
        "  Target program: {}",
        target.as_deref().filter(|t| !t.is_empty()).unwrap_or("(any)")
    );
    println!(
        "  Cooldowns: action {:.2}s, eAPM {:.2}s",
        settings.action_cooldown, settings.eapm_cooldown
    );
    if let Some(format) = export_format {
        println!("  Export on exit: {}", format.extension());
    }
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let mut banner = ListenerBanner::default();
    if !check_permission() {
        banner.show("Input Monitoring permission not granted");
    }

    let recorder = Arc::new(ActivityRecorder::new(RecorderConfig::from_settings(
        &settings,
    )));
    let mut collector = Collector::new(CollectorConfig {
        capture_keyboard: sources.keyboard,
        capture_mouse: sources.mouse,
    });
    let filter = TargetFilter::new(
        target.as_deref(),
        default_probe(),
        settings.active_check_interval(),
    );
    let mut session = Session::spawn(recorder.clone(), collector.receiver().clone(), filter);

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    let mut paused = settings.paused;
    let mut listening = false;
    if paused {
        println!("Tracking is currently paused.");
        println!("Run `apm-tracker resume` to continue.");
        println!();
    } else {
        listening = start_listener(&mut collector, &mut banner);
    }

    let mut settings_mtime = settings_modified();
    let mut last_settings_check = Instant::now();
    let mut last_readout: Option<Instant> = None;
    let mut last_chart: Option<Instant> = None;

    while running.load(Ordering::SeqCst) {
        // Reload settings so `apm-tracker pause/resume/set` can control a running tracker
        if last_settings_check.elapsed() >= SETTINGS_RELOAD_INTERVAL {
            let modified = settings_modified();
            let reload = if modified != settings_mtime {
                settings_mtime = modified;
                reload_settings(&Settings::config_path())
            } else {
                None
            };
            if let Some(reloaded) = reload {
                if reloaded.paused != paused {
                    paused = reloaded.paused;
                    if paused {
                        println!();
                        println!("Pausing tracker...");
                        collector.stop();
                        listening = false;
                        banner.reset();
                    } else {
                        println!();
                        println!("Resuming tracker...");
                        listening = start_listener(&mut collector, &mut banner);
                    }
                }

                let config = RecorderConfig::from_settings(&reloaded);
                if config != recorder.config() {
                    info!(
                        action_cooldown = reloaded.action_cooldown,
                        eapm_cooldown = reloaded.eapm_cooldown,
                        history_capacity = reloaded.history_capacity,
                        "applying new recorder settings"
                    );
                    recorder.reconfigure(config);
                }

                if reloaded.target_program != file_target {
                    file_target = reloaded.target_program.clone();
                    session.set_target(reloaded.target());
                }

                settings = reloaded;
            }
            last_settings_check = Instant::now();
        }

        if listening && !collector.is_running() {
            error!("input listener stopped unexpectedly");
            banner.show("the input listener stopped unexpectedly");
            listening = false;
        }

        if !session.is_running() {
            warn!("ingest session ended");
            break;
        }

        let now = Utc::now();
        if opts.chart && due(last_chart, settings.graph_update_interval()) {
            let report = recorder.poll(now);
            let range = chart_range(settings.graph_time_range);
            let bins = recorder.activity(now, range);
            // Clear the screen and redraw from the top
            print!("\x1B[2J\x1B[H");
            println!("{}", render_readout(&report));
            println!();
            println!(
                "{}",
                render_chart(&bins, settings.max_actions_per_second, CHART_HEIGHT)
            );
            if paused {
                println!("(paused)");
            }
            let _ = std::io::stdout().flush();
            last_chart = Some(Instant::now());
        } else if !opts.chart && due(last_readout, settings.update_interval()) {
            let report = recorder.poll(now);
            let line = if opts.compact {
                render_compact(&report)
            } else {
                render_readout(&report)
            };
            let suffix = if paused { " (paused)" } else { "" };
            print!("\r{line}{suffix:<10}");
            let _ = std::io::stdout().flush();
            last_readout = Some(Instant::now());
        }

        thread::sleep(TICK);
    }

    println!();
    println!();
    println!("Stopping tracker...");
    collector.stop();
    session.stop();

    let report = recorder.poll(Utc::now());
    println!("{}", render_readout(&report));

    if let Some(format) = export_format {
        let dir = opts.output.unwrap_or_else(Settings::export_dir);
        let export = SessionExport::new(&recorder.snapshot(), report, Utc::now());
        match write_export(&dir, format, &export) {
            Ok(path) => println!(
                "Exported {} actions to {:?}",
                export.actions.len(),
                path
            ),
            Err(e) => {
                error!("export failed: {e}");
                eprintln!("Error exporting session: {e}");
            }
        }
    }

    println!();
    println!("{}", session.summary());
    Ok(())
}

/// Start the input listener, reporting a failure once.
///
/// The tracker keeps running without a listener; the readouts stay at zero.
fn start_listener(collector: &mut Collector, banner: &mut ListenerBanner) -> bool {
    match collector.start() {
        Ok(()) => true,
        Err(CollectorError::AlreadyRunning) => true,
        Err(e) => {
            error!("could not start input listener: {e}");
            banner.show(&e.to_string());
            false
        }
    }
}

/// Prints the listener banner at most once until reset by a pause.
#[derive(Debug, Default)]
struct ListenerBanner {
    shown: bool,
}

impl ListenerBanner {
    /// Returns whether the banner was printed.
    fn show(&mut self, reason: &str) -> bool {
        if self.shown {
            return false;
        }
        self.shown = true;
        print_listener_banner(reason);
        true
    }

    fn reset(&mut self) {
        self.shown = false;
    }
}

fn print_listener_banner(reason: &str) {
    eprintln!();
    eprintln!("Error: Input listener unavailable: {reason}.");
    eprintln!("The tracker keeps running, but no actions will be counted.");
    #[cfg(target_os = "macos")]
    {
        eprintln!();
        eprintln!("To grant permission:");
        eprintln!("1. Open System Settings > Privacy & Security");
        eprintln!("2. Select 'Input Monitoring'");
        eprintln!("3. Add this application to the allowed list");
        eprintln!("4. Restart the application");
    }
    eprintln!();
}

/// Re-read the settings file; a broken file keeps the running settings.
fn reload_settings(path: &Path) -> Option<Settings> {
    match Settings::load_from(path) {
        Ok(settings) => Some(settings),
        Err(e) => {
            warn!(?path, "could not reload settings, keeping the current ones: {e}");
            None
        }
    }
}

fn settings_modified() -> Option<SystemTime> {
    std::fs::metadata(Settings::config_path())
        .and_then(|m| m.modified())
        .ok()
}

fn due(last: Option<Instant>, interval: Duration) -> bool {
    last.map_or(true, |t| t.elapsed() >= interval)
}

/// Snap the configured chart range to the nearest offered option.
fn chart_range(configured: u64) -> usize {
    GRAPH_TIME_RANGE_OPTIONS
        .iter()
        .copied()
        .min_by_key(|option| option.abs_diff(configured))
        .unwrap_or(configured) as usize
}

fn enabled(flag: bool) -> &'static str {
    if flag {
        "enabled"
    } else {
        "disabled"
    }
}

fn cmd_pause() -> Result<()> {
    let mut settings = Settings::load_or_default();
    settings.paused = true;
    settings.save().context("could not save settings")?;
    println!("Tracking paused. Use 'apm-tracker resume' to continue.");
    Ok(())
}

fn cmd_resume() -> Result<()> {
    let mut settings = Settings::load_or_default();
    settings.paused = false;
    settings.save().context("could not save settings")?;
    println!("Tracking resumed.");
    Ok(())
}

fn cmd_status() -> Result<()> {
    let settings = Settings::load_or_default();

    println!("APM Tracker Status");
    println!("==================");
    println!();

    println!(
        "Input listener permission: {}",
        if check_permission() {
            "Granted ✓"
        } else {
            "Not Granted ✗"
        }
    );
    println!();

    println!("Configuration:");
    println!("  Keyboard capture: {}", enabled(settings.sources.keyboard));
    println!("  Mouse capture: {}", enabled(settings.sources.mouse));
    println!(
        "  Target program: {}",
        settings.target().unwrap_or("(any)")
    );
    println!("  Action cooldown: {:.2}s", settings.action_cooldown);
    println!("  eAPM cooldown: {:.2}s", settings.eapm_cooldown);
    println!("  Paused: {}", settings.paused);
    Ok(())
}

fn cmd_config() -> Result<()> {
    let settings = Settings::load_or_default();

    println!("APM Tracker Configuration");
    println!("=========================");
    println!();
    println!("Settings file: {:?}", Settings::config_path());
    println!("Export directory: {:?}", Settings::export_dir());
    println!("Log directory: {:?}", Settings::log_dir());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&settings).context("could not serialize settings")?
    );
    println!();
    println!("Keys: {}", KNOWN_KEYS.join(", "));
    Ok(())
}

fn cmd_set(key: &str, value: &str) -> Result<()> {
    let mut settings = Settings::load_or_default();
    settings.set(key, value)?;
    settings.save().context("could not save settings")?;
    println!("{key} updated.");
    Ok(())
}

fn cmd_target(name: Option<String>, clear: bool, foreground: bool) -> Result<()> {
    let mut settings = Settings::load_or_default();

    let new_target = if clear {
        Some(String::new())
    } else if foreground {
        let program = default_probe()
            .foreground_process()
            .context("could not determine the foreground program")?;
        Some(normalize_target(&program))
    } else {
        name.map(|n| normalize_target(&n))
    };

    let Some(new_target) = new_target else {
        println!("Target program: {}", settings.target().unwrap_or("(any)"));
        return Ok(());
    };

    settings.set("target_program", &new_target)?;
    settings.save().context("could not save settings")?;
    match settings.target() {
        Some(target) => println!("Tracking only while {target} has focus."),
        None => println!("Tracking input in every program."),
    }
    Ok(())
}

fn cmd_programs() -> Result<()> {
    let programs = running_programs();
    if programs.is_empty() {
        println!("No running programs found.");
        return Ok(());
    }

    println!("Running programs:");
    for program in programs {
        println!("  {program}");
    }
    Ok(())
}

fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        warn!("could not install Ctrl+C handler: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_range_snaps_to_options() {
        assert_eq!(chart_range(60), 60);
        assert_eq!(chart_range(10), 30);
        assert_eq!(chart_range(250), 300);
        assert_eq!(chart_range(100), 120);
    }

    #[test]
    fn test_listener_banner_shows_once_until_reset() {
        let mut banner = ListenerBanner::default();
        // Missing permission, then the tap thread dying for the same reason
        assert!(banner.show("Input Monitoring permission not granted"));
        assert!(!banner.show("the input listener stopped unexpectedly"));

        // A pause and resume is a fresh attempt
        banner.reset();
        assert!(banner.show("the input listener stopped unexpectedly"));
    }

    #[test]
    fn test_reload_keeps_running_settings_on_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        std::fs::write(&path, r#"{"paused": true}"#).unwrap();
        assert!(reload_settings(&path).unwrap().paused);

        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(reload_settings(&path).is_none());
    }

    #[test]
    fn test_due() {
        assert!(due(None, Duration::from_secs(1)));
        assert!(!due(Some(Instant::now()), Duration::from_secs(60)));
    }

    #[test]
    fn test_cli_parses_start_options() {
        let cli = Cli::parse_from([
            "apm-tracker",
            "start",
            "--target",
            "game.exe",
            "--compact",
            "--export",
            "csv",
        ]);
        match cli.command {
            Commands::Start {
                target,
                compact,
                export,
                ..
            } => {
                assert_eq!(target.as_deref(), Some("game.exe"));
                assert!(compact);
                assert_eq!(export.as_deref(), Some("csv"));
            }
            _ => panic!("expected start"),
        }
    }
}
