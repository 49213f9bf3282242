//! Runtime Nudge - break reminder for long-running applications
//!
//! Watches the process list and pops up a reminder once a selected
//! application has been running continuously for too long.

#[cfg(windows)]
mod alert_window;
mod config;
mod console;
mod hotkey;
mod logger;
mod message;
mod monitor;
mod notification;
mod registry;
mod selector;
mod snapshot;
mod tracker;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::Sender;
use monitor::{ControlEvent, Monitor, MonitorSettings};
use registry::TargetRegistry;
use snapshot::SystemProcesses;
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{info, warn};

/// Runtime Nudge - reminds you to take a break
#[derive(Parser)]
#[command(name = "runtime_nudge")]
#[command(about = "Pops up a break reminder when selected applications run too long")]
struct Cli {
    /// Configuration file (default: runtime_nudge.json next to the EXE)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Alias to monitor, skips the selection prompt (repeatable)
    #[arg(long = "select", value_name = "ALIAS")]
    select: Vec<String>,

    /// Write logs to logs/app.log next to the EXE instead of the console
    #[arg(long)]
    log_file: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print PID and name of every running process
    ListProcesses,
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::ListProcesses) => {
            logger::init_console_logger()?;
            list_processes()?;
        }
        Some(Commands::InitConfig { force }) => {
            logger::init_console_logger()?;
            init_config(cli.config, force)?;
        }
        None => {
            if cli.log_file {
                let dir = logger::init_file_logger()?;
                println!("Logging to {}", dir.display());
            } else {
                logger::init_console_logger()?;
            }
            info!("Runtime Nudge started");

            run_app(cli.config, cli.select)?;

            info!("Runtime Nudge ended");
        }
    }

    Ok(())
}

/// Main application logic
fn run_app(config_path: Option<PathBuf>, preselected: Vec<String>) -> Result<()> {
    let config = config::load(config_path.as_deref()).context("Could not load configuration")?;
    let registry = TargetRegistry::new(config.aliases.clone());

    let aliases: BTreeSet<String> = if preselected.is_empty() {
        let stdin = std::io::stdin();
        selector::prompt_selection(&registry, stdin.lock(), std::io::stdout())?
    } else {
        preselected.into_iter().collect()
    };
    let targets = registry
        .resolve(&aliases)
        .context("Invalid target selection")?;

    info!("Selected {:?} -> {:?}", aliases, targets);
    println!(
        "Monitoring: {}",
        targets.iter().cloned().collect::<Vec<_>>().join(", ")
    );

    let settings = MonitorSettings {
        check_interval: config.check_interval,
        trigger_duration: config.trigger_duration,
        suppress_duration: config.suppress_duration,
        alert_message_template: config.alert_message_template.clone(),
    };

    run_platform(&config, settings, &registry, &targets)
}

#[cfg(windows)]
fn run_platform(
    config: &config::Config,
    settings: MonitorSettings,
    registry: &TargetRegistry,
    targets: &BTreeSet<String>,
) -> Result<()> {
    use alert_window::{AlertWindow, WindowNotifier};

    let monitor = Monitor::new(settings, registry, targets, SystemProcesses::new(), WindowNotifier);
    let events = monitor.sender();

    // UI thread = this thread; must be ready before the first tick
    let window = AlertWindow::init(&config.hotkey, events.clone())?;
    let (_, handle) = monitor.spawn()?;

    install_ctrlc_handler(events.clone());
    println!("Press {} to pause/resume monitoring", config.hotkey);
    console::print_help(false);
    console::spawn_stdin_commands(events.clone(), None)?;

    // Monitor stopped (console 'q') -> leave the message loop too
    std::thread::spawn(move || {
        let _ = handle.join();
        alert_window::request_quit();
    });

    window.run();
    let _ = events.send(ControlEvent::Shutdown);
    Ok(())
}

#[cfg(not(windows))]
fn run_platform(
    config: &config::Config,
    settings: MonitorSettings,
    registry: &TargetRegistry,
    targets: &BTreeSet<String>,
) -> Result<()> {
    use notification::ConsoleNotifier;

    info!(
        "Global hotkey {} is only registered on Windows, use the console 't' command",
        config.hotkey
    );

    let notifier = ConsoleNotifier::new();
    let monitor = Monitor::new(settings, registry, targets, SystemProcesses::new(), notifier.clone());
    let (events, handle) = monitor.spawn()?;

    install_ctrlc_handler(events.clone());
    console::print_help(true);
    console::spawn_stdin_commands(events, Some(notifier))?;

    if handle.join().is_err() {
        bail!("Monitor thread panicked");
    }
    Ok(())
}

fn install_ctrlc_handler(events: Sender<ControlEvent>) {
    let result = ctrlc::set_handler(move || {
        info!("CTRL+C received, shutting down...");
        let _ = events.send(ControlEvent::Shutdown);
        #[cfg(windows)]
        alert_window::request_quit();
    });
    if let Err(e) = result {
        warn!("Could not install CTRL+C handler: {}", e);
    }
}

/// Prints every visible process, like a `ps` for process names
fn list_processes() -> Result<()> {
    let mut entries = SystemProcesses::new().entries()?;
    entries.sort();
    for entry in &entries {
        println!("PID={}, Name={}", entry.pid, entry.name);
    }
    info!("{} processes", entries.len());
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(config::default_config_path);
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    config::write_settings(&path, &config::Settings::default())?;
    println!("Default configuration written to {}", path.display());
    Ok(())
}
