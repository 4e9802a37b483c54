#![forbid(unsafe_code)]

mod applier;
mod config;
mod constants;
mod error;
mod icons;
mod manager;
mod matcher;
mod scheduler;
mod snapshot;
mod types;
mod window_system;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{info, Level as TraceLevel};
use tracing_subscriber::FmtSubscriber;

use config::{AppSettings, CloseBehavior, JsonSettingsStore};
use constants::paging;
use manager::Manager;
use scheduler::{BatchReport, SchedulerOptions};
use types::{Geometry, WindowHandle};
use window_system::X11WindowSystem;

/// window-sizer - remember and restore window positions and sizes
#[derive(Parser)]
#[command(name = "window-sizer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use this directory for window_configs.json and config_icons/
    /// instead of the one stored in settings
    #[arg(long, value_name = "DIR", global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> bool {
        matches!(toggle, Toggle::On)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List open windows that can be configured
    List,

    /// List saved configs
    Configs {
        /// Only show configs whose title or process contains this text
        #[arg(long, default_value = "")]
        query: String,

        #[arg(long, default_value_t = 1)]
        page: usize,

        #[arg(long, default_value_t = paging::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Save a config for a window identified by title and process
    Save {
        #[arg(long)]
        title: String,

        #[arg(long)]
        process: String,

        /// Target geometry; all four must be given together.
        /// Defaults to the window's current rectangle.
        #[arg(long, allow_negative_numbers = true, requires_all = ["y", "width", "height"])]
        x: Option<i32>,
        #[arg(long, allow_negative_numbers = true, requires_all = ["x", "width", "height"])]
        y: Option<i32>,
        #[arg(long, requires_all = ["x", "y", "height"])]
        width: Option<i32>,
        #[arg(long, requires_all = ["x", "y", "width"])]
        height: Option<i32>,
    },

    /// Save a window exactly where it is now
    Capture {
        /// Window handle (decimal or 0x-prefixed hex)
        #[arg(long)]
        handle: WindowHandle,
    },

    /// Apply a saved config to its matching window
    Apply { index: usize },

    /// Move/resize a window directly
    ApplyWindow {
        #[arg(long)]
        handle: WindowHandle,
        #[arg(long, allow_negative_numbers = true)]
        x: i32,
        #[arg(long, allow_negative_numbers = true)]
        y: i32,
        #[arg(long)]
        width: i32,
        #[arg(long)]
        height: i32,
    },

    /// Apply every enabled config
    ApplyAll,

    Delete { index: usize },
    Enable { index: usize },
    Disable { index: usize },
    Rename { index: usize, name: String },

    /// Merge configs from an exported file
    Import { path: PathBuf },
    Export { path: PathBuf },

    /// Write a timestamped backup next to the config file
    Backup,
    Restore { path: PathBuf },

    /// Keep running, re-applying configs when auto-apply is on
    Watch {
        /// Window to track until it closes
        #[arg(long)]
        select: Option<WindowHandle>,
    },

    /// Show or change settings
    Settings {
        #[arg(long)]
        auto_apply: Option<Toggle>,
        #[arg(long, value_name = "DIR")]
        storage_dir: Option<PathBuf>,
        #[arg(long)]
        double_click_apply: Option<Toggle>,
        #[arg(long)]
        close_behavior: Option<CloseBehavior>,
    },

    /// Report every window of a process and test whether it can be moved
    Diagnose {
        #[arg(long)]
        pid: u32,
    },
}

fn init_logging() -> Result<()> {
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).context("Failed to install tracing subscriber")
}

fn open_manager(config_dir: Option<PathBuf>) -> Result<Manager> {
    let system = Arc::new(X11WindowSystem::connect().context("Failed to connect to the X server")?);

    let settings_path = JsonSettingsStore::default_path();
    let mut settings_store = Box::new(JsonSettingsStore::open(&settings_path));
    let mut settings = AppSettings::load(settings_store.as_mut());
    if let Some(dir) = config_dir {
        settings.config_dir = dir;
    }
    info!(
        settings = %settings_store.path().display(),
        config_dir = %settings.config_dir.display(),
        "Using config storage"
    );

    Ok(Manager::with_settings(system, settings_store, settings))
}

fn print_batch(report: &BatchReport) {
    println!(
        "applied {}, already in place {}, failed {}",
        report.applied, report.unchanged, report.failed
    );
    for failure in &report.failures {
        println!("  {}: {}", failure.name, failure.reason);
    }
}

fn print_settings(settings: &AppSettings) {
    println!("storage dir:        {}", settings.config_dir.display());
    println!("auto apply:         {}", settings.auto_apply);
    println!("double-click apply: {}", settings.double_click_apply);
    println!("close behavior:     {:?}", settings.close_behavior);
}

fn watch(manager: &Manager, select: Option<WindowHandle>) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&shutdown))
        .context("Failed to register SIGINT handler")?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&shutdown))
        .context("Failed to register SIGTERM handler")?;

    let mut scheduler = manager.scheduler(SchedulerOptions::default());
    scheduler.select(select);

    // Settings may be toggled from another invocation while we run
    let settings_path = JsonSettingsStore::default_path();
    let auto_apply = || AppSettings::load(&mut JsonSettingsStore::open(&settings_path)).auto_apply;

    scheduler.run(&manager.store(), &auto_apply, &shutdown);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let mut manager = open_manager(cli.config_dir)?;

    match cli.command {
        Commands::List => {
            for window in manager.list_windows()? {
                println!(
                    "{}  {}  [{}]  {}",
                    window.handle, window.rect.geometry(), window.process_name, window.title
                );
            }
        }
        Commands::Configs { query, page, page_size } => {
            let listing = manager.query(&query, page, page_size);
            for (index, record) in &listing.entries {
                let state = if record.enabled { "on " } else { "off" };
                println!("{index:>4}  {state}  {}  {}", record.geometry(), record.display_name());
            }
            println!(
                "page {}/{} ({} configs)",
                listing.page, listing.page_count, listing.total
            );
        }
        Commands::Save { title, process, x, y, width, height } => {
            let geometry = match (x, y, width, height) {
                (Some(x), Some(y), Some(width), Some(height)) => Some(Geometry::new(x, y, width, height)),
                _ => None,
            };
            let index = manager.save(&title, &process, geometry)?;
            println!("saved config {index}");
        }
        Commands::Capture { handle } => {
            let index = manager.capture(handle)?;
            println!("saved config {index}");
        }
        Commands::Apply { index } => {
            let outcome = manager.apply_record(index)?;
            println!("{outcome:?}");
        }
        Commands::ApplyWindow { handle, x, y, width, height } => {
            let outcome = manager.apply_to(handle, Geometry::new(x, y, width, height))?;
            println!("{outcome:?}");
        }
        Commands::ApplyAll => {
            let report = manager.apply_all(SchedulerOptions::default())?;
            print_batch(&report);
        }
        Commands::Delete { index } => {
            let removed = manager.delete(index)?;
            println!("deleted {}", removed.display_name());
        }
        Commands::Enable { index } => manager.set_enabled(index, true)?,
        Commands::Disable { index } => manager.set_enabled(index, false)?,
        Commands::Rename { index, name } => manager.rename(index, &name)?,
        Commands::Import { path } => {
            let summary = manager.import(&path)?;
            println!("imported {}, skipped {} duplicates", summary.added, summary.skipped);
        }
        Commands::Export { path } => manager.export(&path)?,
        Commands::Backup => {
            let path = manager.backup()?;
            println!("{}", path.display());
        }
        Commands::Restore { path } => {
            let count = manager.restore(&path)?;
            println!("restored {count} configs");
        }
        Commands::Watch { select } => watch(&manager, select)?,
        Commands::Settings { auto_apply, storage_dir, double_click_apply, close_behavior } => {
            if let Some(dir) = storage_dir {
                manager.set_storage_dir(&dir)?;
            }
            if auto_apply.is_some() || double_click_apply.is_some() || close_behavior.is_some() {
                manager.update_settings(|settings| {
                    if let Some(toggle) = auto_apply {
                        settings.auto_apply = toggle.into();
                    }
                    if let Some(toggle) = double_click_apply {
                        settings.double_click_apply = toggle.into();
                    }
                    if let Some(behavior) = close_behavior {
                        settings.close_behavior = behavior;
                    }
                })?;
            }
            print_settings(manager.settings());
        }
        Commands::Diagnose { pid } => {
            let diagnosis = manager.diagnose(pid)?;
            println!(
                "pid {} ({}): {} windows",
                diagnosis.pid,
                diagnosis.process_name.as_deref().unwrap_or("unknown process"),
                diagnosis.windows.len()
            );
            for window in &diagnosis.windows {
                let report = &window.report;
                println!(
                    "{}  visible={:?}  rect={}  class={}  title={}",
                    report.handle,
                    report.visible,
                    report.rect.map(|r| r.to_string()).unwrap_or_else(|| "?".into()),
                    report.class_name.as_deref().unwrap_or("?"),
                    report.title.as_deref().unwrap_or("?"),
                );
                match &window.trial {
                    Some(Ok(outcome)) => println!("    trial apply: {outcome:?}"),
                    Some(Err(e)) => println!("    trial failed: {e}"),
                    None => println!("    trial apply: skipped (not visible)"),
                }
            }
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging()?;
    run(cli)
}
