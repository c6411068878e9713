pub mod daemon_path;
pub mod output;
pub mod process;

use std::path::PathBuf;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::{
    classifier::ListMode,
    daemon::start_daemon,
    storage::StateStore,
    utils::{
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        percentage::Percentage,
        time::{format_compact, format_hms},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Lockin", version)]
#[command(about = "Work timer with site lock-in, idle auto-pause and wellness reminders")]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Start the daemon in the background")]
    Init {},
    #[command(
        about = "Run the daemon directly in current console. Used for creating a daemon internally and for debugging"
    )]
    Serve {},
    #[command(about = "Stop a currently running daemon")]
    Stop {},
    #[command(about = "Show the timer and configuration at a glance")]
    Status {},
    #[command(about = "Per-domain breakdown of where today's time went")]
    Breakdown {
        #[arg(long = "min-percentage", help = "Hide domains below this share of the total")]
        min_percentage: Option<Percentage>,
    },
    #[command(subcommand, about = "Control the work timer")]
    Timer(TimerCommand),
    #[command(subcommand, about = "Manage the site lists")]
    Sites(SitesCommand),
    #[command(subcommand, about = "Toggle features on or off")]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug)]
enum TimerCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

#[derive(Subcommand, Debug)]
enum SitesCommand {
    #[command(about = "Add a site to the enforced list")]
    Add { site: String },
    #[command(about = "Remove a site from the enforced list")]
    Remove { site: String },
    #[command(about = "Show both lists and the active mode")]
    List {},
    #[command(about = "Switch between blacklist and whitelist enforcement")]
    Mode { mode: ListMode },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    #[command(about = "Site blocking while the timer runs")]
    LockIn { state: Switch },
    #[command(about = "Dimming of inactive tabs while the timer runs")]
    Dim { state: Switch },
    #[command(about = "Posture check reminders")]
    Posture { state: Switch },
    #[command(about = "Eye rest reminders")]
    EyeRest { state: Switch },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Switch {
    On,
    Off,
}

impl From<Switch> for bool {
    fn from(value: Switch) -> bool {
        matches!(value, Switch::On)
    }
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, Ok)?;
    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Init {} => {
            process::restart_server()?;
            Ok(())
        }
        Commands::Stop {} => {
            process::stop_server();
            Ok(())
        }
        Commands::Serve {} => start_daemon(app_dir).await,
        Commands::Status {} => show_status(&StateStore::new(app_dir)?).await,
        Commands::Breakdown { min_percentage } => {
            show_breakdown(&StateStore::new(app_dir)?, min_percentage).await
        }
        Commands::Timer(command) => apply_timer_command(&StateStore::new(app_dir)?, command).await,
        Commands::Sites(command) => apply_sites_command(&StateStore::new(app_dir)?, command).await,
        Commands::Config(command) => {
            apply_config_command(&StateStore::new(app_dir)?, command).await
        }
    }
}

/// Read-only view; never writes the record back, so it cannot race a running
/// daemon.
async fn show_status(store: &StateStore) -> Result<()> {
    let now = Utc::now();
    let mut timer = store.load_timer(now).await;
    timer.rollover(now.date_naive());
    let settings = store.load_settings().await;
    print!("{}", output::render_status(&timer, &settings, now));
    Ok(())
}

async fn show_breakdown(store: &StateStore, min_percentage: Option<Percentage>) -> Result<()> {
    let today = Utc::now().date_naive();
    let mut ledger = store.load_breakdown(today).await;
    ledger.reset_if_new_day(today);
    print!("{}", output::render_breakdown(&ledger, min_percentage));
    Ok(())
}

async fn apply_timer_command(store: &StateStore, command: TimerCommand) -> Result<()> {
    let now = Utc::now();
    let mut timer = store.load_timer(now).await;
    timer.rollover(now.date_naive());

    match command {
        TimerCommand::Start => {
            timer.start(now);
            println!("Timer started.");
        }
        TimerCommand::Pause => {
            timer.pause(now);
            println!("Timer paused at {}.", format_hms(timer.elapsed_ms));
        }
        TimerCommand::Resume => {
            timer.resume(now);
            println!("Timer resumed.");
        }
        TimerCommand::Stop => {
            timer.stop(now);
            println!(
                "Timer stopped. Today: {}.",
                format_compact(timer.today_total_ms)
            );
        }
    }

    store.save_timer(&mut timer, now).await
}

async fn apply_sites_command(store: &StateStore, command: SitesCommand) -> Result<()> {
    let mut settings = store.load_settings().await;

    match command {
        SitesCommand::Add { site } => {
            if settings.active_list_mut().add(&site) {
                println!("Added {site}.");
            } else {
                println!("{site} is already listed (or empty).");
                return Ok(());
            }
        }
        SitesCommand::Remove { site } => {
            if settings.active_list_mut().remove(&site) {
                println!("Removed {site}.");
            } else {
                println!("{site} was not listed.");
                return Ok(());
            }
        }
        SitesCommand::List {} => {
            print!("{}", output::render_sites(&settings));
            return Ok(());
        }
        SitesCommand::Mode { mode } => {
            settings.list_mode = mode;
            println!("Mode set to {mode:?}.");
        }
    }

    store.save_settings(&settings).await
}

async fn apply_config_command(store: &StateStore, command: ConfigCommand) -> Result<()> {
    let mut settings = store.load_settings().await;

    let (name, state) = match command {
        ConfigCommand::LockIn { state } => {
            settings.lock_in_enabled = state.into();
            ("Lock-in", state)
        }
        ConfigCommand::Dim { state } => {
            settings.dim_inactive = state.into();
            ("Tab dimming", state)
        }
        ConfigCommand::Posture { state } => {
            settings.posture_enabled = state.into();
            ("Posture reminders", state)
        }
        ConfigCommand::EyeRest { state } => {
            settings.eye_rest_enabled = state.into();
            ("Eye rest reminders", state)
        }
    };
    println!("{name}: {state:?}");

    store.save_settings(&settings).await
}
