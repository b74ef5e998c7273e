//! Sweepwatch notifier daemon.
//!
//! Sends the daily sweep reminders without running the chat bot, for
//! deployments where the bot runs elsewhere or reminders are driven by cron.
//! Reads the same config file and subscription database as `sweepwatch`.
//!
//! ## Usage
//!
//! ```bash
//! sweepwatch-daemon              # Run in foreground, notifying daily
//! sweepwatch-daemon --once       # Run one notification pass and exit
//! ```
//!
//! ## cron
//!
//! ```text
//! 0 7 * * * /usr/local/bin/sweepwatch-daemon --once
//! ```

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

use sweepwatch::notify::{RunSummary, Transport};
use sweepwatch::logging::LogSetup;
use sweepwatch::{App, Config};

/// Daemon configuration
#[derive(Default)]
struct DaemonConfig {
    /// Run once and exit
    once: bool,
    /// Config path override
    config_path: Option<PathBuf>,
}

fn main() -> Result<()> {
    let daemon_config = parse_args();

    LogSetup::daemon().init()?;

    info!("Sweepwatch daemon starting...");

    let config = Config::load(daemon_config.config_path.as_deref())?;
    info!("Config loaded");

    let app = App::new(config)?;
    let transport: Arc<dyn Transport> = Arc::new(app.telegram()?);

    if daemon_config.once {
        info!("Running in single-shot mode");
        let summary = app.run_notifications(transport)?;
        log_summary(&summary);
    } else {
        info!(
            "Running in daemon mode, notifying daily at {} {}",
            app.schedule.time().format("%H:%M"),
            app.schedule.timezone()
        );
        run_daemon_loop(&app, transport);
    }

    info!("Sweepwatch daemon stopped");
    Ok(())
}

fn parse_args() -> DaemonConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DaemonConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--once" | "-1" => {
                config.once = true;
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config.config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                }
            }
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!(
        r#"sweepwatch-daemon - Daily sweep reminder sender

USAGE:
    sweepwatch-daemon [OPTIONS]

OPTIONS:
    --once, -1          Run one notification pass and exit
    --config, -c PATH   Path to config file
    --help, -h          Show this help message

ENVIRONMENT:
    SWEEPWATCH_CONFIG   Path to config file (overrides default location)
    TELEGRAM_BOT_TOKEN  Bot token used to deliver reminders
    SWEEPWATCH_DB_PATH  Subscription database path
    RUST_LOG            Log level (trace, debug, info, warn, error)

Each pass warns subscribers whose street is swept tomorrow or the day
after, and drops the subscriptions of users who blocked the bot.
"#
    );
}

fn run_daemon_loop(app: &App, transport: Arc<dyn Transport>) {
    let schedule = app.schedule;
    let mut previous = schedule.now();
    loop {
        let target = schedule.next_run_after(schedule.now().max(previous));
        info!("Next notification run at {}", target);
        let wait = schedule.duration_until(target, schedule.now());
        thread::sleep(wait);
        previous = target;

        match app.run_notifications(Arc::clone(&transport)) {
            Ok(summary) => log_summary(&summary),
            Err(e) => error!("Error running notifications: {:#}", e),
        }
    }
}

fn log_summary(summary: &RunSummary) {
    info!(
        subscriptions = summary.subscriptions,
        tomorrow = summary.sent_tomorrow,
        in_two_days = summary.sent_in_two_days,
        failed = summary.transient_failures,
        purged_owners = summary.purged_owners,
        "Notification pass finished"
    );
}
