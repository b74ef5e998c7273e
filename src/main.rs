use anyhow::Result;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use sweepwatch::notify::{DailySchedule, Transport};
use sweepwatch::{bot, logging, web, App, Config};

fn parse_args() -> Option<PathBuf> {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("sweepwatch {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_help();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config_path
}

fn print_help() {
    println!(
        r#"sweepwatch - LA street sweeping bot

USAGE:
    sweepwatch [OPTIONS]

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    SWEEPWATCH_CONFIG   Path to config file (overrides default location)
    SWEEPWATCH_LOG      Log filter (trace, debug, info, warn, error)
    TELEGRAM_BOT_TOKEN  Bot token from @BotFather
    ARCGIS_API_KEY      Optional ArcGIS token
    SWEEPWATCH_DB_PATH  Subscription database path
    PORT                Web lookup port when [web] is enabled

Answers address lookups over Telegram and sends sweep reminders every day
at the configured local time.

Config file location: $XDG_CONFIG_HOME/sweepwatch/config.toml

See also: sweepwatch-daemon --help"#
    );
}

/// Run the notification pass every day at the configured local time.
async fn run_scheduler(app: Arc<App>, transport: Arc<dyn Transport>) {
    let schedule: DailySchedule = app.schedule;
    let mut previous = schedule.now();
    loop {
        // Counting from the previous target keeps an early wakeup from
        // firing the same run twice
        let target = schedule.next_run_after(schedule.now().max(previous));
        info!("Next notification run at {}", target);
        let wait = schedule.duration_until(target, schedule.now());
        tokio::time::sleep(wait).await;
        previous = target;

        let app = Arc::clone(&app);
        let transport = Arc::clone(&transport);
        match tokio::task::spawn_blocking(move || app.run_notifications(transport)).await {
            Ok(Ok(summary)) => info!(
                sent = summary.sent(),
                purged_owners = summary.purged_owners,
                "Daily notifications done"
            ),
            Ok(Err(e)) => error!("Daily notifications failed: {:#}", e),
            Err(e) => error!("Notification task panicked: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = parse_args();

    // journald on Linux, a rolling file otherwise
    if let Err(e) = logging::LogSetup::bot(None).init() {
        eprintln!("Failed to initialize logging: {:#}", e);
    }

    let config = Config::load(config_path.as_deref())?;
    let app = Arc::new(App::new(config)?);
    let client = Arc::new(app.telegram()?);
    let handler = Arc::new(app.bot_handler());
    info!("Bot starting...");

    let scheduler = tokio::spawn(run_scheduler(
        Arc::clone(&app),
        Arc::clone(&client) as Arc<dyn Transport>,
    ));

    let web_server = if app.config.web.enabled {
        let state = Arc::new(app.web_state());
        let addr = app.config.web.bind_addr();
        Some(tokio::spawn(async move {
            if let Err(e) = web::serve(state, &addr).await {
                error!("Web server stopped: {:#}", e);
            }
        }))
    } else {
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let poller = {
        let running = Arc::clone(&running);
        let client = Arc::clone(&client);
        let schedule = app.schedule;
        tokio::task::spawn_blocking(move || {
            bot::run_polling(&client, &handler, &schedule, &running)
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down, waiting for the current poll to finish");
    running.store(false, Ordering::SeqCst);
    scheduler.abort();
    if let Some(server) = web_server {
        server.abort();
    }
    if let Err(e) = poller.await {
        error!("Polling task failed: {}", e);
    }

    Ok(())
}
