//! Ticket price monitor entry point
//!
//! Wires the production adapters together and runs the scheduling loop:
//! 1. Loads configuration from config.yaml
//! 2. Opens the SQLite price database and rebuilds cooldown state
//! 3. Builds the Ticketmaster client and SMTP notifier
//! 4. Runs the scheduler until Ctrl+C

use std::path::Path;
use std::sync::Arc;

use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use tixscan::adapters::{
    EmailNotifier, EmailSettings, SqlitePriceStore, TicketmasterClient, TicketmasterSettings,
};
use tixscan::config;
use tixscan::config::constants;
use tixscan::core::{
    scheduler_task, DecisionEngine, MonitoringState, Orchestrator, OrchestratorSettings,
    RetryPolicy, ScheduleSettings, SchedulerCommand, SystemClock,
};

const DB_PATH: &str = "ticket_prices.db";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    // Initialize logging
    config::logging::init_logging();

    info!("Ticket price monitor starting...");
    constants::log_configuration();

    // Load configuration from YAML
    let config = match config::load_config(Path::new("config.yaml")) {
        Ok(cfg) => {
            let names: Vec<&str> = cfg.events.iter().map(|e| e.name.as_str()).collect();
            info!(events = ?names, "Loaded {} events from configuration", cfg.events.len());
            cfg
        }
        Err(e) => {
            error!("Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let events = config.tracked_events();

    // Adapters
    let fetcher = match TicketmasterSettings::from_config(&config.api)
        .and_then(TicketmasterClient::new)
    {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Ticketmaster client setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let store = match SqlitePriceStore::open(Path::new(DB_PATH)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Database setup failed: {}", e);
            std::process::exit(1);
        }
    };

    let notifier = match EmailSettings::from_config(&config.email)
        .and_then(|settings| EmailNotifier::new(settings, &events))
    {
        Ok(notifier) => Arc::new(notifier),
        Err(e) => {
            error!("Email notifier setup failed: {}", e);
            std::process::exit(1);
        }
    };

    // Rebuild cooldown state from the alert log so a restart does not
    // re-send alerts that are still inside their cooldown window
    let state = match MonitoringState::rebuild(store.as_ref()).await {
        Ok(state) => {
            info!(cooldowns = state.cooldowns.len(), "Monitoring state rebuilt");
            state
        }
        Err(e) => {
            error!("Failed to rebuild monitoring state: {}", e);
            std::process::exit(1);
        }
    };

    let orchestrator = Orchestrator::new(
        fetcher,
        store,
        notifier,
        Arc::new(SystemClock),
        DecisionEngine::new(config.decision_settings()),
        events,
        OrchestratorSettings {
            retry: RetryPolicy {
                base: constants::retry_base_delay(),
                cap: constants::retry_cap(),
                max_attempts: constants::max_fetch_attempts(),
            },
            delivery_attempts: constants::alert_delivery_attempts(),
        },
    );

    let schedule = ScheduleSettings {
        tick: constants::scheduler_tick(),
        ..config.schedule_settings()?
    };

    // Command channel; the sender stays alive for the whole run
    let (command_tx, command_rx) = mpsc::channel::<SchedulerCommand>(8);

    // Spawn SIGINT handler task
    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("Graceful shutdown initiated");
                shutdown.cancel();
            }
            Err(err) => {
                eprintln!("Failed to listen for Ctrl+C signal: {}", err);
            }
        }
    });

    info!("Scheduler running. Press Ctrl+C to stop.");
    let final_state = scheduler_task(orchestrator, state, schedule, command_rx, cancel).await;

    drop(command_tx);
    info!(
        last_run = ?final_state.last_run,
        "Clean exit"
    );
    Ok(())
}
