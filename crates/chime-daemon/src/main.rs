use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use chime_core::config::ChimeConfig;
use chime_core::reminder::load_definitions_or_empty;
use chime_notify::{build_sink, run_delivery, CommandOpener, EventSink};
use chime_scheduler::{FallbackPolicy, LocalClock, ReminderStore, SchedulerEngine};

mod actions;
mod app;
mod http;
#[cfg(test)]
mod testing;

/// Capacity of the scheduler → delivery queue.
const DELIVERY_QUEUE: usize = 256;

/// Weekly reminders with per-minute re-notify until acknowledged.
#[derive(Parser, Debug)]
#[command(name = "chime", version, about)]
struct Cli {
    /// Path to chime.toml.
    #[arg(long, env = "CHIME_CONFIG")]
    config: Option<String>,

    /// Reminder definitions file, overriding `reminders_path`.
    #[arg(long)]
    reminders: Option<String>,

    /// Scheduler tick in seconds, overriding `scheduler.tick_secs`.
    #[arg(long)]
    tick_secs: Option<u64>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load and print the reminder definitions, then exit.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "chime=info,chime_scheduler=info,chime_notify=info,tower_http=info".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli);

    let defs = load_definitions_or_empty(&config.reminders_path);
    let store = ReminderStore::from_definitions(&defs);
    info!(path = %config.reminders_path, loaded = store.len(), "reminders loaded");

    if let Some(Command::Check) = cli.command {
        print_reminders(&store);
        return Ok(());
    }

    let policy = FallbackPolicy::from_config(&config.scheduler).unwrap_or_else(|e| {
        warn!("Invalid scheduler settings ({}), using defaults", e);
        FallbackPolicy::default()
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (fired_tx, fired_rx) = tokio::sync::mpsc::channel(DELIVERY_QUEUE);

    // delivery task: fired reminders → notification sink
    let sink: Arc<dyn EventSink> = Arc::from(build_sink(&config.notify));
    info!(sink = sink.name(), "notification sink ready");
    let delivery = tokio::spawn(run_delivery(sink, fired_rx, shutdown_rx.clone()));

    let engine = SchedulerEngine::new(
        store.clone(),
        policy,
        Duration::from_secs(config.scheduler.tick_secs),
        Some(fired_tx),
    );
    let scheduler = tokio::spawn(engine.run(shutdown_rx.clone()));

    let opener = Arc::new(CommandOpener::from_config(&config.browser));
    let state = Arc::new(app::AppState::new(
        config,
        store,
        opener,
        Arc::new(LocalClock),
        shutdown_tx,
    ));

    let state_for_signal = Arc::clone(&state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received");
            actions::stop(&state_for_signal);
        }
    });

    serve_control(Arc::clone(&state), shutdown_rx).await;

    let scheduler_result = scheduler.await;
    if let Err(e) = &scheduler_result {
        error!("scheduler task failed: {e}");
    }
    if let Err(e) = delivery.await {
        error!("delivery task failed: {e}");
    }
    scheduler_result?;
    info!("chime stopped");
    Ok(())
}

/// Config path: `--config` > `CHIME_CONFIG` > `~/.chime/chime.toml`, then
/// command-line overrides on top.
fn load_config(cli: &Cli) -> ChimeConfig {
    let mut config = ChimeConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        ChimeConfig::default()
    });
    if let Some(path) = &cli.reminders {
        config.reminders_path = chime_core::config::expand_home(path);
    }
    match cli.tick_secs {
        Some(0) => warn!("--tick-secs must be at least 1, keeping configured value"),
        Some(secs) => config.scheduler.tick_secs = secs,
        None => {}
    }
    config
}

fn print_reminders(store: &ReminderStore) {
    let records = store.snapshot();
    if records.is_empty() {
        println!("no reminders loaded");
        return;
    }
    for r in &records {
        match &r.url {
            Some(url) => println!("{:<24} {}  {}", r.name, r.rule, url),
            None => println!("{:<24} {}", r.name, r.rule),
        }
    }
}

/// Run the HTTP control surface until stop is signalled. When the surface is
/// disabled or cannot bind, just wait for stop.
async fn serve_control(state: Arc<app::AppState>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let control = state.config.control.clone();
    if !control.enabled {
        info!("control surface disabled");
        let _ = shutdown.wait_for(|stop| *stop).await;
        return;
    }

    let addr: SocketAddr = match format!("{}:{}", control.bind, control.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(bind = %control.bind, port = control.port, "invalid control address: {e}");
            let _ = shutdown.wait_for(|stop| *stop).await;
            return;
        }
    };
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            warn!(%addr, "control surface unavailable: {e}");
            let _ = shutdown.wait_for(|stop| *stop).await;
            return;
        }
    };
    info!("chime control surface listening on http://{}", addr);

    let router = app::build_router(state);
    let mut graceful = shutdown.clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = graceful.wait_for(|stop| *stop).await;
        })
        .await;
    if let Err(e) = result {
        warn!("control surface error: {e}");
        let _ = shutdown.wait_for(|stop| *stop).await;
    }
}
