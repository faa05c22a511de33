use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use plazza_core::{load_config_or_default, validate_config, Config};
use plazza_server::api::create_router;
use plazza_server::state::AppState;
use plazza_server::{Kitchen, Reception};

const USAGE: &str = "usage: plazza <reception|kitchen>";

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mode = std::env::args().nth(1);

    // Determine config path
    let config_path = std::env::var("PLAZZA_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("plazza.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    match mode.as_deref() {
        Some("reception") => run_reception(config).await,
        Some("kitchen") => run_kitchen(config).await,
        _ => bail!(USAGE),
    }
}

async fn run_reception(config: Config) -> Result<()> {
    let reception = Reception::bind(config.link.addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.link.addr()))?;

    // Print every command as soon as it is ready
    let mut completed = reception.subscribe_completed();
    tokio::spawn(async move {
        loop {
            match completed.recv().await {
                Ok(command) => println!("Ready: {}", command),
                Err(RecvError::Lagged(missed)) => warn!("Missed {} completed commands", missed),
                Err(RecvError::Closed) => break,
            }
        }
    });

    if config.http.enabled {
        let addr = config.http.addr();
        let app = create_router(Arc::new(AppState::new(config.clone(), reception.clone())));
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HTTP endpoint to {}", addr))?;
        info!("Serving status on http://{}", addr);
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP endpoint failed: {}", e);
            }
        });
    }

    tokio::select! {
        _ = read_orders(&reception) => {},
        _ = shutdown_signal() => {},
    }

    info!("Reception shutting down...");
    reception.shutdown();
    Ok(())
}

/// Take orders from stdin until `quit`. A closed stdin never returns.
async fn read_orders(reception: &Reception) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            // Detached from a terminal; keep serving kitchens.
            Ok(None) => std::future::pending::<String>().await,
            Err(e) => {
                error!("Failed to read stdin: {}", e);
                return;
            }
        };

        match line.trim() {
            "" => {}
            "quit" | "exit" => return,
            "status" => print_status(reception),
            order => match reception.take_order(order) {
                Ok(command) => println!("Accepted {}: {}", command.id(), command),
                Err(e) => println!("Rejected: {}", e),
            },
        }
    }
}

fn print_status(reception: &Reception) {
    let tickets = reception.board().get_tickets();
    let done = tickets.iter().filter(|t| t.is_done()).count();
    let cooking = tickets.iter().filter(|t| t.is_in_progress()).count();

    println!(
        "{} kitchen(s), {} pending command(s), tickets: {} waiting, {} cooking, {} done",
        reception.kitchen_count(),
        reception.pending_commands().len(),
        tickets.len() - done - cooking,
        cooking,
        done
    );
}

async fn run_kitchen(config: Config) -> Result<()> {
    let addr = config.link.addr();
    let kitchen = Kitchen::connect(addr, config.kitchen)
        .await
        .with_context(|| format!("Failed to reach the reception at {}", addr))?;
    let board = Arc::clone(kitchen.board());

    let stats = tokio::select! {
        stats = kitchen.run() => stats.context("Kitchen link failed")?,
        _ = shutdown_signal() => {
            board.stop();
            return Ok(());
        }
    };

    info!(
        applied = stats.applied,
        rejected = stats.rejected,
        "Reception closed the link"
    );
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
