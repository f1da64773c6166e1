// Framework bootstrap: tracing/panic-hook init, the Hub singleton, axum
// wiring, and graceful shutdown. `init_runtime` is carried over from the
// teacher's `frameworks/server.rs` near-verbatim; the Ctrl-C drain is new,
// grounded in `examples/wreien-beeeees/src/main.rs`'s
// `tokio::select!{accept, signal::ctrl_c()}` shutdown pattern, adapted to
// axum's `with_graceful_shutdown`.

use std::io::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::frameworks::config::{self, Cli};
use crate::interface_adapters::net;
use crate::interface_adapters::state::AppState;
use crate::use_cases::hub::{self, HubHandle};

/// How long `run` waits, after axum stops accepting new connections, for
/// already-running games to call back with `game_finished` before exiting.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

fn init_runtime(cli: &Cli) {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if config::log_format_is_json(cli) {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: tokio::net::TcpListener) -> Result<()> {
    let address = listener.local_addr()?;
    let hub = hub::spawn();
    let state = Arc::new(AppState { hub: hub.clone() });
    let app = net::router(state);

    tracing::info!(%address, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(hub.clone()))
        .await
        .inspect_err(|e| {
            tracing::error!(error = %e, "server error");
        })?;

    tracing::info!(grace_period = ?SHUTDOWN_GRACE, "waiting for active games to wind down");
    tokio::time::sleep(SHUTDOWN_GRACE).await;
    Ok(())
}

pub async fn run_with_config(cli: Cli) -> Result<()> {
    init_runtime(&cli);

    let address: SocketAddr = config::listen_addr(&cli)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .inspect_err(|e| {
            tracing::error!(%address, error = %e, "failed to bind");
        })?;

    run(listener).await
}

async fn shutdown_signal(hub: HubHandle) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received; draining in-flight connections");
    hub.shutdown().await;
}
