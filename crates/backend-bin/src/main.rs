use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use coedit_backend_lib::{config::Settings, ws_router, AppState};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};
use tracing_subscriber::EnvFilter;

/// Collaborative editing backend
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overrides `bind_addr`
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(bind) = args.bind {
        settings.bind_addr = bind;
    }

    init_tracing(&settings);

    let addr = settings.bind_addr;
    let state = Arc::new(AppState::from_settings(settings));
    let app = ws_router::create_router(state.clone());

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "listening");

    let signals = ShutdownSignals::install();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state, signals))
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if settings.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Listeners for the signals that stop the server; installed before the server starts
struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: Option<Signal>,
}

impl ShutdownSignals {
    fn install() -> Self {
        #[cfg(unix)]
        let sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => Some(sigterm),
            Err(e) => {
                tracing::error!(error = %e, "listening for SIGTERM");
                None
            },
        };

        Self {
            #[cfg(unix)]
            sigterm,
        }
    }

    /// Wait for SIGINT or SIGTERM and name the one that arrived
    async fn recv(self) -> &'static str {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "listening for SIGINT");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async move {
            match self.sigterm {
                Some(mut sigterm) => {
                    sigterm.recv().await;
                },
                None => std::future::pending::<()>().await,
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => "SIGINT",
            () = terminate => "SIGTERM",
        }
    }
}

async fn shutdown_signal(state: Arc<AppState>, signals: ShutdownSignals) {
    let signal = signals.recv().await;
    tracing::info!(signal, "shutdown requested");
    state.begin_shutdown();
}
