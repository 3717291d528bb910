//! Guessdex session server.
//!
//! Serves the WebSocket gateway the multiplayer mode connects to.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin guessdex-server
//! cargo run --bin guessdex-server -- --host 0.0.0.0 --port 3001
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use guessdex::{catalog::Catalog, gateway};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "guessdex-server")]
#[command(about = "Realtime session server for the Guessdex picture quiz", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "3001")]
    port: u16,

    /// Seconds between idle-room expiry sweeps
    #[arg(long, default_value_t = 60)]
    sweep_interval: u64,
}

/// Initializes the tracing subscriber; `RUST_LOG` overrides the default.
fn setup_logger(default_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("guessdex={default_level},tower_http=warn").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() {
    setup_logger("info");

    let args = Args::parse();

    let state = gateway::AppState::new(Catalog::builtin());
    gateway::spawn_expiry_sweep(Arc::clone(&state), Duration::from_secs(args.sweep_interval));

    let app = gateway::router(state).layer(TraceLayer::new_for_http());

    let address = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .expect("failed to bind listener");
    tracing::info!(%address, "guessdex server listening");

    axum::serve(listener, app).await.expect("server error");
}
