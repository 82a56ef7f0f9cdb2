//! Signal Desk: buy/sell/hold recommendations with take-profit and stop-loss
//!
//! Usage:
//!   signal-desk serve --port 8000  Launch the HTTP service
//!   signal-desk predict --symbol AAPL --market nasdaq  One-shot prediction from CLI

mod routes;

use clap::{Parser, Subcommand};
use engine::{Config, PredictionRequest, Predictor};
use std::sync::Arc;
use tracing::{error, info};

use crate::routes::{build_router, AppState};

pub(crate) const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "signal-desk")]
#[command(about = "Market signals with take-profit and stop-loss levels", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the prediction web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Run a single prediction and print it as JSON (no web server)
    Predict {
        /// Instrument symbol, e.g. AAPL or EURUSD
        #[arg(long)]
        symbol: String,
        /// Market: forex, crypto, metals, nasdaq, nyse
        #[arg(long)]
        market: String,
        /// Bar interval: 1min, 5min, 15min, 30min, 60min
        #[arg(long, default_value = "15min")]
        timeframe: String,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,signal_desk=debug,tower_http=debug")
    } else {
        EnvFilter::new("info,engine=info,signal_desk=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn load_predictor() -> anyhow::Result<Predictor> {
    let config = Config::from_env().map_err(|e| {
        error!("Invalid configuration: {}", e);
        anyhow::anyhow!("Configuration error: {}", e)
    })?;
    info!(?config, "Configuration loaded");
    Ok(Predictor::from_config(&config)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port).await?;
        }
        Commands::Predict {
            symbol,
            market,
            timeframe,
        } => {
            cmd_predict(&symbol, &market, &timeframe).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command: Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16) -> anyhow::Result<()> {
    info!("Signal Desk v{} starting...", APP_VERSION);

    let state = AppState {
        predictor: Arc::new(load_predictor()?),
    };
    let app = build_router(state);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Signal Desk v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /health                  - Health check");
    println!("  GET  /prediction              - Signal for ?symbol=&market=&timeframe=");
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Predict command: CLI mode (no web server)
// ============================================================================

async fn cmd_predict(symbol: &str, market: &str, timeframe: &str) -> anyhow::Result<()> {
    let request = PredictionRequest::parse(Some(symbol), Some(market), Some(timeframe))?;
    let predictor = load_predictor()?;

    let response = predictor.predict(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
