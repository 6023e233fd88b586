//! MathBuddy CLI
//!
//! Main entry point for running the MathBuddy tutoring server.

use std::net::SocketAddr;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use mathbuddy_clients::{HttpChatModel, HttpKnowledgeEngine, KnowledgeEngine};
use mathbuddy_server::{create_router, AppState, Config, LadderVariant};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// MathBuddy - Conversational Math Tutoring Server
///
/// Runs the HTTP backend that chat clients talk to. Each session tracks a
/// student's topic and difficulty, adjusting both as the conversation and
/// graded answers come in.
#[derive(Parser, Debug)]
#[command(name = "mathbuddy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: mathbuddy.json in current directory)
    #[arg(short, long, value_name = "FILE")]
    config: Option<String>,

    /// Port for the HTTP API server (overrides the config file)
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Topic ladder new sessions start on: gradeLevels or courseTopics
    #[arg(short, long, value_name = "NAME")]
    ladder: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize tracing subscriber with appropriate filter
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if args.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("MathBuddy starting");
    tracing::debug!(config = ?args.config, "Config file");

    // Run the server and handle errors
    match run_server(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

/// Runs the MathBuddy server.
///
/// Loads configuration, builds the upstream clients, and serves the API
/// until Ctrl+C.
async fn run_server(args: Args) -> anyhow::Result<()> {
    // Load configuration
    let mut config = load_config(args.config.as_deref())?;

    // Apply CLI argument overrides
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ref ladder) = args.ladder {
        config.ladder = parse_ladder(ladder)?;
    }

    // Re-validate after overrides
    config.validate()?;

    print_config(&config);

    // Build the upstream clients. The chat model is required; the
    // knowledge engine is optional and the server degrades without it.
    let chat = Arc::new(HttpChatModel::new(config.chat.chat_options()?)?);
    let knowledge = build_knowledge_engine(&config);

    let state = AppState::new(config.clone(), chat, knowledge);
    let router = create_router(state);

    // Bind and serve
    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    println!();
    println!("Starting HTTP API server on {addr}...");

    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("MathBuddy API server running on http://{addr}");
    println!("Press Ctrl+C to stop");
    println!();

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server stopped");
    Ok(())
}

/// Loads configuration from the specified path or default location.
fn load_config(config_path: Option<&str>) -> anyhow::Result<Config> {
    match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path).map_err(|e| anyhow::anyhow!("{e}"))
        }
        None => Config::load().map_err(|e| anyhow::anyhow!("{e}")),
    }
}

/// Parses a ladder name given on the command line.
fn parse_ladder(name: &str) -> anyhow::Result<LadderVariant> {
    serde_json::from_value(serde_json::Value::String(name.to_string())).map_err(|_| {
        anyhow::anyhow!(
            "Unknown ladder '{name}'\n\nSuggestion: Use \"gradeLevels\" or \"courseTopics\""
        )
    })
}

/// Builds the knowledge engine when one is configured and its credentials
/// resolve. Runs without it otherwise; answer checking then reports the
/// engine as unavailable.
fn build_knowledge_engine(config: &Config) -> Option<Arc<dyn KnowledgeEngine>> {
    let knowledge_config = config.knowledge.as_ref()?;

    let options = match knowledge_config.knowledge_options() {
        Ok(options) => options,
        Err(e) => {
            tracing::warn!(error = %e, "Knowledge engine disabled");
            println!("Knowledge engine disabled: answer checking will be unavailable");
            return None;
        }
    };

    match HttpKnowledgeEngine::new(options) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!(error = %e, "Knowledge engine disabled");
            println!("Knowledge engine disabled: answer checking will be unavailable");
            None
        }
    }
}

/// Prints the loaded configuration.
fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Port: {}", config.port);
    println!("  Ladder: {:?}", config.ladder);
    println!("  Estimator: {:?}", config.estimator);
    println!("  Chat model: {}", config.chat.model);
    println!(
        "  API key check: {}",
        if config.api_key.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );
    match &config.rate_limit {
        Some(limit) => println!(
            "  Rate limit: {} requests per {}s",
            limit.max_requests, limit.window_seconds
        ),
        None => println!("  Rate limit: disabled"),
    }
}

/// Resolves when Ctrl+C is received.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Received Ctrl+C, shutting down");
}
