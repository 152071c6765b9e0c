// src/main.rs

use anyhow::{bail, Context};
use axum::serve;
use gemini_key_rotator::{
    build_app,
    cli::{Cli, Commands, KeyCommands},
    config, metrics, probe, setup_configuration,
    transport::GeminiTransportFactory,
    AppConfig,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn init_tracing(cli: &Cli) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let registry = tracing_subscriber::registry().with(env_filter);
    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

fn load(cli: &Cli) -> anyhow::Result<AppConfig> {
    let (mut config, _path) = setup_configuration(cli.config.clone())?;
    if let Some(host) = &cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config::ConfigValidator::validate(&config)?;
    Ok(config)
}

async fn serve_command(config: AppConfig) -> anyhow::Result<()> {
    info!("Starting Gemini key rotation service...");
    let app = build_app(&config, metrics::install_prometheus_recorder())?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.host, config.server.port))?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
        e
    })?;
    info!(server.address = %addr, "Server listening");

    serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| {
            error!(error = ?e, "Server run loop encountered an error. Exiting.");
            e
        })?;

    info!("Server shut down gracefully.");
    Ok(())
}

fn config_command(config: &AppConfig, verbose: bool) -> anyhow::Result<()> {
    println!("Configuration is valid.");
    println!("  listen:            {}:{}", config.server.host, config.server.port);
    println!("  model:             {}", config.gemini.model);
    println!("  endpoint:          {}/{}", config.gemini.base_url, config.gemini.api_version);
    println!("  credential source: {:?}", config.gemini.credential_source);
    if verbose {
        println!("\n{}", config::to_yaml(config)?);
    }
    Ok(())
}

fn list_keys_command(config: &AppConfig) -> anyhow::Result<()> {
    let keys = config.gemini.credential_source.from_env();
    println!("Found {} keys.", keys.len());
    for (index, preview) in keys.previews().iter().enumerate() {
        println!("  [{index}] {preview}");
    }
    Ok(())
}

async fn test_keys_command(config: &AppConfig, model: Option<String>) -> anyhow::Result<()> {
    let keys = config.gemini.credential_source.from_env();
    println!("Found {} keys.", keys.len());
    if keys.is_empty() {
        bail!("No Gemini API keys found in environment variables.");
    }

    let factory = GeminiTransportFactory::from_config(config)?;
    let model = model.unwrap_or_else(|| config.gemini.model.clone());
    let outcomes = probe::probe_credentials(&factory, &keys, &model).await;
    for outcome in &outcomes {
        println!("{}", outcome.summary());
    }

    let working = outcomes.iter().filter(|o| o.is_ok()).count();
    if working == 0 {
        bail!("None of the {} configured keys work.", outcomes.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse_args();
    init_tracing(&cli);

    let config = load(&cli)?;
    match cli.effective_command() {
        Commands::Serve => serve_command(config).await,
        Commands::Config { verbose } => config_command(&config, verbose),
        Commands::Keys { action } => match action {
            KeyCommands::List => list_keys_command(&config),
            KeyCommands::Test { model } => test_keys_command(&config, model).await,
        },
    }
}
