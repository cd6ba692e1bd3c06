use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, anyhow};
use axum_server::tls_rustls::RustlsConfig;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use callrelay_gateway::auth::{self, StreamClaims, now_millis};
use callrelay_gateway::{AppState, ServerConfig, create_app};

/// In-flight streams get this long to finish after a shutdown signal
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Call relay gateway - authenticated streaming proxy for call recordings
#[derive(Parser, Debug)]
#[command(name = "callrelay-gateway")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Mint a stream token with the configured signing secret
    SignToken {
        /// Provider recording SID
        #[arg(long)]
        recording_id: Option<String>,

        /// Record store call id
        #[arg(long)]
        call_id: Option<String>,

        /// Provider call SID
        #[arg(long)]
        provider_call_sid: Option<String>,

        /// Token lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_seconds: i64,
    },
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<ServerConfig> {
    match path {
        Some(config_path) => {
            info!("Loading configuration from {}", config_path.display());
            ServerConfig::from_file(&config_path)
                .with_context(|| format!("loading {}", config_path.display()))
        }
        None => ServerConfig::from_env().context("loading configuration from environment"),
    }
}

fn sign_token(config: &ServerConfig, claims: StreamClaims) -> anyhow::Result<String> {
    if !claims.has_resource_identifier() {
        anyhow::bail!("one of --recording-id, --call-id or --provider-call-sid is required");
    }
    let secret = config
        .signing_secret()
        .ok_or_else(|| anyhow!("STREAM_TOKEN_SECRET (or TWILIO_AUTH_TOKEN) must be set"))?;
    Ok(auth::encode(&claims, secret)?)
}

#[cfg(unix)]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "SIGINT").map_err(anyhow::Error::from),
        _ = sigterm.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> anyhow::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("SIGINT")
}

async fn wait_for_shutdown() {
    match shutdown_signal().await {
        Ok(signal) => info!(signal, "Shutdown signal received"),
        Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if it exists (must be done before config loading)
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize crypto provider for TLS connections
    // This must be done before any TLS connections are attempted
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    if let Some(Commands::SignToken {
        recording_id,
        call_id,
        provider_call_sid,
        ttl_seconds,
    }) = cli.command
    {
        let claims = StreamClaims {
            call_id,
            recording_id,
            provider_call_sid,
            exp: Some(now_millis() + ttl_seconds.saturating_mul(1000)),
        };
        println!("{}", sign_token(&config, claims)?);
        return Ok(());
    }

    let address = config.address();
    let tls_config = config.tls.clone();
    info!(config = ?config, "Configuration loaded");

    let app_state = AppState::new(config).context("building upstream HTTP client")?;
    let app = create_app(app_state);

    let socket_addr: SocketAddr = address
        .parse()
        .map_err(|e| anyhow!("Invalid server address '{}': {}", address, e))?;

    // Start server with or without TLS
    if let Some(tls) = tls_config {
        let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
            .await
            .map_err(|e| {
                anyhow!(
                    "Failed to load TLS certificates from {} and {}: {}",
                    tls.cert_path.display(),
                    tls.key_path.display(),
                    e
                )
            })?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            wait_for_shutdown().await;
            shutdown_handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        });

        info!("Server listening on https://{} (TLS enabled)", socket_addr);
        axum_server::bind_rustls(socket_addr, rustls_config)
            .handle(handle)
            .serve(app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|e| anyhow!("TLS server error: {}", e))?;
    } else {
        info!("Server listening on http://{}", socket_addr);

        let listener = TcpListener::bind(&socket_addr).await?;
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;
    }

    info!("Server stopped");
    Ok(())
}
