//! Subdomain reverse proxy.
//!
//! ```text
//!   client ── GET https://<label>.proxy.example.com/v2/ ──▶ subproxy
//!                                                          │ decode label
//!                                                          ▼
//!                                          GET https://registry.example.com/v2/
//!                                                          │
//!   client ◀── 401 WWW-Authenticate: Bearer realm="https://<label'>.proxy.example.com/token"
//! ```
//!
//! Subcommands:
//! - `serve` (default): run the proxy
//! - `encode <url>`: print the label for an origin
//! - `decode <label>`: print the origin behind a label
//! - `mappings`: list mapping store rows

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use url::Url;

use subproxy::addressing::{self, AddressingStrategy, MappingStore, Origin};
use subproxy::config::{read_config, validate_config, ConfigError, ProxyConfig, Strategy};
use subproxy::lifecycle::{signals, Shutdown};
use subproxy::observability::{logging, metrics};
use subproxy::rewrite::PublicDomain;
use subproxy::{Forwarder, HttpServer};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "subproxy", version)]
#[command(about = "Reverse proxy that maps origin servers to subdomain labels", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Public domain labels are placed under.
    #[arg(long, global = true)]
    domain: Option<String>,

    /// Listen port (keeps the configured bind host).
    #[arg(short, long)]
    port: Option<u16>,

    /// Listen address, e.g. 0.0.0.0:8080.
    #[arg(long)]
    bind: Option<String>,

    /// Addressing strategy.
    #[arg(long, value_enum, global = true)]
    strategy: Option<StrategyArg>,

    /// SQLite URL for the mapping store.
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Codec,
    Store,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy (default)
    Serve,
    /// Print the label and public host for an origin URL
    Encode { url: String },
    /// Print the origin behind a label
    Decode { label: String },
    /// List the rows of the mapping store
    Mappings,
}

impl Cli {
    fn apply(&self, config: &mut ProxyConfig) {
        if let Some(domain) = &self.domain {
            config.domain.name = domain.clone();
        }
        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if let Some(port) = self.port {
            let host = config
                .listener
                .bind_address
                .rsplit_once(':')
                .map(|(host, _)| host.to_string())
                .unwrap_or_else(|| "0.0.0.0".to_string());
            config.listener.bind_address = format!("{}:{}", host, port);
        }
        if let Some(strategy) = self.strategy {
            config.addressing.strategy = match strategy {
                StrategyArg::Codec => Strategy::Codec,
                StrategyArg::Store => Strategy::Store,
            };
        }
        if let Some(url) = &self.database_url {
            config.addressing.database_url = url.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> CliResult {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };
    cli.apply(&mut config);

    logging::init(&config.observability.log_level);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Encode { url } => encode(&config, &url).await,
        Commands::Decode { label } => decode(&config, &label).await,
        Commands::Mappings => mappings(&config).await,
    }
}

async fn serve(config: ProxyConfig) -> CliResult {
    validate_config(&config).map_err(ConfigError::Validation)?;

    tracing::info!("subproxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        domain = %config.domain.name,
        strategy = ?config.addressing.strategy,
        follow_redirects = config.redirects.follow,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let strategy = addressing::from_config(&config.addressing).await?;
    let forwarder = Arc::new(Forwarder::from_config(&config, strategy)?);

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    tokio::spawn(signals::wait_for_signal(shutdown.clone()));

    HttpServer::new(config, forwarder)
        .run(listener, shutdown.signalled())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn encode(config: &ProxyConfig, raw: &str) -> CliResult {
    let url = Url::parse(raw)?;
    let origin = Origin::from_url(&url).ok_or_else(|| format!("{raw} has no host"))?;

    let strategy = addressing::from_config(&config.addressing).await?;
    let label = strategy.encode(&origin).await?;

    if !label.fits_dns() {
        eprintln!(
            "warning: label is {} characters, longer than a DNS label allows",
            label.as_str().len()
        );
    }
    if config.domain.name.trim().is_empty() {
        println!("{label}");
    } else {
        println!("{}", PublicDomain::from_config(&config.domain).url_for(&label, &url));
    }
    Ok(())
}

async fn decode(config: &ProxyConfig, label: &str) -> CliResult {
    let label = PublicDomain::label_from_host(label).unwrap_or(label);
    let strategy = addressing::from_config(&config.addressing).await?;
    println!("{}", strategy.decode(label).await?);
    Ok(())
}

async fn mappings(config: &ProxyConfig) -> CliResult {
    let store = MappingStore::connect(
        &config.addressing.database_url,
        config.addressing.max_connections.max(1),
    )
    .await?;

    for record in store.records().await? {
        println!("{}\t{}\t{}", record.id, record.target, record.original);
    }
    store.close().await;
    Ok(())
}
