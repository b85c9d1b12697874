//! Intent Indexer CLI
//!
//! Entry point for the indexer binary. Provides subcommands for:
//! - `run` - Start the ingestion service
//! - `catchup` - Sweep an explicit block range for one chain
//! - `migrate` - Run database migrations
//! - `version` - Show version information

use std::sync::Arc;

use clap::{Parser, Subcommand};
use eyre::WrapErr;
use tracing::info;

use intent_indexer::chain::StaticResolver;
use intent_indexer::config::{LoggingSettings, Settings};
use intent_indexer::ingest::{CatchupFetcher, EventDecoder, EventProcessor, IngestionService};
use intent_indexer::ports::ClientResolver;
use intent_indexer::store::PostgresStore;
use intent_indexer::types::enums::EventFamily;
use intent_indexer::types::primitives::{BlockNumber, ChainId};

/// Intent protocol event indexer
#[derive(Parser, Debug)]
#[command(name = "intent-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Environment name (selects config/{env}.toml)
    #[arg(short, long, default_value = "development", env = "INDEXER_ENV")]
    environment: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the ingestion service
    Run,

    /// Sweep an explicit block range for one chain
    Catchup {
        /// Chain id to sweep
        #[arg(long)]
        chain: u64,

        /// Starting block number (inclusive)
        #[arg(long)]
        from: u64,

        /// Ending block number (inclusive)
        #[arg(long)]
        to: u64,
    },

    /// Run database migrations
    Migrate,

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if matches!(cli.command, Commands::Version) {
        println!("intent-indexer {}", intent_indexer::VERSION);
        return Ok(());
    }

    let settings =
        Settings::load(&cli.environment).wrap_err("failed to load configuration")?;
    if let Err(errors) = settings.validate() {
        eyre::bail!("invalid configuration:\n  - {}", errors.join("\n  - "));
    }

    init_tracing(&settings.logging);
    info!(
        version = intent_indexer::VERSION,
        environment = %cli.environment,
        "Starting intent indexer"
    );

    match cli.command {
        Commands::Run => run(settings).await,
        Commands::Catchup { chain, from, to } => catchup(settings, chain, from, to).await,
        Commands::Migrate => migrate(settings).await,
        Commands::Version => unreachable!("handled above"),
    }
}

/// Run the service until SIGINT/SIGTERM, then shut down within the
/// configured deadline.
async fn run(settings: Settings) -> eyre::Result<()> {
    if settings.metrics.enabled {
        let addr: std::net::SocketAddr = settings
            .metrics
            .socket_addr()
            .parse()
            .wrap_err("invalid metrics address")?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .wrap_err("failed to install Prometheus exporter")?;
        info!(%addr, "Prometheus exporter listening");
    }

    let store = PostgresStore::connect(&settings.database)
        .await
        .wrap_err("failed to connect to database")?;
    store
        .run_migrations()
        .await
        .map_err(|e| eyre::eyre!("{e}"))?;

    let resolver = StaticResolver::connect_all(&settings)
        .await
        .map_err(|e| eyre::eyre!("{e}"))?;

    let service = IngestionService::new(settings, Arc::new(store), Arc::new(resolver))
        .map_err(|e| eyre::eyre!("{e}"))?;
    service.start().await.map_err(|e| eyre::eyre!("{e}"))?;

    wait_for_signal().await;
    info!("Signal received, shutting down");

    if let Err(e) = service.shutdown().await {
        // Report and keep exiting; stragglers die with the process
        tracing::error!(error = %e, "Shutdown incomplete");
    }
    Ok(())
}

/// One manual catch-up sweep over `[from, to]` for every family.
async fn catchup(settings: Settings, chain: u64, from: u64, to: u64) -> eyre::Result<()> {
    let chain = ChainId::new(chain);
    if settings.chain(chain).is_none() {
        eyre::bail!("chain {chain} is not configured");
    }

    let store = Arc::new(
        PostgresStore::connect(&settings.database)
            .await
            .wrap_err("failed to connect to database")?,
    );
    let resolver: Arc<dyn ClientResolver> = Arc::new(
        StaticResolver::connect_all(&settings)
            .await
            .map_err(|e| eyre::eyre!("{e}"))?,
    );

    let decoder = EventDecoder::new(
        intent_indexer::abi::INTENT_GATEWAY_ABI,
        settings.supported_chains(),
    )
    .map_err(|e| eyre::eyre!("{e}"))?;
    let processor = Arc::new(EventProcessor::new(
        Arc::clone(&store),
        Arc::clone(&resolver),
        decoder,
    ));
    let fetcher = CatchupFetcher::new(store, resolver, processor, settings.fetch, &settings.chains)
        .map_err(|e| eyre::eyre!("{e}"))?;

    for family in EventFamily::ALL {
        let count = fetcher
            .catch_up_range(chain, family, BlockNumber::new(from), BlockNumber::new(to))
            .await
            .map_err(|e| eyre::eyre!("{e}"))?;
        info!(%chain, %family, count, "Range sweep complete");
    }
    Ok(())
}

/// Apply pending migrations and exit.
async fn migrate(settings: Settings) -> eyre::Result<()> {
    let store = PostgresStore::connect(&settings.database)
        .await
        .wrap_err("failed to connect to database")?;
    store
        .run_migrations()
        .await
        .map_err(|e| eyre::eyre!("{e}"))?;
    info!("Migrations applied");
    Ok(())
}

fn init_tracing(logging: &LoggingSettings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Wait for SIGINT or SIGTERM.
async fn wait_for_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(_) => {
                let _ = ctrl_c.await;
                return;
            }
        };
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
