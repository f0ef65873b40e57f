use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nsevict::cli::seed::SeedStore;
use nsevict::cli::{self, Cli, Commands};
use nsevict::config::{BackendKind, NsEvictConfig};
use nsevict::evict::CancelToken;
use nsevict::storage::{KeyValueStore, MemoryStore, SledStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config_found = Path::new(&cli.config).exists();
    let mut config = NsEvictConfig::load_or_default(&cli.config)?;
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }

    // RUST_LOG wins over the config file
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if config_found {
        info!("Config loaded from {}", cli.config);
    } else {
        info!("Config file not found at '{}'. Using defaults.", cli.config);
    }

    let cancel = CancelToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the in-flight store call.");
            on_interrupt.cancel();
        }
    });

    let ok = match config.store.backend {
        BackendKind::Sled => {
            info!("Persistence: Opening Sled DB at '{}'...", config.store.path);
            let store = Arc::new(SledStore::open(&config.store.path)?);
            let ok = run(store.clone(), cli.command, &config, cancel).await?;
            store.flush().await?;
            ok
        }
        BackendKind::Memory => {
            warn!("Using the in-memory backend; nothing outlives this process.");
            run(Arc::new(MemoryStore::new()), cli.command, &config, cancel).await?
        }
    };

    if !ok {
        std::process::exit(2);
    }
    Ok(())
}

async fn run<S: KeyValueStore + SeedStore + 'static>(
    store: Arc<S>,
    command: Commands,
    config: &NsEvictConfig,
    cancel: CancelToken,
) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Commands::Evict(args) => {
            let ok = cli::evict::handle_evict_command(store, args, config.eviction.clone(), cancel)
                .await?;
            Ok(ok)
        }
        Commands::Scan { namespace, limit } => {
            cli::scan::handle_scan_command(&*store, &namespace, limit, &config.eviction).await?;
            Ok(true)
        }
        Commands::Put { key, value } => {
            cli::seed::handle_put_command(&*store, &key, &value)?;
            Ok(true)
        }
        Commands::Index { name, documents } => {
            cli::seed::handle_index_command(&*store, &name, &documents)?;
            Ok(true)
        }
    }
}
