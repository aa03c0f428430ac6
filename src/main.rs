use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use twistindex::address::{trim_trailing_zeros, AddressCodec};
use twistindex::api::{self, ApiState};
use twistindex::checkpoint::{CheckpointStore, FileCheckpointStore};
use twistindex::config::Settings;
use twistindex::engine::{CheckpointKeys, IndexerEngine};
use twistindex::metrics::init_metrics;
use twistindex::monitor::ScanScheduler;
use twistindex::rpc::{ChainSource, RpcChainSource};
use twistindex::telemetry::init_tracing;

#[derive(Parser, Debug)]
#[clap(name = "twistindex")]
#[clap(about = "Index TWIST identity and data transactions from a node's RPC", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Missing file means defaults plus environment.
    #[clap(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the node and serve the HTTP API (default)
    Run,
    /// Run one identity pass and one data pass, then exit
    ScanOnce,
    /// Print the addresses that carry TEXT
    Encode {
        text: String,
        /// Append a newline to multi-address text that has none
        #[clap(long)]
        newline: bool,
    },
    /// Check an address and print its payload
    Decode { address: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(settings).await,
        Command::ScanOnce => scan_once(settings).await,
        Command::Encode { text, newline } => {
            let codec = AddressCodec::new(settings.protocol.version_markers.clone());
            for address in codec.encode_text(&text, newline) {
                println!("{}", address);
            }
            Ok(())
        }
        Command::Decode { address } => {
            let codec = AddressCodec::new(settings.protocol.version_markers.clone());
            match codec.decode(&address) {
                Ok(payload) => {
                    let trimmed = trim_trailing_zeros(&payload);
                    println!("valid: true");
                    println!("payload: {}", hex::encode(payload));
                    println!("text: {}", String::from_utf8_lossy(trimmed));
                }
                Err(e) => println!("valid: false ({})", e),
            }
            Ok(())
        }
    }
}

struct Components {
    chain: Arc<RpcChainSource>,
    store: Arc<FileCheckpointStore>,
    engine: Arc<IndexerEngine>,
}

async fn build(settings: &Settings) -> Result<Components, Box<dyn std::error::Error>> {
    init_metrics()?;

    let chain = Arc::new(RpcChainSource::new(&settings.rpc)?);
    chain
        .wait_for_node(Duration::from_secs(settings.rpc.connect_retry_secs))
        .await;

    let data_dir = settings.storage.resolved_data_dir();
    info!(data_dir = %data_dir.display(), "Checkpoint directory");
    let store = Arc::new(FileCheckpointStore::new(data_dir));

    let engine = Arc::new(IndexerEngine::new(
        chain.clone(),
        store.clone(),
        settings.protocol.clone(),
        CheckpointKeys::from(&settings.storage),
        settings.scan.clone(),
    ));
    Ok(Components {
        chain,
        store,
        engine,
    })
}

async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let _guard = init_tracing(&settings.telemetry)?;
    let Components {
        chain,
        store,
        engine,
    } = build(&settings).await?;

    let chain: Arc<dyn ChainSource> = chain;
    let scheduler = ScanScheduler::new(
        engine,
        chain,
        Duration::from_secs(settings.scan.poll_interval_secs),
    );

    if settings.api.enabled {
        let store: Arc<dyn CheckpointStore> = store;
        let state = Arc::new(ApiState {
            store,
            keys: CheckpointKeys::from(&settings.storage),
            status: scheduler.status(),
        });
        let bind_addr = settings.api.bind_addr.clone();
        tokio::spawn(async move {
            if let Err(e) = api::serve(&bind_addr, state).await {
                error!(addr = %bind_addr, error = %e, "HTTP API stopped");
            }
        });
    }

    scheduler.run().await;
    Ok(())
}

async fn scan_once(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let _guard = init_tracing(&settings.telemetry)?;
    let Components { engine, .. } = build(&settings).await?;

    let identity = engine.run_identity_pass().await?;
    let data = engine.run_data_pass().await?;
    info!(
        identity_accepted = identity.accepted,
        data_accepted = data.accepted,
        tip = data.tip,
        "Scan complete"
    );
    Ok(())
}
