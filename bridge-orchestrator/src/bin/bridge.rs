//! Bridge CLI
//!
//! Runs transfers and reads balances against the chains in the configuration file.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin bridge -- --config config/bridge.toml transfer --from 84532 --to 11155111 --amount 10
//! cargo run --bin bridge -- balances
//! cargo run --bin bridge -- classify 0x095ea7b3...
//! ```
//!
//! Or set the config path via environment variable:
//!
//! ```bash
//! BRIDGE_CONFIG_PATH=config/bridge.toml cargo run --bin bridge -- balances
//! ```

use anyhow::{Context, Result};
use bridge_orchestrator::{
    chains::{ChainRegistry, StaticChainRegistry},
    config::BridgeConfig,
    crypto::{AuthorizationSigner, LocalKeySigner},
    progress::{ChannelObserver, ProgressObserver},
    service::{fetch_balances, BridgeOrchestrator, TransferRequest},
    transport::{RpcWalletTransport, Transport},
    TransactionClassifier,
};
use chain_clients_common::addresses_equal;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "bridge")]
#[command(about = "Move USDC between EVM networks, optionally with sponsored gas")]
struct Args {
    /// Path to configuration file (default: config/bridge.toml or BRIDGE_CONFIG_PATH env var)
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer on one chain or bridge between two chains
    Transfer {
        /// Source chain ID
        #[arg(long)]
        from: u64,
        /// Destination chain ID (same as --from for a same-chain transfer)
        #[arg(long)]
        to: u64,
        /// Decimal amount, e.g. 12.5
        #[arg(long)]
        amount: String,
        /// Recipient address (defaults to the wallet address for bridges)
        #[arg(long)]
        recipient: Option<String>,
        /// Request gas sponsorship for eligible steps
        #[arg(long)]
        sponsor: bool,
    },
    /// Show USDC balances on every configured chain
    Balances {
        /// Address to query (defaults to the wallet address)
        #[arg(long)]
        address: Option<String>,
    },
    /// Classify raw call data
    Classify {
        /// Hex call data
        calldata: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments first (before initializing logging)
    let args = Args::parse();

    // Initialize structured logging
    tracing_subscriber::fmt::init();

    // Load configuration
    // Priority: CLI arg > env var > default
    let config = if let Some(path) = args.config.as_deref() {
        info!("Loading configuration from: {}", path);
        BridgeConfig::load_from_path(Some(path))?
    } else {
        if let Ok(path) = std::env::var("BRIDGE_CONFIG_PATH") {
            info!("Loading configuration from BRIDGE_CONFIG_PATH: {}", path);
        } else {
            info!("Loading configuration from default location");
        }
        BridgeConfig::load()?
    };
    info!("Configuration loaded: {} chain(s)", config.chain.len());

    match args.command {
        Command::Transfer {
            from,
            to,
            amount,
            recipient,
            sponsor,
        } => {
            run_transfer(
                &config,
                TransferRequest {
                    amount,
                    source_chain: from,
                    destination_chain: to,
                    user_address: config.wallet.address.clone(),
                    recipient_address: recipient,
                    sponsorship_requested: sponsor,
                },
            )
            .await
        }
        Command::Balances { address } => {
            let registry = StaticChainRegistry::from_config(&config);
            let owner = address.unwrap_or_else(|| config.wallet.address.clone());
            let balances = fetch_balances(&registry.all(), &owner).await;
            println!("{}", serde_json::to_string_pretty(&balances)?);
            Ok(())
        }
        Command::Classify { calldata } => {
            let classifier = TransactionClassifier::new(&config.classifier);
            println!("{:?}", classifier.classify_hex(&calldata));
            Ok(())
        }
    }
}

async fn run_transfer(config: &BridgeConfig, request: TransferRequest) -> Result<()> {
    let registry: Arc<dyn ChainRegistry> = Arc::new(StaticChainRegistry::from_config(config));
    let source_chain = registry.describe(request.source_chain);
    let transport: Arc<dyn Transport> = Arc::new(RpcWalletTransport::new(
        registry,
        &config.wallet.address,
        request.source_chain,
    )?);

    // The key is only needed to authorize sponsored operations
    let signer: Option<Arc<dyn AuthorizationSigner>> =
        if request.sponsorship_requested && config.service.sponsorship_enabled {
            match LocalKeySigner::from_env(&config.wallet.private_key_env) {
                Ok(signer) => {
                    // A key for another account would delegate the wrong account
                    anyhow::ensure!(
                        addresses_equal(&signer.address(), &config.wallet.address),
                        "Key in {} belongs to {}, not to wallet address {}",
                        config.wallet.private_key_env,
                        signer.address(),
                        config.wallet.address
                    );
                    Some(Arc::new(signer))
                }
                Err(e) => {
                    warn!("No authorization signer available, sponsored steps will fail: {:#}", e);
                    None
                }
            }
        } else {
            None
        };

    let orchestrator = BridgeOrchestrator::from_config(config, transport, signer)
        .context("Failed to create orchestrator")?;

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let observer: Arc<dyn ProgressObserver> = Arc::new(ChannelObserver(tx));
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match &event.tx_hash {
                Some(hash) => println!("[{}] {:?} {} ({})", event.step, event.status, event.description, hash),
                None => println!("[{}] {:?} {}", event.step, event.status, event.description),
            }
        }
    });

    let outcome = orchestrator.transfer(request, Some(observer)).await;
    // The reporter (and with it the sender) is gone once transfer returns
    printer.await.context("Progress printer failed")?;

    let outcome = outcome?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let (Some(chain), Some(hash)) = (source_chain, outcome.source_tx_hash.as_deref()) {
        if let Some(url) = chain.explorer_tx_url(hash) {
            println!("Source transaction: {}", url);
        }
    }
    Ok(())
}
