use clap::{Parser, Subcommand};
use eyre::{bail, WrapErr as _};
use evl_admission::classify_bytes;
use evl_feemarket::BaseFeeUpdate;
use evl_types::{parse_amount, Config, NodeConfig, Transaction};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_error::ErrorLayer;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{layer::SubscriberExt as _, EnvFilter, Layer as _, Registry};

#[derive(Debug, Clone, Parser)]
pub struct EvlCli {
    /// Node configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    #[command(name = "check-config", about = "Load and validate the configuration")]
    CheckConfig,
    #[command(
        name = "next-base-fee",
        about = "Project the base fee of the block after one that used the given gas"
    )]
    NextBaseFee {
        #[arg(long, help = "Gas used by the previous block")]
        gas_used: u64,
        #[arg(long, help = "Base fee to start from instead of the configured genesis value")]
        base_fee: Option<String>,
    },
    #[command(name = "classify", about = "Decode a hex-encoded transaction and report its lane")]
    Classify {
        #[arg(long)]
        tx: String,
    },
}

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = EvlCli::parse();

    let node_config = NodeConfig::from_toml_file(&args.config)?;
    init_tracing(&node_config.log_filter)?;
    let config = Config::new(node_config);

    match args.command {
        Commands::CheckConfig => {
            let eip155 = check_config(&config)?;
            info!(chain_id = %config.consensus.chain_id.as_str(), "configuration is valid");
            println!("{eip155}");
        }
        Commands::NextBaseFee { gas_used, base_fee } => {
            let update = project_base_fee(&config, gas_used, base_fee.as_deref())?;
            println!(
                "height {}: base fee {} -> {} (gas used {})",
                update.height, update.previous, update.next, update.gas_used
            );
        }
        Commands::Classify { tx } => {
            let tx = classify_hex(&tx)?;
            println!("lane: {}", tx.lane());
            println!("hash: {}", tx.hash());
            println!("gas limit: {}", tx.gas_limit());
            if let Transaction::EthereumFormatted(eth) = &tx {
                println!("declared sender: {}", eth.declared_from);
                println!("nonce: {}", eth.signed.nonce());
            }
        }
    }
    Ok(())
}

/// `RUST_LOG` wins over the configured filter.
fn init_tracing(default_filter: &str) -> eyre::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_filter)
            .wrap_err_with(|| format!("invalid log_filter {default_filter:?}"))?,
    };

    let output_layer = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_ansi(true)
        .with_file(true)
        .with_writer(std::io::stderr);

    Registry::default()
        .with(filter)
        .with(ErrorLayer::default())
        .with(output_layer.boxed())
        .try_init()?;
    Ok(())
}

fn check_config(config: &Config) -> eyre::Result<u64> {
    config.validate()?;
    Ok(config.consensus.chain_id.eip155())
}

/// Runs the updater once over the configured genesis fee market, as if the
/// block at `genesis_height` had used `gas_used`.
fn project_base_fee(config: &Config, gas_used: u64, base_fee: Option<&str>) -> eyre::Result<BaseFeeUpdate> {
    config.validate()?;
    let mut fee_market = config.consensus.fee_market.clone();
    if let Some(raw) = base_fee {
        fee_market.base_fee = parse_amount(raw).wrap_err_with(|| format!("invalid base fee {raw:?}"))?;
    }
    let height = config.node_config.genesis_height.saturating_add(1);
    debug!(height, gas_used, base_fee = %fee_market.base_fee, "projecting base fee");
    Ok(evl_feemarket::advance(&mut fee_market, height, gas_used)?)
}

fn classify_hex(raw: &str) -> eyre::Result<Transaction> {
    let raw = raw.trim();
    let raw = raw.strip_prefix("0x").unwrap_or(raw);
    if raw.is_empty() {
        bail!("empty transaction");
    }
    let bytes = hex::decode(raw).wrap_err("transaction is not valid hex")?;
    Ok(classify_bytes(&bytes)?)
}
