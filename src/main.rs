use log::{error, info, warn};

use pow_ledger::blockchain::miner::{shared, Miner};
use pow_ledger::blockchain::{Address, Blockchain};
use pow_ledger::config::{load_config, LedgerConfig};

// Build the ledger from the config, granting its opening allocations
fn initialize_blockchain(config: &LedgerConfig) -> anyhow::Result<Blockchain> {
    let blockchain = Blockchain::from_config(config)?;
    info!(
        "Ledger ready: difficulty {}, reward {}, {} allocations",
        blockchain.difficulty(),
        blockchain.mining_reward(),
        blockchain.allocations().len()
    );
    Ok(blockchain)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = load_config(&config_path)?;
    info!("Loaded configuration from {}", config_path);

    let ledger = shared(initialize_blockchain(&config)?);
    let miner = Miner::new(ledger.clone(), config.miner_address.parse::<Address>()?);

    // Ctrl-C aborts the running search
    let cancel = miner.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling proof-of-work");
            cancel.cancel();
        }
    });

    for _ in 0..config.blocks_to_mine {
        if let Err(err) = miner.mine().await {
            error!("Mining stopped: {}", err);
            break;
        }
    }

    let ledger = ledger
        .lock()
        .map_err(|e| anyhow::anyhow!("ledger lock poisoned: {}", e))?;

    match ledger.validate_chain() {
        Ok(()) => info!("The blockchain is valid ({} blocks)", ledger.len()),
        Err(violation) => error!("{}", violation),
    }

    println!("{}", ledger.to_json()?);
    println!("{}", serde_json::to_string_pretty(&ledger.get_account_state().get_all_accounts())?);

    Ok(())
}
