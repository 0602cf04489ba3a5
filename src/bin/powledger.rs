#![forbid(unsafe_code)]
//! powledger command line: key handling and an in-process demo node

use clap::{Parser, Subcommand};
use colored::*;
use powledger::config::{load_config, Config};
use powledger::crypto::KeyPair;
use powledger::miner::{MiningOutcome, MiningStatus};
use powledger::node::Node;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "powledger.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generates a new key pair
    Keygen,
    /// Signs a transfer and prints it as JSON
    Sign {
        /// Hex-encoded secret key of the sender
        #[arg(long)]
        secret: String,
        /// Recipient identifier
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        amount: u64,
    },
    /// Runs a local node, mines blocks and performs one transfer
    Demo {
        /// Number of blocks to mine before the transfer
        #[arg(long, default_value_t = 2)]
        blocks: u32,
        /// Overrides the configured difficulty
        #[arg(long)]
        difficulty: Option<usize>,
    },
}

fn init_tracing(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(config.logging.max_level()?)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    init_tracing(&config)?;

    match cli.command {
        Commands::Keygen => {
            let keypair = KeyPair::generate();
            println!("{} {}", "public_key: ".bright_cyan(), keypair.public_key_hex());
            println!("{} {}", "private_key:".bright_cyan(), keypair.secret_key_hex());
        }
        Commands::Sign {
            secret,
            recipient,
            amount,
        } => {
            let keypair = KeyPair::from_secret_hex(&secret)?;
            let tx = keypair.sign_transfer(recipient, amount);
            println!("{}", serde_json::to_string_pretty(&tx)?);
        }
        Commands::Demo { blocks, difficulty } => {
            if let Some(difficulty) = difficulty {
                config.ledger.difficulty = difficulty;
            }
            run_demo(&config, blocks).await?;
        }
    }
    Ok(())
}

async fn run_demo(config: &Config, blocks: u32) -> Result<(), Box<dyn std::error::Error>> {
    let node = Node::new(config)?;
    let events = node.subscribe();

    let miner = KeyPair::generate();
    let friend = KeyPair::generate();
    let miner_id = config
        .miner
        .identifier
        .clone()
        .unwrap_or_else(|| miner.public_key_hex());

    println!("{}", format!("⛏  Mining {} block(s) for {}", blocks, miner_id).bright_yellow());
    for _ in 0..blocks {
        mine_once(&node, &miner_id).await?;
    }

    if miner_id == miner.public_key_hex() {
        let tx = miner.sign_transfer(friend.public_key_hex(), 1);
        match node.submit_transaction(tx) {
            Ok(pending) => println!("{}", format!("✓ Transfer queued, {} pending", pending.len()).green()),
            Err(e) => println!("{}", format!("✗ Transfer rejected: {}", e).red()),
        }
        mine_once(&node, &miner_id).await?;
        println!("balance(miner)  = {}", node.balance(&miner_id));
        println!("balance(friend) = {}", node.balance(&friend.public_key_hex()));
    }

    let view = node.chain_view();
    println!("{}", serde_json::to_string_pretty(&view)?);

    println!("{}", "Events:".bright_cyan().bold());
    while let Some(event) = events.recv_timeout(Duration::from_millis(50)) {
        println!("  {}", event.kind());
    }
    Ok(())
}

async fn mine_once(node: &Node, miner_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    match node.trigger_mining(miner_id, None)? {
        MiningStatus::Started(handle) => match handle.wait().await {
            MiningOutcome::Mined(block) => {
                println!("{}", format!("✓ Block #{} {}", block.index, block.hash).green());
            }
            MiningOutcome::Stale => println!("{}", "… search went stale".yellow()),
            MiningOutcome::Failed(e) => return Err(e.into()),
        },
        MiningStatus::AlreadyMining => println!("{}", "… already mining".yellow()),
    }
    Ok(())
}
