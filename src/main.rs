use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use clap::Parser;
use nanochain_core::blockchain::{Blockchain, NetworkParams};
use nanochain_core::mining::{Miner, NodeState};
use nanochain_core::wallet::Wallet;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nanochain")]
#[command(about = "A minimal UTXO-based cryptocurrency node")]
#[command(version)]
struct Cli {
    /// Directory holding the wallet key and block log by default.
    #[arg(long, default_value = ".")]
    data_dir: PathBuf,

    /// Path to the PEM-encoded wallet private key.
    #[arg(long)]
    wallet_file: Option<PathBuf>,

    /// Path to the on-disk block log.
    #[arg(long)]
    chain_file: Option<PathBuf>,

    /// Log verbosity (trace, debug, info, warn, error); overridden by `RUST_LOG`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Number of blocks between difficulty recomputations.
    #[arg(long, default_value_t = 5)]
    retarget_interval: u64,

    /// Target seconds per block over one retarget interval.
    #[arg(long, default_value_t = 2)]
    target_block_time: u32,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| cli.log_level.clone().into()))
        .init();

    let wallet_path = cli.wallet_file.clone().unwrap_or_else(|| cli.data_dir.join("wallet.pem"));
    let chain_path = cli.chain_file.clone().unwrap_or_else(|| cli.data_dir.join("blockchain.dat"));

    let wallet = match Wallet::load_or_generate(&wallet_path) {
        Ok(w) => w,
        Err(e) => {
            eprintln!("Error: failed to load wallet: {e}");
            std::process::exit(1);
        }
    };

    let params = NetworkParams {
        retarget_interval: cli.retarget_interval,
        target_block_time: cli.target_block_time,
        subsidy: nanochain_core::mining::SUBSIDY,
    };
    let genesis_timestamp = now();
    let chain = match Blockchain::load_or_new(&chain_path, params, &wallet.address(), genesis_timestamp) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: failed to load blockchain: {e}");
            std::process::exit(1);
        }
    };
    info!(height = chain.height(), "node ready");

    let state = Arc::new(Mutex::new(NodeState::new(chain)));
    let mut miner = Miner::new(Arc::clone(&state), wallet.address());

    let exit_code = run_repl(&wallet, &state, &mut miner, &chain_path);
    std::process::exit(exit_code);
}

fn run_repl(
    wallet: &Wallet,
    state: &Arc<Mutex<NodeState>>,
    miner: &mut Miner,
    chain_path: &std::path::Path,
) -> i32 {
    let stdin = io::stdin();
    loop {
        print!("> ");
        if io::stdout().flush().is_err() {
            return 1;
        }
        let mut line = String::new();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or("");
        let rest: Vec<&str> = parts.collect();

        match command {
            "start" => {
                miner.start();
                println!("miner started");
            }
            "stop" => {
                miner.stop();
                println!("miner stopped");
            }
            "mine" => {
                let count: u32 = rest.first().and_then(|s| s.parse().ok()).unwrap_or(1);
                match miner.mine_manual(count) {
                    Ok(hashes) => {
                        for hash in hashes {
                            println!("mined {hash}");
                        }
                    }
                    Err(e) => println!("Error: {e}"),
                }
            }
            "send" => match (rest.first(), rest.get(1).and_then(|s| s.parse::<i64>().ok())) {
                (Some(to), Some(amount)) => {
                    let guard = state.lock().expect("state mutex poisoned");
                    match wallet.create_transaction(to, amount, &guard.chain) {
                        Ok(tx) => {
                            let txid = tx.id();
                            drop(guard);
                            state.lock().expect("state mutex poisoned").mempool.push(tx);
                            println!("queued transaction {txid}");
                        }
                        Err(e) => println!("Error: {e}"),
                    }
                }
                _ => println!("usage: send <addr> <amount-in-satoshi>"),
            },
            "balance" => {
                let address = rest.first().map_or_else(|| wallet.address(), |s| (*s).to_string());
                let balance = state.lock().expect("state mutex poisoned").chain.get_balance(&address);
                println!("{balance}");
            }
            "address" => {
                println!("address: {}", wallet.address());
                println!("public key: {}", hex::encode(wallet.keypair.public_key.to_bytes()));
            }
            "chain" => {
                let guard = state.lock().expect("state mutex poisoned");
                let stats = guard.chain.stats();
                for (height, block) in guard.chain.blocks().iter().enumerate() {
                    println!(
                        "{height}  {}  txs={}",
                        block.hash(),
                        block.transactions.len()
                    );
                }
                println!("difficulty: {}", stats.current_difficulty);
            }
            "mempool" => {
                let guard = state.lock().expect("state mutex poisoned");
                for tx in guard.mempool.snapshot() {
                    println!(
                        "{}  inputs={} outputs={}",
                        tx.id(),
                        tx.inputs.len(),
                        tx.outputs.len()
                    );
                }
            }
            "help" => print_help(),
            "exit" => {
                miner.stop();
                let guard = state.lock().expect("state mutex poisoned");
                if let Err(e) = guard.chain.save_to_disk(chain_path) {
                    eprintln!("Error: failed to save blockchain: {e}");
                    return 1;
                }
                return 0;
            }
            other => println!("unknown command: {other} (try `help`)"),
        }
    }
    miner.stop();
    0
}

fn print_help() {
    println!("commands:");
    println!("  start                          start the background miner");
    println!("  stop                           stop the background miner");
    println!("  mine [N]                       synchronously mine N blocks (default 1)");
    println!("  send <addr> <amount>           build, sign, and queue a transaction");
    println!("  balance [addr]                 show the balance of addr (default: own)");
    println!("  address                        show this wallet's address and public key");
    println!("  chain                          list blocks and the current difficulty");
    println!("  mempool                        list pending transactions");
    println!("  help                           show this summary");
    println!("  exit                           stop the miner, save, and quit");
}

fn now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs() as u32
}
