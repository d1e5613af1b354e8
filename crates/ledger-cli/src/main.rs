use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use ledger_core::{Block, ChainConfig, Ledger, Wallets};
use ledger_storage::SledStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Single-node UTXO ledger with proof of work")]
struct Cli {
    #[command(flatten)]
    opts: GlobalOpts,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Data directory for sled
    #[arg(long, global = true, env = "LEDGER_DATA_DIR", default_value = "./data")]
    data_dir: PathBuf,

    /// JSON file holding the wallet key pairs
    #[arg(long, global = true, env = "LEDGER_WALLET_FILE", default_value = "./wallets.json")]
    wallet_file: PathBuf,

    /// Proof-of-work difficulty in bits (1..=255)
    #[arg(long, global = true, env = "LEDGER_DIFFICULTY")]
    difficulty: Option<u32>,

    /// Coinbase reward
    #[arg(long, global = true, env = "LEDGER_SUBSIDY")]
    subsidy: Option<u64>,

    /// Memo stored in the genesis coinbase
    #[arg(long, global = true, env = "LEDGER_GENESIS_MEMO")]
    genesis_memo: Option<String>,

    /// Search nonces on all cores
    #[arg(long, global = true, env = "LEDGER_PARALLEL_MINING")]
    parallel_mining: bool,
}

impl GlobalOpts {
    fn chain_config(&self) -> Result<ChainConfig> {
        let mut config = ChainConfig::default();
        if let Some(d) = self.difficulty {
            config = config.with_difficulty(d);
        }
        if let Some(s) = self.subsidy {
            config = config.with_subsidy(s);
        }
        if let Some(memo) = &self.genesis_memo {
            config.genesis_memo = memo.clone();
        }
        config.parallel_mining = self.parallel_mining;
        config.validate().context("invalid chain configuration")?;
        Ok(config)
    }

    fn open_store(&self) -> Result<Arc<SledStore>> {
        let store = SledStore::open(&self.data_dir)
            .with_context(|| format!("opening store at {}", self.data_dir.display()))?;
        Ok(Arc::new(store))
    }

    fn open_ledger(&self) -> Result<Ledger<SledStore>> {
        Ledger::open(self.open_store()?, self.chain_config()?).context("opening blockchain")
    }

    fn load_wallets(&self) -> Result<Wallets> {
        Wallets::load(&self.wallet_file)
            .with_context(|| format!("loading wallets from {}", self.wallet_file.display()))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a blockchain and send the genesis reward to ADDRESS
    CreateChain {
        #[arg(long)]
        address: String,
    },
    /// Generate a new key pair and save it to the wallet file
    CreateWallet,
    /// List the addresses stored in the wallet file
    ListAddresses,
    /// Sum of unspent outputs locked to ADDRESS
    GetBalance {
        #[arg(long)]
        address: String,
    },
    /// Send AMOUNT from FROM to TO and mine the block
    Send {
        #[arg(long)]
        from: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        amount: u64,
    },
    /// Print every block, newest first
    PrintChain {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Mine a coinbase-only block carrying DATA, rewarding ADDRESS
    AddBlock {
        #[arg(long)]
        data: String,
        #[arg(long)]
        address: String,
    },
    /// Rebuild the UTXO index from the chain
    ReindexUtxo,
}

#[derive(Serialize)]
struct InputView {
    txid: String,
    vout: i64,
    signature: String,
    public_key: String,
}

#[derive(Serialize)]
struct OutputView {
    value: u64,
    locking_hash: String,
}

#[derive(Serialize)]
struct TxView {
    id: String,
    coinbase: bool,
    inputs: Vec<InputView>,
    outputs: Vec<OutputView>,
}

#[derive(Serialize)]
struct BlockView {
    hash: String,
    prev_hash: String,
    timestamp: i64,
    nonce: i64,
    merkle_root: String,
    pow_valid: bool,
    transactions: Vec<TxView>,
}

impl BlockView {
    fn new(block: &Block, pow_valid: bool) -> Self {
        Self {
            hash: block.hash_hex(),
            prev_hash: hex::encode(&block.prev_hash),
            timestamp: block.timestamp,
            nonce: block.nonce,
            merkle_root: hex::encode(block.merkle_root()),
            pow_valid,
            transactions: block
                .transactions
                .iter()
                .map(|tx| TxView {
                    id: hex::encode(&tx.id),
                    coinbase: tx.is_coinbase(),
                    inputs: tx
                        .inputs
                        .iter()
                        .map(|i| InputView {
                            txid: hex::encode(&i.txid),
                            vout: i.vout,
                            signature: hex::encode(&i.signature),
                            public_key: hex::encode(&i.public_key),
                        })
                        .collect(),
                    outputs: tx
                        .outputs
                        .iter()
                        .map(|o| OutputView {
                            value: o.value,
                            locking_hash: hex::encode(&o.locking_hash),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    fn print(&self) {
        println!("============ Block {} ============", self.hash);
        println!("Prev. hash:  {}", self.prev_hash);
        println!("Timestamp:   {}", self.timestamp);
        println!("Nonce:       {}", self.nonce);
        println!("Merkle root: {}", self.merkle_root);
        println!("PoW:         {}", self.pow_valid);
        for tx in &self.transactions {
            println!("--- Transaction {}{}", tx.id, if tx.coinbase { " (coinbase)" } else { "" });
            for (n, i) in tx.inputs.iter().enumerate() {
                println!("  Input {n}: txid={} vout={}", i.txid, i.vout);
            }
            for (n, o) in tx.outputs.iter().enumerate() {
                println!("  Output {n}: value={} locking_hash={}", o.value, o.locking_hash);
            }
        }
        println!();
    }
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let opts = &cli.opts;
    match cli.cmd {
        Command::CreateChain { address } => {
            let ledger = Ledger::create(opts.open_store()?, opts.chain_config()?, &address)
                .context("creating blockchain")?;
            println!("Done! genesis {}", hex::encode(ledger.chain().tip()?));
        }
        Command::CreateWallet => {
            let mut wallets = opts.load_wallets()?;
            let address = wallets.create_wallet();
            wallets.save().context("saving wallet file")?;
            println!("Your new address: {address}");
        }
        Command::ListAddresses => {
            let wallets = opts.load_wallets()?;
            if wallets.is_empty() {
                info!(file = %opts.wallet_file.display(), "no wallets yet");
            }
            for address in wallets.addresses() {
                println!("{address}");
            }
        }
        Command::GetBalance { address } => {
            let ledger = opts.open_ledger()?;
            let balance = ledger.balance(&address)?;
            println!("Balance of '{address}': {balance}");
        }
        Command::Send { from, to, amount } => {
            if amount == 0 {
                bail!("amount must be positive");
            }
            let wallets = opts.load_wallets()?;
            let wallet = wallets
                .get(&from)
                .with_context(|| format!("sender {from} is not in the wallet file"))?;
            let ledger = opts.open_ledger()?;
            let block = ledger.send(wallet, &to, amount).context("sending")?;
            println!("Success! block {}", block.hash_hex());
        }
        Command::PrintChain { json } => {
            let ledger = opts.open_ledger()?;
            let pow = ledger.chain().pow();
            let mut views = Vec::new();
            for block in ledger.chain().iter()? {
                let block = block?;
                views.push(BlockView::new(&block, pow.validate(&block)));
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&views)?);
            } else {
                views.iter().for_each(BlockView::print);
            }
        }
        Command::AddBlock { data, address } => {
            let ledger = opts.open_ledger()?;
            let block = ledger.add_block(&data, &address).context("adding block")?;
            println!("Mined block {}", block.hash_hex());
        }
        Command::ReindexUtxo => {
            let ledger = opts.open_ledger()?;
            let count = ledger.reindex()?;
            println!("Done! There are {count} transactions in the UTXO set.");
        }
    }
    Ok(())
}
