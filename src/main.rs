//! Vault coordinator CLI
//!
//! Create multisig vaults, propose spends, collect signatures and broadcast.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vault_coordinator::cli::{self, AppState, CliResult, Credentials};
use vault_coordinator::core::Network;

#[derive(Parser)]
#[command(name = "vault")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "M-of-N multisig vault coordination", long_about = None)]
struct Cli {
    /// Data directory shared by co-signers on this machine
    #[arg(short, long, default_value = ".vault_data", env = "VAULT_DATA_DIR")]
    data_dir: PathBuf,

    /// Network for new vaults and addresses
    #[arg(short, long, default_value = "testnet", env = "VAULT_NETWORK")]
    network: Network,

    /// Identity to act as
    #[arg(short, long, env = "VAULT_IDENTITY")]
    identity: Option<String>,

    /// Hex private key used for signing and broadcast
    #[arg(long, env = "VAULT_PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Fee rate for new drafts (duffs per byte)
    #[arg(long, default_value = "1")]
    fee_rate: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair
    Keygen,

    /// Identity operations
    Identity {
        #[command(subcommand)]
        action: IdentityCommands,
    },

    /// Vault operations
    Vault {
        #[command(subcommand)]
        action: VaultCommands,
    },

    /// Draft operations
    Tx {
        #[command(subcommand)]
        action: TxCommands,
    },

    /// Signature operations
    Sig {
        #[command(subcommand)]
        action: SigCommands,
    },

    /// Start the REST API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[derive(Subcommand)]
enum IdentityCommands {
    /// Publish the public key an identity signs with
    Register {
        /// Identity id (defaults to --identity)
        #[arg(long)]
        id: Option<String>,

        /// Hex public key (defaults to the key of --private-key)
        #[arg(long)]
        public_key: Option<String>,
    },
}

#[derive(Subcommand)]
enum VaultCommands {
    /// Create a vault
    Create {
        /// Signer identities, in key order (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        identities: Vec<String>,

        /// Explicit public keys matching --identities (comma-separated)
        #[arg(long, value_delimiter = ',')]
        keys: Vec<String>,

        /// Required signatures
        #[arg(short, long)]
        threshold: u8,
    },

    /// List vaults
    List {
        /// Only vaults this identity signs for
        #[arg(long)]
        signer: Option<String>,

        /// Query the store instead of the cache
        #[arg(long)]
        refresh: bool,
    },
}

#[derive(Subcommand)]
enum TxCommands {
    /// Propose a spend from a vault
    Create {
        #[arg(long)]
        vault: String,

        /// Vault-owned output as txid:vout:duffs (repeatable)
        #[arg(long = "utxo", required = true)]
        utxos: Vec<String>,

        /// Destination address
        #[arg(long)]
        to: String,

        /// Amount in duffs
        #[arg(short, long)]
        amount: u64,

        /// Override the fee rate for this draft
        #[arg(long)]
        fee_rate: Option<u64>,
    },

    /// List drafts of a vault
    List {
        #[arg(long)]
        vault: String,

        #[arg(long)]
        refresh: bool,
    },

    /// Show signing progress
    Status { id: String },

    /// Sign every input with --private-key
    Sign { id: String },

    /// Broadcast a fully signed draft
    Execute { id: String },
}

#[derive(Subcommand)]
enum SigCommands {
    /// List signatures shared for a draft
    List {
        id: String,

        #[arg(long)]
        refresh: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> CliResult<()> {
    // Keygen is the only command that works without a data directory
    let open_state = || {
        let credentials = Credentials {
            identity_id: cli.identity.clone(),
            private_key: cli.private_key.clone(),
        };
        AppState::new(cli.data_dir.clone(), cli.network, cli.fee_rate, credentials)
    };

    match cli.command {
        Commands::Keygen => {
            cli::cmd_keygen(cli.network)?;
        }

        Commands::Identity { action } => match action {
            IdentityCommands::Register { id, public_key } => {
                let state = open_state()?;
                let id = id
                    .or_else(|| cli.identity.clone())
                    .ok_or("pass --id or set VAULT_IDENTITY")?;
                cli::cmd_identity_register(&state, &id, public_key, cli.private_key.as_deref())
                    .await?;
            }
        },

        Commands::Vault { action } => {
            let mut state = open_state()?;
            match action {
                VaultCommands::Create {
                    identities,
                    keys,
                    threshold,
                } => {
                    cli::cmd_vault_create(&mut state, identities, keys, threshold, Some(cli.network))
                        .await?;
                }
                VaultCommands::List { signer, refresh } => {
                    cli::cmd_vault_list(&mut state, signer, refresh).await?;
                }
            }
        }

        Commands::Tx { action } => {
            let mut state = open_state()?;
            match action {
                TxCommands::Create {
                    vault,
                    utxos,
                    to,
                    amount,
                    fee_rate,
                } => {
                    cli::cmd_tx_create(&mut state, &vault, &utxos, &to, amount, fee_rate).await?;
                }
                TxCommands::List { vault, refresh } => {
                    cli::cmd_tx_list(&mut state, &vault, refresh).await?;
                }
                TxCommands::Status { id } => {
                    cli::cmd_tx_status(&mut state, &id).await?;
                }
                TxCommands::Sign { id } => {
                    cli::cmd_tx_sign(&mut state, &id).await?;
                }
                TxCommands::Execute { id } => {
                    cli::cmd_tx_execute(&mut state, &id).await?;
                }
            }
        }

        Commands::Sig { action } => match action {
            SigCommands::List { id, refresh } => {
                let mut state = open_state()?;
                cli::cmd_sig_list(&mut state, &id, refresh).await?;
            }
        },

        Commands::Serve { host, port } => {
            cli::cmd_serve(open_state()?, &host, port).await?;
        }
    }

    Ok(())
}
