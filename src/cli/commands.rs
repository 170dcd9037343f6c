//! CLI commands for the vault coordinator
//!
//! Every command builds a typed `Request`, runs it through the coordinator
//! and prints the `Response`.

use crate::api::{self, ApiState};
use crate::coordinator::{Coordinator, CoordinatorConfig, Request, Response};
use crate::core::{Address, FeeRate, Network, Utxo};
use crate::crypto::KeyPair;
use crate::multisig::{InputState, TransactionDraft, Vault};
use crate::store::{JsonFileStore, StoreConfig};
use crate::wallet::LocalAccount;
use std::path::PathBuf;
use std::sync::Arc;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Who the CLI acts as
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub identity_id: Option<String>,
    pub private_key: Option<String>,
}

/// Application state
pub struct AppState {
    pub coordinator: Coordinator,
    pub store: Arc<JsonFileStore>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Open the file store and attach the signer account, if any
    pub fn new(
        data_dir: PathBuf,
        network: Network,
        fee_rate: u64,
        credentials: Credentials,
    ) -> CliResult<Self> {
        let store = Arc::new(JsonFileStore::open(StoreConfig::with_data_dir(&data_dir))?);
        let config = CoordinatorConfig {
            network,
            fee_rate: FeeRate::from_sat_per_byte(fee_rate),
            data_dir: data_dir.clone(),
            identity_id: credentials.identity_id.clone(),
            ..Default::default()
        };

        let mut coordinator = Coordinator::new(store.clone(), store.clone(), config);
        match (credentials.identity_id, credentials.private_key) {
            (Some(identity_id), Some(private_key)) => {
                let account = LocalAccount::from_private_key(&identity_id, &private_key)?
                    .with_outbox_dir(&data_dir);
                log::debug!("Acting as {} ({})", identity_id, account.public_key());
                coordinator = coordinator.with_account(Arc::new(account));
            }
            (None, Some(_)) => {
                return Err("a private key needs --identity as well".into());
            }
            _ => {}
        }

        Ok(Self {
            coordinator,
            store,
            data_dir,
        })
    }

    async fn run(&mut self, request: Request) -> CliResult<Response> {
        Ok(self.coordinator.handle(request).await?)
    }
}

// ============================================================================
// Keys & identities
// ============================================================================

/// Generate a key pair
pub fn cmd_keygen(network: Network) -> CliResult<()> {
    let key = KeyPair::generate();
    println!("🔑 New key pair");
    println!("   Private key: {}", key.private_key_hex());
    println!("   Public key:  {}", key.public_key_hex());
    println!(
        "   Address:     {}",
        Address::p2pkh(&key.public_key, network)
    );
    println!("\n⚠️  Keep the private key secret. Export it as VAULT_PRIVATE_KEY to sign.");
    Ok(())
}

/// Publish the public key an identity signs with
pub async fn cmd_identity_register(
    state: &AppState,
    identity_id: &str,
    public_key: Option<String>,
    private_key: Option<&str>,
) -> CliResult<()> {
    let public_key = match (public_key, private_key) {
        (Some(public_key), _) => public_key,
        (None, Some(private_key)) => KeyPair::from_private_key_hex(private_key)?.public_key_hex(),
        (None, None) => return Err("pass --public-key or set VAULT_PRIVATE_KEY".into()),
    };
    state.store.register_identity(identity_id, &public_key).await?;
    println!("✅ Registered {} with key {}", identity_id, public_key);
    Ok(())
}

// ============================================================================
// Vaults
// ============================================================================

/// Create a vault from identities, resolving keys unless given
pub async fn cmd_vault_create(
    state: &mut AppState,
    identity_ids: Vec<String>,
    public_keys: Vec<String>,
    threshold: u8,
    network: Option<Network>,
) -> CliResult<()> {
    let request = if public_keys.is_empty() {
        Request::CreateVaultFromIdentities {
            identity_ids,
            threshold,
            network,
        }
    } else {
        Request::CreateVault {
            identity_ids,
            public_keys,
            threshold,
            network,
        }
    };
    let response = state.run(request).await?;
    print_response(&response);
    Ok(())
}

/// List vaults
pub async fn cmd_vault_list(
    state: &mut AppState,
    signer: Option<String>,
    refresh: bool,
) -> CliResult<()> {
    let response = state
        .run(Request::ListVaults {
            signer,
            vault_id: None,
            refresh,
        })
        .await?;
    print_response(&response);
    Ok(())
}

async fn find_vault(state: &mut AppState, vault_id: &str) -> CliResult<Vault> {
    let response = state
        .run(Request::ListVaults {
            signer: None,
            vault_id: Some(vault_id.to_string()),
            refresh: false,
        })
        .await?;
    match response {
        Response::Vaults(vaults) => vaults
            .into_iter()
            .next()
            .ok_or_else(|| format!("vault {} not found", vault_id).into()),
        _ => Err("unexpected response".into()),
    }
}

// ============================================================================
// Drafts
// ============================================================================

/// Parse `txid:vout:duffs` into a vault-owned UTXO
pub fn parse_utxo(arg: &str, vault: &Vault) -> CliResult<Utxo> {
    let parts: Vec<&str> = arg.split(':').collect();
    if parts.len() != 3 {
        return Err(format!("expected txid:vout:duffs, got {}", arg).into());
    }
    Ok(Utxo {
        tx_id: parts[0].to_string(),
        output_index: parts[1].parse()?,
        address: vault.address.clone(),
        script: vault.script_pubkey_hex()?,
        satoshis: parts[2].parse()?,
    })
}

/// Propose a spend
pub async fn cmd_tx_create(
    state: &mut AppState,
    vault_id: &str,
    utxos: &[String],
    to: &str,
    amount: u64,
    fee_rate: Option<u64>,
) -> CliResult<()> {
    let vault = find_vault(state, vault_id).await?;
    let inputs = utxos
        .iter()
        .map(|u| parse_utxo(u, &vault))
        .collect::<CliResult<Vec<_>>>()?;

    let response = state
        .run(Request::CreateTransaction {
            vault_id: vault_id.to_string(),
            inputs,
            output: crate::multisig::DraftOutput {
                address: to.to_string(),
                amount,
            },
            fee_rate,
        })
        .await?;
    print_response(&response);
    Ok(())
}

/// List drafts of a vault
pub async fn cmd_tx_list(state: &mut AppState, vault_id: &str, refresh: bool) -> CliResult<()> {
    let response = state
        .run(Request::ListTransactions {
            vault_id: vault_id.to_string(),
            refresh,
        })
        .await?;
    print_response(&response);
    Ok(())
}

/// Show signing progress
pub async fn cmd_tx_status(state: &mut AppState, transaction_id: &str) -> CliResult<()> {
    let response = state
        .run(Request::GetStatus {
            transaction_id: transaction_id.to_string(),
        })
        .await?;
    print_response(&response);
    Ok(())
}

/// Sign a draft with the configured key
pub async fn cmd_tx_sign(state: &mut AppState, transaction_id: &str) -> CliResult<()> {
    let response = state
        .run(Request::SubmitSignature {
            transaction_id: transaction_id.to_string(),
        })
        .await?;
    print_response(&response);
    Ok(())
}

/// Broadcast a fully signed draft
pub async fn cmd_tx_execute(state: &mut AppState, transaction_id: &str) -> CliResult<()> {
    let response = state
        .run(Request::ExecuteTransaction {
            transaction_id: transaction_id.to_string(),
        })
        .await?;
    print_response(&response);
    Ok(())
}

/// List signatures shared for a draft
pub async fn cmd_sig_list(
    state: &mut AppState,
    transaction_id: &str,
    refresh: bool,
) -> CliResult<()> {
    let response = state
        .run(Request::ListSignatures {
            transaction_id: transaction_id.to_string(),
            refresh,
        })
        .await?;
    print_response(&response);
    Ok(())
}

/// Serve the REST API
pub async fn cmd_serve(state: AppState, host: &str, port: u16) -> CliResult<()> {
    let addr = format!("{}:{}", host, port);
    println!("🚀 Starting API server on http://{}", addr);
    println!("   📁 Data directory: {:?}", state.data_dir);
    api::serve(ApiState::new(state.coordinator), &addr).await?;
    Ok(())
}

// ============================================================================
// Output
// ============================================================================

fn print_vault(vault: &Vault) {
    println!("🔐 Vault {} ({})", vault.id, vault.description());
    println!("   ├─ Address: {}", vault.address);
    println!("   ├─ Network: {}", vault.network);
    println!("   └─ Signers:");
    for (identity, key) in vault.signer_identity_ids.iter().zip(&vault.public_keys) {
        println!("      • {} {}", identity, key);
    }
}

fn print_draft(draft: &TransactionDraft) {
    println!("📝 Draft {} for vault {}", draft.id, draft.vault_id);
    let total = draft
        .input_total()
        .map_or_else(|| "overflowing".to_string(), |t| t.to_string());
    println!("   ├─ Inputs: {} ({} duffs)", draft.inputs.len(), total);
    println!(
        "   ├─ Pay: {} duffs to {}",
        draft.output.amount, draft.output.address
    );
    println!("   ├─ Fee: {} duffs", draft.fee);
    println!("   └─ Change: {} duffs", draft.change().unwrap_or(0));
}

/// Print any coordinator response
pub fn print_response(response: &Response) {
    match response {
        Response::Vault(vault) => {
            println!("✅ Vault created");
            print_vault(vault);
        }
        Response::Vaults(vaults) => {
            if vaults.is_empty() {
                println!("📭 No vaults found");
            }
            for vault in vaults {
                print_vault(vault);
            }
        }
        Response::Transaction(draft) => {
            println!("✅ Draft created");
            print_draft(draft);
        }
        Response::Transactions(drafts) => {
            if drafts.is_empty() {
                println!("📭 No drafts found");
            }
            for draft in drafts {
                print_draft(draft);
            }
        }
        Response::Signatures(signatures) => {
            println!("✍️  {} signature(s)", signatures.len());
            for s in signatures {
                println!(
                    "   • input {} by {}",
                    s.signature.input_index, s.signature.public_key
                );
            }
        }
        Response::Status(status) => {
            let icon = if status.fully_signed { "✅" } else { "⏳" };
            println!(
                "{} Draft {}: {}/{} inputs signed (threshold {})",
                icon,
                status.transaction_id,
                status.signed_inputs,
                status.inputs.len(),
                status.threshold
            );
            for input in &status.inputs {
                let state = match input.state {
                    InputState::Unsigned => "unsigned".to_string(),
                    InputState::PartiallySigned(n) => format!("{} signature(s)", n),
                    InputState::FullySigned => "signed".to_string(),
                };
                println!("   • #{} {}: {}", input.input_index, input.outpoint, state);
            }
            for rejection in &status.rejected {
                println!(
                    "   ⚠️  ignored {} on input {}: {:?} ({})",
                    rejection.public_key, rejection.input_index, rejection.reason, rejection.detail
                );
            }
        }
        Response::Executed(receipt) => {
            println!("📡 Broadcast {}", receipt.txid);
            println!("   Raw: {}", receipt.raw_transaction);
        }
    }
}
