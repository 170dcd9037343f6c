//! Coordinator service
//!
//! Wires the document store, identity directory, signer account and cache
//! together behind `Coordinator::handle`.

use crate::coordinator::request::{
    CoordinatorError, ExecutionReceipt, Request, Response, SigningStatus,
};
use crate::core::{FeeRate, Network, Utxo};
use crate::multisig::{
    self, apply_signatures, sign_draft, Aggregation, DraftOutput, MultisigError,
    PartialSignature, TransactionDraft, Vault, VaultParams,
};
use crate::store::{
    CoordinationCache, DocumentBatch, DocumentStore, DocumentType, IdentityDirectory, VaultFilter,
    DEFAULT_QUERY_LIMIT,
};
use crate::wallet::WalletAccount;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Coordinator configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Network new vaults default to
    pub network: Network,
    /// Fee rate for new drafts
    pub fee_rate: FeeRate,
    /// Documents fetched per query
    pub query_limit: usize,
    /// Directory for the file store and broadcast outbox
    pub data_dir: PathBuf,
    /// Identity used to own documents when no account is attached
    pub identity_id: Option<String>,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            fee_rate: FeeRate::default(),
            query_limit: DEFAULT_QUERY_LIMIT,
            data_dir: PathBuf::from(".vault_data"),
            identity_id: None,
        }
    }
}

/// Multisig vault coordinator
pub struct Coordinator {
    store: Arc<dyn DocumentStore>,
    directory: Arc<dyn IdentityDirectory>,
    account: Option<Arc<dyn WalletAccount>>,
    cache: CoordinationCache,
    config: CoordinatorConfig,
}

impl Coordinator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        directory: Arc<dyn IdentityDirectory>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            store,
            directory,
            account: None,
            cache: CoordinationCache::new(config.query_limit),
            config,
        }
    }

    /// Attach the signer account used for signing, ownership and broadcast
    pub fn with_account(mut self, account: Arc<dyn WalletAccount>) -> Self {
        self.account = Some(account);
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn cache(&self) -> &CoordinationCache {
        &self.cache
    }

    /// Dispatch one request
    pub async fn handle(&mut self, request: Request) -> Result<Response, CoordinatorError> {
        let name = request.name();
        log::debug!("Handling {}", name);

        let result = match request {
            Request::CreateVault {
                identity_ids,
                public_keys,
                threshold,
                network,
            } => self
                .create_vault(VaultParams {
                    identity_ids,
                    public_keys,
                    threshold,
                    network: network.unwrap_or(self.config.network),
                })
                .await
                .map(Response::Vault),
            Request::CreateVaultFromIdentities {
                identity_ids,
                threshold,
                network,
            } => self
                .create_vault_from_identities(identity_ids, threshold, network)
                .await
                .map(Response::Vault),
            Request::ListVaults {
                signer,
                vault_id,
                refresh,
            } => self
                .list_vaults(&VaultFilter { signer, vault_id }, refresh)
                .await
                .map(Response::Vaults),
            Request::CreateTransaction {
                vault_id,
                inputs,
                output,
                fee_rate,
            } => self
                .create_transaction(&vault_id, inputs, output, fee_rate)
                .await
                .map(Response::Transaction),
            Request::ListTransactions { vault_id, refresh } => self
                .list_transactions(&vault_id, refresh)
                .await
                .map(Response::Transactions),
            Request::SubmitSignature { transaction_id } => self
                .submit_signature(&transaction_id)
                .await
                .map(Response::Signatures),
            Request::ListSignatures {
                transaction_id,
                refresh,
            } => self
                .list_signatures(&transaction_id, refresh)
                .await
                .map(Response::Signatures),
            Request::ExecuteTransaction { transaction_id } => self
                .execute_transaction(&transaction_id)
                .await
                .map(Response::Executed),
            Request::GetStatus { transaction_id } => {
                self.status(&transaction_id).await.map(Response::Status)
            }
        };

        result.map_err(|e| {
            log::warn!("{} failed: {}", name, e);
            CoordinatorError::from(e)
        })
    }

    // =========================================================================
    // Vaults
    // =========================================================================

    pub async fn create_vault(&mut self, params: VaultParams) -> Result<Vault, MultisigError> {
        params.validate()?;
        let owner = self.owner_id()?;
        multisig::create_vault(self.store.as_ref(), &mut self.cache, &owner, params).await
    }

    /// Resolve each identity's first public key, then create the vault
    pub async fn create_vault_from_identities(
        &mut self,
        identity_ids: Vec<String>,
        threshold: u8,
        network: Option<Network>,
    ) -> Result<Vault, MultisigError> {
        if identity_ids.is_empty()
            || threshold == 0
            || threshold as usize > identity_ids.len()
        {
            return Err(MultisigError::BadArguments(format!(
                "threshold {} with {} identities",
                threshold,
                identity_ids.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = identity_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(MultisigError::BadArguments(format!(
                "duplicate identity {}",
                dup
            )));
        }
        let owner = self.owner_id()?;

        let mut public_keys = Vec::with_capacity(identity_ids.len());
        for identity_id in &identity_ids {
            public_keys.push(self.directory.public_key(identity_id).await?);
        }

        let params = VaultParams {
            identity_ids,
            public_keys,
            threshold,
            network: network.unwrap_or(self.config.network),
        };
        multisig::create_vault(self.store.as_ref(), &mut self.cache, &owner, params).await
    }

    pub async fn list_vaults(
        &mut self,
        filter: &VaultFilter,
        refresh: bool,
    ) -> Result<Vec<Vault>, MultisigError> {
        multisig::list_vaults(self.store.as_ref(), &mut self.cache, filter, refresh).await
    }

    // =========================================================================
    // Drafts
    // =========================================================================

    pub async fn create_transaction(
        &mut self,
        vault_id: &str,
        inputs: Vec<Utxo>,
        output: DraftOutput,
        fee_rate: Option<u64>,
    ) -> Result<TransactionDraft, MultisigError> {
        let owner = self.owner_id()?;
        let fee_rate = fee_rate
            .map(FeeRate::from_sat_per_byte)
            .unwrap_or(self.config.fee_rate);
        multisig::create_draft(
            self.store.as_ref(),
            &mut self.cache,
            &owner,
            vault_id,
            inputs,
            output,
            fee_rate,
        )
        .await
    }

    pub async fn list_transactions(
        &mut self,
        vault_id: &str,
        refresh: bool,
    ) -> Result<Vec<TransactionDraft>, MultisigError> {
        multisig::get_vault(self.store.as_ref(), &mut self.cache, vault_id, false).await?;
        multisig::list_drafts(self.store.as_ref(), &mut self.cache, vault_id, refresh).await
    }

    // =========================================================================
    // Signatures
    // =========================================================================

    /// Sign a draft with the account key and persist any new signatures
    ///
    /// Signatures this signer already shared are not written again.
    pub async fn submit_signature(
        &mut self,
        transaction_id: &str,
    ) -> Result<Vec<PartialSignature>, MultisigError> {
        let account = self.account()?;
        let (draft, vault) = self.load_draft_and_vault(transaction_id).await?;

        let key = account.private_key(0)?;
        let signatures = sign_draft(&draft, &vault, &key)?;

        let existing = self
            .cache
            .refresh_signatures(self.store.as_ref(), transaction_id)
            .await?
            .to_vec();
        let (shared, fresh): (Vec<PartialSignature>, Vec<PartialSignature>) = signatures
            .into_iter()
            .partition(|s| existing.iter().any(|e| e.same_as(s)));
        if fresh.is_empty() {
            log::info!(
                "Draft {} already signed by {}",
                transaction_id,
                key.public_key_hex()
            );
            return Ok(existing
                .into_iter()
                .filter(|e| shared.iter().any(|s| s.same_as(e)))
                .collect());
        }

        let owner = account.identity_id().to_string();
        let mut documents = Vec::with_capacity(fresh.len());
        for signature in &fresh {
            documents.push(
                self.store
                    .create(DocumentType::Signature, &owner, signature.properties()?)
                    .await?,
            );
        }
        self.store
            .broadcast(DocumentBatch::create(documents.clone()), &owner)
            .await?;

        let persisted: Vec<PartialSignature> = fresh
            .into_iter()
            .zip(documents)
            .map(|(mut signature, document)| {
                signature.id = document.id;
                signature
            })
            .collect();
        log::info!(
            "Shared {} signature(s) for draft {} from {}",
            persisted.len(),
            transaction_id,
            owner
        );
        self.cache.insert_signatures(persisted.clone());
        Ok(persisted)
    }

    pub async fn list_signatures(
        &mut self,
        transaction_id: &str,
        refresh: bool,
    ) -> Result<Vec<PartialSignature>, MultisigError> {
        multisig::get_draft(self.store.as_ref(), &mut self.cache, transaction_id, false).await?;
        if refresh || !self.cache.has_signatures(transaction_id) {
            self.cache
                .refresh_signatures(self.store.as_ref(), transaction_id)
                .await?;
        }
        Ok(self.cache.signatures(transaction_id).to_vec())
    }

    // =========================================================================
    // Status & execution
    // =========================================================================

    pub async fn status(&mut self, transaction_id: &str) -> Result<SigningStatus, MultisigError> {
        let (draft, vault, aggregation) = self.aggregate(transaction_id).await?;
        Ok(SigningStatus::new(&draft, &vault, &aggregation))
    }

    /// Broadcast a draft once every input meets the threshold
    pub async fn execute_transaction(
        &mut self,
        transaction_id: &str,
    ) -> Result<ExecutionReceipt, MultisigError> {
        let account = self.account()?;
        let (draft, _, aggregation) = self.aggregate(transaction_id).await?;
        if !aggregation.is_fully_signed() {
            return Err(MultisigError::NotFullySigned {
                signed: aggregation.signed_inputs(),
                inputs: aggregation.inputs.len(),
            });
        }

        let txid = account
            .broadcast_transaction(&aggregation.transaction)
            .await?;
        log::info!("Executed draft {} as {}", draft.id, txid);
        Ok(ExecutionReceipt {
            transaction_id: draft.id,
            txid,
            raw_transaction: aggregation.transaction.to_hex(),
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    async fn aggregate(
        &mut self,
        transaction_id: &str,
    ) -> Result<(TransactionDraft, Vault, Aggregation), MultisigError> {
        let (draft, vault) = self.load_draft_and_vault(transaction_id).await?;
        let signatures = self
            .cache
            .refresh_signatures(self.store.as_ref(), transaction_id)
            .await?;
        let aggregation = apply_signatures(&draft, &vault, signatures)?;
        Ok((draft, vault, aggregation))
    }

    async fn load_draft_and_vault(
        &mut self,
        transaction_id: &str,
    ) -> Result<(TransactionDraft, Vault), MultisigError> {
        let draft =
            multisig::get_draft(self.store.as_ref(), &mut self.cache, transaction_id, true).await?;
        let vault =
            multisig::get_vault(self.store.as_ref(), &mut self.cache, &draft.vault_id, true)
                .await?;
        Ok((draft, vault))
    }

    fn account(&self) -> Result<Arc<dyn WalletAccount>, MultisigError> {
        self.account
            .clone()
            .ok_or_else(|| MultisigError::BadArguments("no signer account configured".to_string()))
    }

    fn owner_id(&self) -> Result<String, MultisigError> {
        match (&self.account, &self.config.identity_id) {
            (Some(account), _) => Ok(account.identity_id().to_string()),
            (None, Some(identity_id)) => Ok(identity_id.clone()),
            (None, None) => Err(MultisigError::BadArguments(
                "no identity configured".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Address;
    use crate::crypto::KeyPair;
    use crate::multisig::{ErrorCode, InputState};
    use crate::store::{JsonFileStore, MemoryStore, StoreConfig};
    use crate::wallet::LocalAccount;
    use tempfile::TempDir;

    struct Signer {
        coordinator: Coordinator,
        account: Arc<LocalAccount>,
    }

    async fn signers(store: Arc<MemoryStore>, n: usize) -> Vec<Signer> {
        let mut out = Vec::new();
        for i in 0..n {
            let identity = format!("identity-{}", i);
            let account = Arc::new(LocalAccount::new(&identity, KeyPair::generate()));
            store
                .register_identity(&identity, &account.public_key())
                .await
                .unwrap();
            let coordinator =
                Coordinator::new(store.clone(), store.clone(), CoordinatorConfig::default())
                    .with_account(account.clone());
            out.push(Signer {
                coordinator,
                account,
            });
        }
        out
    }

    fn identities(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("identity-{}", i)).collect()
    }

    fn funding(vault: &Vault, tx_byte: u8, satoshis: u64) -> Utxo {
        Utxo {
            tx_id: hex::encode([tx_byte; 32]),
            output_index: 0,
            address: vault.address.clone(),
            script: vault.script_pubkey_hex().unwrap(),
            satoshis,
        }
    }

    fn destination() -> String {
        Address::p2pkh(&KeyPair::generate().public_key, Network::Testnet).to_string()
    }

    async fn expect_vault(c: &mut Coordinator, request: Request) -> Vault {
        match c.handle(request).await.unwrap() {
            Response::Vault(v) => v,
            other => panic!("unexpected response {:?}", other),
        }
    }

    async fn expect_draft(c: &mut Coordinator, request: Request) -> TransactionDraft {
        match c.handle(request).await.unwrap() {
            Response::Transaction(t) => t,
            other => panic!("unexpected response {:?}", other),
        }
    }

    async fn expect_status(c: &mut Coordinator, transaction_id: &str) -> SigningStatus {
        match c
            .handle(Request::GetStatus {
                transaction_id: transaction_id.to_string(),
            })
            .await
            .unwrap()
        {
            Response::Status(s) => s,
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_two_of_three_end_to_end() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 3).await;

        let vault = expect_vault(
            &mut s[0].coordinator,
            Request::CreateVaultFromIdentities {
                identity_ids: identities(3),
                threshold: 2,
                network: None,
            },
        )
        .await;
        assert_eq!(vault.public_keys[1], s[1].account.public_key());

        let draft = expect_draft(
            &mut s[0].coordinator,
            Request::CreateTransaction {
                vault_id: vault.id.clone(),
                inputs: vec![funding(&vault, 1, 80_000), funding(&vault, 2, 20_000)],
                output: DraftOutput {
                    address: destination(),
                    amount: 90_000,
                },
                fee_rate: None,
            },
        )
        .await;

        // X signs on their own coordinator
        s[0].coordinator
            .handle(Request::SubmitSignature {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap();
        let status = expect_status(&mut s[2].coordinator, &draft.id).await;
        assert!(!status.fully_signed);
        assert!(status
            .inputs
            .iter()
            .all(|i| i.state == InputState::PartiallySigned(1)));

        let err = s[2]
            .coordinator
            .handle(Request::ExecuteTransaction {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFullySigned);

        // Y signs from an independent process view
        s[2].coordinator
            .handle(Request::SubmitSignature {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap();
        let status = expect_status(&mut s[1].coordinator, &draft.id).await;
        assert!(status.fully_signed);
        assert_eq!(status.signed_inputs, 2);

        let receipt = match s[1]
            .coordinator
            .handle(Request::ExecuteTransaction {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap()
        {
            Response::Executed(r) => r,
            other => panic!("unexpected response {:?}", other),
        };
        assert_eq!(receipt.txid.len(), 64);
        assert_eq!(s[1].account.outbox().await, vec![receipt.raw_transaction]);
    }

    #[tokio::test]
    async fn test_resubmitting_writes_nothing_new() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 2).await;
        let vault = expect_vault(
            &mut s[0].coordinator,
            Request::CreateVaultFromIdentities {
                identity_ids: identities(2),
                threshold: 2,
                network: None,
            },
        )
        .await;
        let draft = expect_draft(
            &mut s[0].coordinator,
            Request::CreateTransaction {
                vault_id: vault.id.clone(),
                inputs: vec![funding(&vault, 1, 50_000)],
                output: DraftOutput {
                    address: destination(),
                    amount: 10_000,
                },
                fee_rate: Some(5),
            },
        )
        .await;

        let submit = Request::SubmitSignature {
            transaction_id: draft.id.clone(),
        };
        s[1].coordinator.handle(submit.clone()).await.unwrap();
        let before = store.document_count().await;
        let again = match s[1].coordinator.handle(submit).await.unwrap() {
            Response::Signatures(sigs) => sigs,
            other => panic!("unexpected response {:?}", other),
        };
        assert_eq!(again.len(), 1);
        assert_eq!(store.document_count().await, before);
    }

    #[tokio::test]
    async fn test_bad_threshold_persists_nothing() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 3).await;
        for threshold in [0u8, 4] {
            let err = s[0]
                .coordinator
                .handle(Request::CreateVaultFromIdentities {
                    identity_ids: identities(3),
                    threshold,
                    network: None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::BadArguments);
        }
        // Identity lookups must not happen either: an offline store would fail
        store.set_online(false);
        let err = s[0]
            .coordinator
            .handle(Request::CreateVault {
                identity_ids: identities(3),
                public_keys: vec![],
                threshold: 2,
                network: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BadArguments);
        store.set_online(true);
        assert_eq!(store.document_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_identity_and_missing_records() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 1).await;
        let err = s[0]
            .coordinator
            .handle(Request::CreateVaultFromIdentities {
                identity_ids: vec!["identity-0".into(), "stranger".into()],
                threshold: 1,
                network: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);

        let err = s[0]
            .coordinator
            .handle(Request::GetStatus {
                transaction_id: "missing".into(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_outsider_cannot_sign() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 3).await;
        let vault = expect_vault(
            &mut s[0].coordinator,
            Request::CreateVaultFromIdentities {
                identity_ids: identities(2),
                threshold: 1,
                network: None,
            },
        )
        .await;
        let draft = expect_draft(
            &mut s[0].coordinator,
            Request::CreateTransaction {
                vault_id: vault.id.clone(),
                inputs: vec![funding(&vault, 1, 50_000)],
                output: DraftOutput {
                    address: destination(),
                    amount: 10_000,
                },
                fee_rate: None,
            },
        )
        .await;

        let err = s[2]
            .coordinator
            .handle(Request::SubmitSignature {
                transaction_id: draft.id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::KeyNotAuthorized);
    }

    #[tokio::test]
    async fn test_broadcast_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 1).await;
        let vault = expect_vault(
            &mut s[0].coordinator,
            Request::CreateVaultFromIdentities {
                identity_ids: identities(1),
                threshold: 1,
                network: None,
            },
        )
        .await;
        let draft = expect_draft(
            &mut s[0].coordinator,
            Request::CreateTransaction {
                vault_id: vault.id.clone(),
                inputs: vec![funding(&vault, 1, 50_000)],
                output: DraftOutput {
                    address: destination(),
                    amount: 10_000,
                },
                fee_rate: None,
            },
        )
        .await;
        s[0].coordinator
            .handle(Request::SubmitSignature {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap();

        s[0].account.set_online(false);
        let err = s[0]
            .coordinator
            .handle(Request::ExecuteTransaction {
                transaction_id: draft.id,
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::BroadcastFailed);
    }

    #[tokio::test]
    async fn test_listing_requests() {
        let store = Arc::new(MemoryStore::new());
        let mut s = signers(store.clone(), 2).await;
        let public_keys = vec![s[0].account.public_key(), s[1].account.public_key()];
        let vault = expect_vault(
            &mut s[0].coordinator,
            Request::CreateVault {
                identity_ids: identities(2),
                public_keys,
                threshold: 1,
                network: Some(Network::Testnet),
            },
        )
        .await;

        let listed = s[1]
            .coordinator
            .handle(Request::ListVaults {
                signer: Some("identity-1".into()),
                vault_id: None,
                refresh: true,
            })
            .await
            .unwrap();
        assert!(matches!(listed, Response::Vaults(ref v) if v.len() == 1 && v[0].id == vault.id));

        let draft = expect_draft(
            &mut s[0].coordinator,
            Request::CreateTransaction {
                vault_id: vault.id.clone(),
                inputs: vec![funding(&vault, 9, 50_000)],
                output: DraftOutput {
                    address: destination(),
                    amount: 10_000,
                },
                fee_rate: None,
            },
        )
        .await;
        let drafts = s[1]
            .coordinator
            .handle(Request::ListTransactions {
                vault_id: vault.id.clone(),
                refresh: false,
            })
            .await
            .unwrap();
        assert!(matches!(drafts, Response::Transactions(ref d) if d.len() == 1 && d[0].id == draft.id));

        s[0].coordinator
            .handle(Request::SubmitSignature {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap();
        let sigs = s[1]
            .coordinator
            .handle(Request::ListSignatures {
                transaction_id: draft.id.clone(),
                refresh: true,
            })
            .await
            .unwrap();
        assert!(matches!(sigs, Response::Signatures(ref v) if v.len() == 1));
    }

    #[tokio::test]
    async fn test_file_store_coordination() {
        let dir = TempDir::new().unwrap();
        let open = || Arc::new(JsonFileStore::open(StoreConfig::with_data_dir(dir.path())).unwrap());

        let keys: Vec<KeyPair> = (0..2).map(|_| KeyPair::generate()).collect();
        let store_a = open();
        let store_b = open();
        let alice = Arc::new(LocalAccount::new("alice", keys[0].clone()));
        let bob = Arc::new(LocalAccount::new("bob", keys[1].clone()));
        let mut a = Coordinator::new(store_a.clone(), store_a, CoordinatorConfig::default())
            .with_account(alice);
        let mut b = Coordinator::new(store_b.clone(), store_b, CoordinatorConfig::default())
            .with_account(bob);

        let vault = expect_vault(
            &mut a,
            Request::CreateVault {
                identity_ids: vec!["alice".into(), "bob".into()],
                public_keys: keys.iter().map(|k| k.public_key_hex()).collect(),
                threshold: 2,
                network: None,
            },
        )
        .await;
        let draft = expect_draft(
            &mut a,
            Request::CreateTransaction {
                vault_id: vault.id.clone(),
                inputs: vec![funding(&vault, 4, 40_000)],
                output: DraftOutput {
                    address: destination(),
                    amount: 20_000,
                },
                fee_rate: None,
            },
        )
        .await;

        for c in [&mut a, &mut b] {
            c.handle(Request::SubmitSignature {
                transaction_id: draft.id.clone(),
            })
            .await
            .unwrap();
        }
        assert!(expect_status(&mut b, &draft.id).await.fully_signed);
    }
}
