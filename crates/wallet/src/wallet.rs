use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use ctwallet_descriptor::{Address, Chain, Descriptor};
use ctwallet_log::{log_debug, log_info};
use ctwallet_primitives::{AssetId, Hash256, Network, Transaction, Txid};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::merge::{MergeOutcome, UpdateMerger};
use crate::model::{UtxoFilter, WalletTx, WalletTxOut};
use crate::persist::{decode_snapshot, encode_snapshot, Persister};
use crate::source::ScanRequest;
use crate::store::WalletStore;
use crate::update::{ChainTip, Update};
use crate::watch::WatchSet;

/// A watch-only wallet over one descriptor.
///
/// Readers clone the current snapshot and never see a half-applied update;
/// writers are serialized by the watch-set lock.
pub struct Wallet {
    descriptor: Descriptor,
    config: WalletConfig,
    persister: Option<Box<dyn Persister>>,
    state: RwLock<Arc<WalletStore>>,
    writer: Mutex<WatchSet>,
}

impl Wallet {
    pub fn new(descriptor: &str, config: WalletConfig) -> Result<Self, WalletError> {
        let descriptor = Descriptor::parse(descriptor, config.network)?;
        Ok(Self::from_parts(descriptor, config, None, WalletStore::new()))
    }

    /// Opens the wallet, restoring the snapshot `persister` holds if there is one.
    pub fn with_persister(
        descriptor: &str,
        config: WalletConfig,
        persister: Box<dyn Persister>,
    ) -> Result<Self, WalletError> {
        let descriptor = Descriptor::parse(descriptor, config.network)?;
        let store = match persister.load()? {
            Some(blob) => {
                let store = decode_snapshot(&blob, &descriptor)?;
                log_info!(
                    "restored wallet snapshot: {} transactions, tip {:?}",
                    store.tx_count(),
                    store.tip().map(|tip| tip.height)
                );
                store
            }
            None => WalletStore::new(),
        };
        Ok(Self::from_parts(descriptor, config, Some(persister), store))
    }

    fn from_parts(
        descriptor: Descriptor,
        config: WalletConfig,
        persister: Option<Box<dyn Persister>>,
        store: WalletStore,
    ) -> Self {
        Self {
            descriptor,
            config,
            persister,
            state: RwLock::new(Arc::new(store)),
            writer: Mutex::new(WatchSet::new()),
        }
    }

    pub fn network(&self) -> Network {
        self.config.network
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    pub fn id(&self) -> Hash256 {
        self.descriptor.id()
    }

    pub fn snapshot(&self) -> Arc<WalletStore> {
        Arc::clone(&self.state.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn apply_update(&self, update: Update) -> Result<MergeOutcome, WalletError> {
        let mut watch = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.snapshot();
        let outcome =
            UpdateMerger::new(&self.descriptor, &self.config).merge(&current, &update, &mut watch)?;
        if outcome.changed {
            if let Some(persister) = &self.persister {
                persister.save(&encode_snapshot(&self.descriptor, &outcome.store))?;
            }
            *self.state.write().unwrap_or_else(PoisonError::into_inner) =
                Arc::clone(&outcome.store);
        } else {
            log_debug!("update at height {} changed nothing", update.tip.height);
        }
        Ok(outcome)
    }

    /// Applies one unconfirmed transaction at the current tip.
    pub fn apply_transaction(&self, tx: Transaction) -> Result<MergeOutcome, WalletError> {
        let tip = self.snapshot().tip().unwrap_or(ChainTip {
            height: 0,
            hash: self.network().genesis_hash(),
        });
        self.apply_update(Update::new(tip).with_tx(tx, None))
    }

    /// Writes the current snapshot through the persister, if any.
    pub fn persist(&self) -> Result<(), WalletError> {
        let Some(persister) = &self.persister else {
            return Ok(());
        };
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        persister.save(&encode_snapshot(&self.descriptor, &self.snapshot()))
    }

    pub fn tip(&self) -> Option<ChainTip> {
        self.snapshot().tip()
    }

    pub fn balance(&self, asset: AssetId) -> u64 {
        self.snapshot().balance(asset)
    }

    pub fn policy_balance(&self) -> u64 {
        self.balance(self.network().policy_asset())
    }

    pub fn balances(&self) -> BTreeMap<AssetId, u64> {
        self.snapshot().balances().clone()
    }

    pub fn transactions(&self) -> Vec<WalletTx> {
        self.snapshot().transactions().into_iter().cloned().collect()
    }

    pub fn transaction(&self, txid: &Txid) -> Option<WalletTx> {
        self.snapshot().transaction(txid).cloned()
    }

    pub fn utxos(&self, filter: &UtxoFilter) -> Vec<WalletTxOut> {
        self.snapshot().utxos(filter).into_iter().cloned().collect()
    }

    /// Receive address at `index`, or the first unused one.
    pub fn address(&self, index: Option<u32>) -> Result<Address, WalletError> {
        self.chain_address(Chain::External, index)
    }

    /// Change address at `index`, or the first unused one.
    pub fn change_address(&self, index: Option<u32>) -> Result<Address, WalletError> {
        self.chain_address(Chain::Internal, index)
    }

    fn chain_address(&self, chain: Chain, index: Option<u32>) -> Result<Address, WalletError> {
        let index = match index {
            Some(index) => index,
            None => self.snapshot().last_unused(chain),
        };
        Ok(self.descriptor.address(chain, index)?)
    }

    /// The scripts a chain source should look up next.
    pub fn scan_request(&self) -> Result<ScanRequest, WalletError> {
        let mut watch = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let store = self.snapshot();
        let mut next_unused = [0u32; 2];
        for chain in Chain::ALL {
            next_unused[usize::from(chain.as_u8())] = store.last_unused(chain);
        }
        watch.ensure_window(&self.descriptor, next_unused, self.config.gap_limit)?;

        let mut scripts = Vec::new();
        for chain in self.descriptor.chains() {
            let count = store.last_unused(*chain).saturating_add(self.config.gap_limit);
            scripts.extend_from_slice(watch.scripts(*chain, count));
        }
        Ok(ScanRequest {
            network: self.network(),
            tip: store.tip(),
            scripts,
        })
    }
}
