//! Folding an [`Update`] into a wallet snapshot.

use std::collections::HashMap;
use std::sync::Arc;

use ctwallet_confidential::{explicit_secrets, unblind, BlindingError, TxOutSecrets, UnblindError};
use ctwallet_descriptor::{Descriptor, DescriptorError};
use ctwallet_log::{log_debug, log_info, log_trace, log_warn};
use ctwallet_primitives::{OutPoint, Transaction, TxOut, Txid};

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::model::{TxType, WalletTx, WalletTxOut};
use crate::store::WalletStore;
use crate::update::{TxRecord, Update, UPDATE_VERSION};
use crate::watch::WatchSet;

/// An owned output whose commitments could not be opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnblindFailure {
    pub outpoint: OutPoint,
    pub error: UnblindError,
}

#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub store: Arc<WalletStore>,
    /// Transactions cached by this merge that were not cached before.
    pub new_txids: Vec<Txid>,
    pub unblind_failures: Vec<UnblindFailure>,
    pub changed: bool,
    pub reorg: bool,
}

pub struct UpdateMerger<'a> {
    descriptor: &'a Descriptor,
    config: &'a WalletConfig,
}

impl<'a> UpdateMerger<'a> {
    pub fn new(descriptor: &'a Descriptor, config: &'a WalletConfig) -> Self {
        Self { descriptor, config }
    }

    /// Produces the snapshot that results from applying `update` to `current`.
    ///
    /// Either the whole update is applied or an error is returned and `current`
    /// stays authoritative. `watch` only ever grows, so it may be extended even
    /// when the update is rejected.
    pub fn merge(
        &self,
        current: &Arc<WalletStore>,
        update: &Update,
        watch: &mut WatchSet,
    ) -> Result<MergeOutcome, WalletError> {
        if update.version != UPDATE_VERSION {
            return Err(WalletError::InvalidData("unsupported update version"));
        }
        let reorg = self.check_tip(current, update)?;
        let records = check_consistency(current, update)?;

        // An index only counts as used once the wallet can open the output paying to it.
        let mut opened: HashMap<OutPoint, Result<TxOutSecrets, UnblindError>> = HashMap::new();
        let mut next_unused = current.next_unused;
        loop {
            watch.ensure_window(self.descriptor, next_unused, self.config.gap_limit)?;
            let mut advanced = next_unused;
            for (txid, record) in &records {
                for (vout, output) in record.tx.output.iter().enumerate() {
                    let Some((chain, index)) = watch.lookup(&output.script_pubkey) else {
                        continue;
                    };
                    let outpoint = OutPoint::new(*txid, vout as u32);
                    let owned = current.utxos.contains_key(&outpoint)
                        || opened
                            .entry(outpoint)
                            .or_insert_with(|| self.secrets(output))
                            .is_ok();
                    if owned {
                        let slot = &mut advanced[usize::from(chain.as_u8())];
                        *slot = (*slot).max(index.saturating_add(1));
                    }
                }
            }
            if advanced == next_unused {
                break;
            }
            next_unused = advanced;
        }

        let mut next = WalletStore::clone(current);
        next.next_unused = next_unused;

        for txid in &update.orphaned {
            if next.txs.remove(txid).is_some() {
                log_debug!("dropping orphaned transaction {txid}");
            }
            next.utxos.retain(|outpoint, _| outpoint.txid != *txid);
        }
        for wallet_tx in next.txs.values_mut() {
            if wallet_tx.height.is_some_and(|height| height > update.tip.height) {
                log_debug!("transaction {} is unconfirmed after reorg", wallet_tx.txid);
                wallet_tx.height = None;
            }
        }

        let mut unblind_failures = Vec::new();
        for (txid, record) in &records {
            for (vout, output) in record.tx.output.iter().enumerate() {
                let Some((chain, index)) = watch.lookup(&output.script_pubkey) else {
                    continue;
                };
                let outpoint = OutPoint::new(*txid, vout as u32);
                if next.utxos.contains_key(&outpoint) {
                    continue;
                }
                let secrets = opened
                    .remove(&outpoint)
                    .unwrap_or_else(|| self.secrets(output));
                match secrets {
                    Ok(secrets) => {
                        log_trace!("owned output {outpoint} on {chain}/{index}");
                        next.utxos.insert(
                            outpoint,
                            WalletTxOut {
                                outpoint,
                                script_pubkey: output.script_pubkey.clone(),
                                chain,
                                index,
                                secrets,
                                height: record.height,
                                spent_by: None,
                            },
                        );
                    }
                    Err(error) => {
                        log_warn!("cannot unblind {outpoint}: {error}");
                        unblind_failures.push(UnblindFailure { outpoint, error });
                    }
                }
            }
        }

        for (txid, record) in &records {
            if let Some(existing) = next.txs.get_mut(txid) {
                existing.height = record.height;
                existing.timestamp = record.timestamp.or(existing.timestamp);
                continue;
            }
            if !touches_wallet(&next, *txid, &record.tx) {
                log_trace!("skipping unrelated transaction {txid}");
                continue;
            }
            next.txs.insert(
                *txid,
                WalletTx {
                    txid: *txid,
                    tx: record.tx.clone(),
                    height: record.height,
                    timestamp: record.timestamp,
                    balance: Default::default(),
                    fee: 0,
                    tx_type: TxType::Unknown,
                },
            );
        }

        next.tip = Some(update.tip);
        next.rebuild(self.config.network.policy_asset());

        let changed = next != **current;
        let new_txids: Vec<Txid> = next
            .txs
            .keys()
            .filter(|txid| !current.txs.contains_key(*txid))
            .copied()
            .collect();
        if changed {
            log_info!(
                "applied update at height {}: {} new transactions, {} cached",
                update.tip.height,
                new_txids.len(),
                next.txs.len()
            );
        }

        Ok(MergeOutcome {
            store: if changed {
                Arc::new(next)
            } else {
                Arc::clone(current)
            },
            new_txids,
            unblind_failures,
            changed,
            reorg,
        })
    }

    /// Rejects stale updates; reports whether the update reorganises the tip.
    fn check_tip(&self, current: &WalletStore, update: &Update) -> Result<bool, WalletError> {
        let Some(tip) = current.tip else {
            return Ok(false);
        };
        let reach = u64::from(update.tip.height) + u64::from(self.config.max_reorg_depth);
        if reach < u64::from(tip.height) {
            return Err(WalletError::StaleUpdate {
                update_height: update.tip.height,
                tip_height: tip.height,
            });
        }
        let reorg = update.tip.height < tip.height
            || (update.tip.height == tip.height && update.tip.hash != tip.hash);
        if reorg {
            log_warn!(
                "reorg: tip {} {} replaced by {} {}",
                tip.height,
                tip.hash,
                update.tip.height,
                update.tip.hash
            );
        }
        Ok(reorg)
    }

    fn secrets(&self, output: &TxOut) -> Result<TxOutSecrets, UnblindError> {
        if let Some(secrets) = explicit_secrets(output) {
            return Ok(secrets);
        }
        let pair = self
            .descriptor
            .blinding_key_pair(&output.script_pubkey)
            .map_err(|err| match err {
                DescriptorError::Blinding(BlindingError::NoPrivateKey) => UnblindError::NoPrivateKey,
                other => UnblindError::BlindingKey(other.to_string()),
            })?;
        unblind(output, pair.secret_key())
    }
}

/// Pairs every record with its txid, refusing content that contradicts the cache.
fn check_consistency<'u>(
    current: &WalletStore,
    update: &'u Update,
) -> Result<Vec<(Txid, &'u TxRecord)>, WalletError> {
    let mut seen: HashMap<Txid, &Transaction> = HashMap::with_capacity(update.txs.len());
    let mut records = Vec::with_capacity(update.txs.len());
    for record in &update.txs {
        let txid = record.tx.txid();
        if let Some(cached) = current.txs.get(&txid) {
            if cached.tx != record.tx {
                return Err(WalletError::InconsistentUpdate(txid));
            }
        }
        if let Some(previous) = seen.insert(txid, &record.tx) {
            if *previous != record.tx {
                return Err(WalletError::InconsistentUpdate(txid));
            }
        }
        records.push((txid, record));
    }
    Ok(records)
}

fn touches_wallet(store: &WalletStore, txid: Txid, tx: &Transaction) -> bool {
    (0..tx.output.len() as u32).any(|vout| store.utxos.contains_key(&OutPoint::new(txid, vout)))
        || tx
            .input
            .iter()
            .any(|input| store.utxos.contains_key(&input.previous_output))
}
