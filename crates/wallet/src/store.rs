//! Immutable wallet snapshot and its read-only queries.

use std::collections::BTreeMap;

use ctwallet_descriptor::Chain;
use ctwallet_primitives::{AssetId, OutPoint, Txid};

use crate::error::WalletError;
use crate::model::{TxType, UtxoFilter, WalletTx, WalletTxOut};
use crate::update::ChainTip;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WalletStore {
    pub(crate) tip: Option<ChainTip>,
    pub(crate) txs: BTreeMap<Txid, WalletTx>,
    pub(crate) utxos: BTreeMap<OutPoint, WalletTxOut>,
    pub(crate) balances: BTreeMap<AssetId, u64>,
    pub(crate) next_unused: [u32; 2],
}

impl WalletStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tip(&self) -> Option<ChainTip> {
        self.tip
    }

    pub fn balance(&self, asset: AssetId) -> u64 {
        self.balances.get(&asset).copied().unwrap_or_default()
    }

    pub fn balances(&self) -> &BTreeMap<AssetId, u64> {
        &self.balances
    }

    /// Confirmed by ascending height, then unconfirmed; ties broken by txid.
    pub fn transactions(&self) -> Vec<&WalletTx> {
        let mut txs: Vec<&WalletTx> = self.txs.values().collect();
        txs.sort_by_key(|tx| tx.order_key());
        txs
    }

    pub fn transaction(&self, txid: &Txid) -> Option<&WalletTx> {
        self.txs.get(txid)
    }

    pub fn tx_count(&self) -> usize {
        self.txs.len()
    }

    pub fn utxos(&self, filter: &UtxoFilter) -> Vec<&WalletTxOut> {
        self.utxos
            .values()
            .filter(|utxo| filter.matches(utxo))
            .collect()
    }

    pub fn utxo(&self, outpoint: &OutPoint) -> Option<&WalletTxOut> {
        self.utxos.get(outpoint)
    }

    /// First index on `chain` that no known output pays to.
    pub fn last_unused(&self, chain: Chain) -> u32 {
        self.next_unused[usize::from(chain.as_u8())]
    }

    /// Recomputes every derived field from the cached transactions and UTXOs.
    pub(crate) fn rebuild(&mut self, policy_asset: AssetId) {
        for utxo in self.utxos.values_mut() {
            utxo.height = self.txs.get(&utxo.outpoint.txid).and_then(|tx| tx.height);
            utxo.spent_by = None;
        }

        let mut order: Vec<(bool, u32, Txid)> =
            self.txs.values().map(WalletTx::order_key).collect();
        order.sort();
        for (_, _, txid) in order {
            let Some(wallet_tx) = self.txs.get(&txid) else {
                continue;
            };
            for input in &wallet_tx.tx.input {
                if let Some(utxo) = self.utxos.get_mut(&input.previous_output) {
                    if utxo.spent_by.is_none() {
                        utxo.spent_by = Some(txid);
                    }
                }
            }
        }

        for wallet_tx in self.txs.values_mut() {
            let mut balance: BTreeMap<AssetId, i64> = BTreeMap::new();
            for vout in 0..wallet_tx.tx.output.len() as u32 {
                if let Some(utxo) = self.utxos.get(&OutPoint::new(wallet_tx.txid, vout)) {
                    let entry = balance.entry(utxo.asset()).or_default();
                    *entry = entry.saturating_add(signed(utxo.value()));
                }
            }
            for input in &wallet_tx.tx.input {
                if let Some(utxo) = self.utxos.get(&input.previous_output) {
                    let entry = balance.entry(utxo.asset()).or_default();
                    *entry = entry.saturating_sub(signed(utxo.value()));
                }
            }
            wallet_tx.fee = wallet_tx.tx.fee_in(policy_asset);
            wallet_tx.tx_type =
                TxType::classify(&wallet_tx.tx, &balance, policy_asset, wallet_tx.fee);
            wallet_tx.balance = balance;
        }

        self.balances.clear();
        for utxo in self.utxos.values().filter(|utxo| !utxo.is_spent()) {
            let entry = self.balances.entry(utxo.asset()).or_default();
            *entry = entry.saturating_add(utxo.value());
        }
        self.balances.retain(|_, value| *value > 0);
    }

    pub fn check_invariants(&self) -> Result<(), WalletError> {
        let mut unspent: BTreeMap<AssetId, u64> = BTreeMap::new();
        for (outpoint, utxo) in &self.utxos {
            if *outpoint != utxo.outpoint {
                return Err(violation(format!("utxo keyed under {outpoint} is {}", utxo.outpoint)));
            }
            let Some(creator) = self.txs.get(&outpoint.txid) else {
                return Err(violation(format!("utxo {outpoint} has no cached transaction")));
            };
            let Some(output) = creator.tx.output.get(outpoint.vout as usize) else {
                return Err(violation(format!("utxo {outpoint} is past the last output")));
            };
            if output.script_pubkey != utxo.script_pubkey {
                return Err(violation(format!("utxo {outpoint} script differs from its output")));
            }
            if utxo.height != creator.height {
                return Err(violation(format!("utxo {outpoint} height is stale")));
            }
            if let Some(spender) = utxo.spent_by {
                if !self.txs.contains_key(&spender) {
                    return Err(violation(format!("utxo {outpoint} spent by unknown {spender}")));
                }
            } else {
                let entry = unspent.entry(utxo.asset()).or_default();
                *entry = entry
                    .checked_add(utxo.value())
                    .ok_or_else(|| violation(format!("balance of {} overflows", utxo.asset())))?;
            }
            if utxo.index >= self.last_unused(utxo.chain) {
                return Err(violation(format!(
                    "{} index {} is at or past the last unused index",
                    utxo.chain, utxo.index
                )));
            }
        }
        unspent.retain(|_, value| *value > 0);
        if unspent != self.balances {
            return Err(violation("balances differ from the unspent outputs".to_string()));
        }
        Ok(())
    }
}

fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn violation(message: String) -> WalletError {
    WalletError::InvariantViolation(message)
}
