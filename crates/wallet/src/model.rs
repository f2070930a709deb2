use std::collections::BTreeMap;
use std::fmt;

use ctwallet_confidential::TxOutSecrets;
use ctwallet_descriptor::Chain;
use ctwallet_primitives::elements::opcodes::all::OP_RETURN;
use ctwallet_primitives::elements::script::Builder;
use ctwallet_primitives::elements::secp256k1_zkp::ZERO_TWEAK;
use ctwallet_primitives::{AssetId, OutPoint, Script, Transaction, Txid};

/// An owned, unblinded output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletTxOut {
    pub outpoint: OutPoint,
    pub script_pubkey: Script,
    pub chain: Chain,
    pub index: u32,
    pub secrets: TxOutSecrets,
    pub height: Option<u32>,
    pub spent_by: Option<Txid>,
}

impl WalletTxOut {
    pub fn asset(&self) -> AssetId {
        self.secrets.asset
    }

    pub fn value(&self) -> u64 {
        self.secrets.value
    }

    pub fn is_spent(&self) -> bool {
        self.spent_by.is_some()
    }

    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }
}

/// What a transaction did from the wallet's point of view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TxType {
    /// Creates a new asset.
    Issuance,
    /// Mints more of an existing asset.
    Reissuance,
    /// Has a provably unspendable output.
    Burn,
    /// Moves the wallet's own funds; only the fee leaves.
    Redeposit,
    Incoming,
    Outgoing,
    Unknown,
}

impl TxType {
    /// Classifies `tx` given its net per-asset effect and policy-asset fee.
    ///
    /// Checked in order: issuance inputs, burn outputs, redeposit, then the sign of
    /// every balance entry.
    pub fn classify(
        tx: &Transaction,
        balance: &BTreeMap<AssetId, i64>,
        policy_asset: AssetId,
        fee: u64,
    ) -> Self {
        if let Some(input) = tx.input.iter().find(|input| input.has_issuance()) {
            return if input.asset_issuance.asset_blinding_nonce == ZERO_TWEAK {
                TxType::Issuance
            } else {
                TxType::Reissuance
            };
        }
        let burn_script = Builder::new().push_opcode(OP_RETURN).into_script();
        if tx.output.iter().any(|output| output.script_pubkey == burn_script) {
            return TxType::Burn;
        }
        if balance.len() == 1
            && balance.get(&policy_asset).copied() == Some(-i64::try_from(fee).unwrap_or(i64::MAX))
        {
            return TxType::Redeposit;
        }
        if balance.is_empty() {
            TxType::Unknown
        } else if balance.values().all(|value| *value > 0) {
            TxType::Incoming
        } else if balance.values().all(|value| *value < 0) {
            TxType::Outgoing
        } else {
            TxType::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TxType::Issuance => "issuance",
            TxType::Reissuance => "reissuance",
            TxType::Burn => "burn",
            TxType::Redeposit => "redeposit",
            TxType::Incoming => "incoming",
            TxType::Outgoing => "outgoing",
            TxType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cached transaction touching the wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalletTx {
    pub txid: Txid,
    pub tx: Transaction,
    pub height: Option<u32>,
    /// Block time reported by the chain source.
    pub timestamp: Option<u32>,
    /// Owned output values minus owned input values, per asset.
    pub balance: BTreeMap<AssetId, i64>,
    /// Explicit fee paid in the policy asset.
    pub fee: u64,
    pub tx_type: TxType,
}

impl WalletTx {
    pub fn is_confirmed(&self) -> bool {
        self.height.is_some()
    }

    /// Net effect on `asset`; zero when the transaction does not move it.
    pub fn net(&self, asset: AssetId) -> i64 {
        self.balance.get(&asset).copied().unwrap_or_default()
    }

    pub fn tx_type(&self) -> TxType {
        self.tx_type
    }

    /// `(asset, reissuance token)` created or minted by each issuance input.
    pub fn issuances(&self) -> Vec<(AssetId, AssetId)> {
        self.tx
            .input
            .iter()
            .filter(|input| input.has_issuance())
            .map(|input| input.issuance_ids())
            .collect()
    }

    pub fn has_pegin(&self) -> bool {
        self.tx.input.iter().any(|input| input.is_pegin())
    }

    /// Main-chain value claimed by peg-in inputs.
    pub fn pegin_value(&self) -> u64 {
        self.tx
            .input
            .iter()
            .filter_map(|input| input.pegin_data())
            .fold(0u64, |total, pegin| total.saturating_add(pegin.value))
    }

    pub(crate) fn order_key(&self) -> (bool, u32, Txid) {
        (self.height.is_none(), self.height.unwrap_or(u32::MAX), self.txid)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UtxoFilter {
    pub asset: Option<AssetId>,
    pub chain: Option<Chain>,
    pub include_spent: bool,
    pub confirmed_only: bool,
}

impl UtxoFilter {
    pub fn unspent() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            include_spent: true,
            ..Self::default()
        }
    }

    pub fn asset(mut self, asset: AssetId) -> Self {
        self.asset = Some(asset);
        self
    }

    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn confirmed_only(mut self) -> Self {
        self.confirmed_only = true;
        self
    }

    pub fn matches(&self, utxo: &WalletTxOut) -> bool {
        (self.include_spent || !utxo.is_spent())
            && (!self.confirmed_only || utxo.is_confirmed())
            && self.asset.map_or(true, |asset| asset == utxo.asset())
            && self.chain.map_or(true, |chain| chain == utxo.chain)
    }
}
