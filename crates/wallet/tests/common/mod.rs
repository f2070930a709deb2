#![allow(dead_code)]

use std::cell::Cell;
use std::collections::HashSet;

use ctwallet_confidential::{
    blind_output, AssetBlindingFactor, BlindingFactors, MasterBlindingKey, PublicKey, SecretKey,
    ValueBlindingFactor,
};
use ctwallet_descriptor::{Chain, Descriptor};
use ctwallet_primitives::elements::confidential::{Asset, Nonce, Value};
use ctwallet_primitives::elements::hashes::Hash;
use ctwallet_primitives::elements::{LockTime, Sequence, TxInWitness};
use ctwallet_primitives::{
    sha256, AssetId, BlockHash, Network, OutPoint, Script, Transaction, TxIn, TxOut, Txid,
};
use ctwallet_wallet::{ChainSource, ChainTip, ScanRequest, SourceError, Update};

pub const ABANDON_SEED: &str = "5eb00bbddcf069084889a8ab9155568165f5c453ccb85e70811aaed6f6da5fc19a5ac40b389cd370d086206dec8aa6c43daea6690f20ad3d8d48b2d2ce9e38e4";
pub const ABANDON_TPUB: &str = "tpubDC8msFGeGuwnKG9Upg7DM2b4DaRqg3CUZa5g8v2SRQ6K4NSkxUgd7HsL2XVWbVm39yBA4LAxysQAm397zwQSQoQgewGiYZqrA9DsP4zbQ1M";

pub const TEST_DESCRIPTOR: &str = "ct(slip77(ab5824f4477b4ebb00a132adfd8eb0b7935cf24f6ac151add5d1913db374ce92),elwpkh([759db348/84'/1'/0']tpubDCRMaF33e44pcJj534LXVhFbHibPbJ5vuLhSSPFAw57kYURv4tzXFL6LSnd78bkjqdmE3USedkbpXJUPA1tdzKfuYSL7PianceqAhwL2UkA/<0;1>/*))#cch6wrnp";

pub const NETWORK: Network = Network::LiquidTestnet;

pub fn abandon_descriptor() -> String {
    let seed = hex::decode(ABANDON_SEED).expect("seed hex");
    let master = MasterBlindingKey::from_seed(&seed);
    format!(
        "ct(slip77({}),elwpkh([73c5da0a/84'/1'/0']{ABANDON_TPUB}/<0;1>/*))",
        master.to_hex()
    )
}

pub fn descriptor(input: &str) -> Descriptor {
    Descriptor::parse(input, NETWORK).expect("descriptor")
}

pub fn policy() -> AssetId {
    NETWORK.policy_asset()
}

pub fn other_asset() -> AssetId {
    AssetId::from_slice(&sha256(b"other asset")).expect("asset id")
}

fn tagged(label: &[u8], tag: u64) -> [u8; 32] {
    let mut data = label.to_vec();
    data.extend_from_slice(&tag.to_le_bytes());
    sha256(&data)
}

pub fn secret(tag: u64) -> SecretKey {
    SecretKey::from_slice(&tagged(b"ephemeral", tag)).expect("secret key")
}

pub fn factors(tag: u64) -> BlindingFactors {
    BlindingFactors {
        ephemeral: secret(tag),
        asset_bf: AssetBlindingFactor::from_slice(&tagged(b"abf", tag)).expect("abf"),
        value_bf: ValueBlindingFactor::from_slice(&tagged(b"vbf", tag)).expect("vbf"),
    }
}

pub fn tip(height: u32) -> ChainTip {
    fork_tip(height, 0)
}

pub fn fork_tip(height: u32, fork: u8) -> ChainTip {
    let mut data = height.to_le_bytes().to_vec();
    data.push(fork);
    ChainTip {
        height,
        hash: BlockHash::from_byte_array(sha256(&data)),
    }
}

pub fn foreign_outpoint(tag: u64) -> OutPoint {
    OutPoint::new(Txid::from_byte_array(tagged(b"foreign", tag)), 0)
}

pub fn blinded_to_key(
    script_pubkey: Script,
    receiver: &PublicKey,
    asset: AssetId,
    value: u64,
    tag: u64,
) -> TxOut {
    blind_output(script_pubkey, asset, value, receiver, &factors(tag)).expect("blind output")
}

/// Confidential output paying `chain`/`index` of `descriptor`.
pub fn blinded_to(
    descriptor: &Descriptor,
    chain: Chain,
    index: u32,
    asset: AssetId,
    value: u64,
    tag: u64,
) -> TxOut {
    let derived = descriptor.derive_script(chain, index).expect("derive");
    blinded_to_key(derived.script_pubkey, &derived.blinding_pubkey, asset, value, tag)
}

pub fn explicit_to(
    descriptor: &Descriptor,
    chain: Chain,
    index: u32,
    asset: AssetId,
    value: u64,
) -> TxOut {
    let script_pubkey = descriptor.script_pubkey(chain, index).expect("derive");
    explicit_output(script_pubkey, asset, value)
}

pub fn explicit_output(script_pubkey: Script, asset: AssetId, value: u64) -> TxOut {
    TxOut {
        asset: Asset::Explicit(asset),
        value: Value::Explicit(value),
        nonce: Nonce::Null,
        script_pubkey,
        witness: Default::default(),
    }
}

pub fn foreign_output(asset: AssetId, value: u64) -> TxOut {
    let mut script_pubkey = vec![0x00, 0x14];
    script_pubkey.extend_from_slice(&[0xee; 20]);
    explicit_output(Script::from(script_pubkey), asset, value)
}

pub fn fee_output(value: u64) -> TxOut {
    TxOut::new_fee(value, policy())
}

pub fn spend(previous_output: OutPoint) -> TxIn {
    TxIn {
        previous_output,
        sequence: Sequence(0xffff_fffd),
        witness: TxInWitness {
            script_witness: vec![vec![0x30; 71], vec![0x02; 33]],
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn transaction(inputs: &[OutPoint], outputs: Vec<TxOut>) -> Transaction {
    transaction_with_inputs(inputs.iter().copied().map(spend).collect(), outputs)
}

pub fn transaction_with_inputs(input: Vec<TxIn>, output: Vec<TxOut>) -> Transaction {
    Transaction {
        version: 2,
        lock_time: LockTime::ZERO,
        input,
        output,
    }
}

/// Block time of `height` in the fixture chain.
pub fn block_time(height: u32) -> u32 {
    1_700_000_000 + height * 60
}

/// Funding transaction from outside the wallet.
pub fn receive(outputs: Vec<TxOut>, tag: u64) -> Transaction {
    let mut outputs = outputs;
    outputs.push(fee_output(250));
    transaction(&[foreign_outpoint(tag)], outputs)
}

/// An in-memory chain answering scan requests the way an indexer would.
pub struct FixtureChain {
    pub network: Network,
    blocks: Vec<Vec<Transaction>>,
    mempool: Vec<Transaction>,
    transient_failures: Cell<usize>,
}

impl FixtureChain {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            blocks: vec![Vec::new()],
            mempool: Vec::new(),
            transient_failures: Cell::new(0),
        }
    }

    /// Mines `txs` into a new block and returns its height.
    pub fn mine(&mut self, txs: Vec<Transaction>) -> u32 {
        let mined: HashSet<Txid> = txs.iter().map(Transaction::txid).collect();
        self.mempool.retain(|tx| !mined.contains(&tx.txid()));
        self.blocks.push(txs);
        self.height()
    }

    pub fn add_to_mempool(&mut self, tx: Transaction) {
        self.mempool.push(tx);
    }

    pub fn fail_next(&self, times: usize) {
        self.transient_failures.set(times);
    }

    pub fn height(&self) -> u32 {
        (self.blocks.len() - 1) as u32
    }

    pub fn tip(&self) -> ChainTip {
        tip(self.height())
    }
}

impl ChainSource for FixtureChain {
    fn fetch(&self, request: &ScanRequest) -> Result<Update, SourceError> {
        if request.network != self.network {
            return Err(SourceError::Protocol("wrong network".to_string()));
        }
        let remaining = self.transient_failures.get();
        if remaining > 0 {
            self.transient_failures.set(remaining - 1);
            return Err(SourceError::Transient("connection reset".to_string()));
        }

        let scripts = request.script_set();
        let mut owned: HashSet<OutPoint> = HashSet::new();
        let mut update = Update::new(self.tip());
        let confirmed = self
            .blocks
            .iter()
            .enumerate()
            .flat_map(|(height, txs)| txs.iter().map(move |tx| (tx, Some(height as u32))));
        let unconfirmed = self.mempool.iter().map(|tx| (tx, None));
        for (tx, height) in confirmed.chain(unconfirmed) {
            let txid = tx.txid();
            let mut relevant = tx
                .input
                .iter()
                .any(|input| owned.contains(&input.previous_output));
            for (vout, output) in tx.output.iter().enumerate() {
                if scripts.contains(output.script_pubkey.as_bytes()) {
                    owned.insert(OutPoint::new(txid, vout as u32));
                    relevant = true;
                }
            }
            if relevant {
                update = update.with_timed_tx(tx.clone(), height, height.map(block_time));
            }
        }
        Ok(update)
    }
}
