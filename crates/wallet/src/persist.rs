//! Versioned wallet snapshots and where they are kept.
//!
//! Layout: magic `CTWL`, u32 version, network, canonical descriptor, optional
//! tip, cached transactions with heights and timestamps, owned outputs with their secrets and
//! the next unused index of each chain. Spent flags and balances are rebuilt on
//! load. Blinding keys are never written.

use std::fs;
use std::path::{Path, PathBuf};

use ctwallet_confidential::{read_secrets, write_secrets};
use ctwallet_descriptor::{Chain, Descriptor};
use ctwallet_log::log_debug;
use ctwallet_primitives::encoding::{Decodable, Decoder, Encodable, Encoder};
use ctwallet_primitives::{Hash256, Network, OutPoint, Script, Transaction};
use ctwallet_storage::{Column, KeyValueStore, WriteBatch};

use crate::error::WalletError;
use crate::model::{WalletTx, WalletTxOut};
use crate::store::WalletStore;
use crate::model::TxType;
use crate::update::{read_optional_u32, write_optional_u32, ChainTip};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"CTWL";
pub const SNAPSHOT_VERSION: u32 = 2;

const META_SCHEMA_KEY: &[u8] = b"schema_version";

pub fn encode_snapshot(descriptor: &Descriptor, store: &WalletStore) -> Vec<u8> {
    let mut encoder = Encoder::new();
    encoder.write_bytes(&SNAPSHOT_MAGIC);
    encoder.write_u32_le(SNAPSHOT_VERSION);
    descriptor.network().consensus_encode(&mut encoder);
    encoder.write_var_str(&descriptor.to_string());

    encoder.write_bool(store.tip.is_some());
    if let Some(tip) = &store.tip {
        tip.consensus_encode(&mut encoder);
    }

    encoder.write_varint(store.txs.len() as u64);
    for wallet_tx in store.txs.values() {
        encoder.write_consensus(&wallet_tx.tx);
        write_optional_u32(&mut encoder, wallet_tx.height);
        write_optional_u32(&mut encoder, wallet_tx.timestamp);
    }

    encoder.write_varint(store.utxos.len() as u64);
    for utxo in store.utxos.values() {
        utxo.outpoint.consensus_encode(&mut encoder);
        encoder.write_var_bytes(utxo.script_pubkey.as_bytes());
        encoder.write_u8(utxo.chain.as_u8());
        encoder.write_u32_le(utxo.index);
        write_secrets(&mut encoder, &utxo.secrets);
    }

    for chain in Chain::ALL {
        encoder.write_u32_le(store.last_unused(chain));
    }
    encoder.into_inner()
}

pub fn decode_snapshot(bytes: &[u8], descriptor: &Descriptor) -> Result<WalletStore, WalletError> {
    let mut decoder = Decoder::new(bytes);
    if decoder.read_fixed::<4>()? != SNAPSHOT_MAGIC {
        return Err(WalletError::InvalidData("not a wallet snapshot"));
    }
    let version = decoder.read_u32_le()?;
    if version != SNAPSHOT_VERSION {
        return Err(WalletError::UnsupportedPersistenceVersion(version));
    }
    let network = Network::consensus_decode(&mut decoder)?;
    if network != descriptor.network() {
        return Err(WalletError::NetworkMismatch {
            expected: descriptor.network(),
            found: network,
        });
    }
    if decoder.read_var_str()? != descriptor.to_string() {
        return Err(WalletError::DescriptorMismatch);
    }

    let mut store = WalletStore::new();
    if decoder.read_bool()? {
        store.tip = Some(ChainTip::consensus_decode(&mut decoder)?);
    }

    let tx_count = decoder.read_count()?;
    for _ in 0..tx_count {
        let tx: Transaction = decoder.read_consensus()?;
        let height = read_optional_u32(&mut decoder)?;
        let timestamp = read_optional_u32(&mut decoder)?;
        let txid = tx.txid();
        store.txs.insert(
            txid,
            WalletTx {
                txid,
                tx,
                height,
                timestamp,
                balance: Default::default(),
                fee: 0,
                tx_type: TxType::Unknown,
            },
        );
    }

    let utxo_count = decoder.read_count()?;
    for _ in 0..utxo_count {
        let outpoint = OutPoint::consensus_decode(&mut decoder)?;
        let script_pubkey = Script::from(decoder.read_var_bytes()?);
        let chain = Chain::from_u8(decoder.read_u8()?)
            .ok_or(WalletError::InvalidData("invalid chain in snapshot"))?;
        let index = decoder.read_u32_le()?;
        let secrets = read_secrets(&mut decoder)?;
        store.utxos.insert(
            outpoint,
            WalletTxOut {
                outpoint,
                script_pubkey,
                chain,
                index,
                secrets,
                height: None,
                spent_by: None,
            },
        );
    }

    for slot in store.next_unused.iter_mut() {
        *slot = decoder.read_u32_le()?;
    }
    if !decoder.is_empty() {
        return Err(WalletError::InvalidData("trailing bytes in wallet snapshot"));
    }

    store.rebuild(network.policy_asset());
    store.check_invariants()?;
    Ok(store)
}

pub trait Persister: Send + Sync {
    fn load(&self) -> Result<Option<Vec<u8>>, WalletError>;
    fn save(&self, blob: &[u8]) -> Result<(), WalletError>;
}

/// One snapshot file, replaced atomically on every save.
#[derive(Clone, Debug)]
pub struct FilePersister {
    path: PathBuf,
}

impl FilePersister {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `wallet-<id prefix>.dat` inside `dir`.
    pub fn in_dir(dir: &Path, descriptor: &Descriptor) -> Self {
        let id = hex::encode(&descriptor.id()[..8]);
        Self::new(dir.join(format!("wallet-{id}.dat")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Persister for FilePersister {
    fn load(&self) -> Result<Option<Vec<u8>>, WalletError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, blob: &[u8]) -> Result<(), WalletError> {
        write_file_atomic(&self.path, blob)?;
        log_debug!("wrote {} byte snapshot to {}", blob.len(), self.path.display());
        Ok(())
    }
}

fn write_file_atomic(path: &Path, bytes: &[u8]) -> Result<(), WalletError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    if fs::rename(&tmp, path).is_err() {
        let _ = fs::remove_file(path);
        fs::rename(&tmp, path)?;
    }
    Ok(())
}

/// Snapshots kept in a [`KeyValueStore`], keyed by wallet id.
pub struct StorePersister<S> {
    store: S,
    key: Hash256,
}

impl<S: KeyValueStore> StorePersister<S> {
    pub fn new(store: S, descriptor: &Descriptor) -> Self {
        Self {
            store,
            key: descriptor.id(),
        }
    }

    pub fn wallet_id(&self) -> Hash256 {
        self.key
    }

    pub fn remove(&self) -> Result<(), WalletError> {
        self.store.delete(Column::WalletState, &self.key)?;
        Ok(())
    }
}

impl<S: KeyValueStore> Persister for StorePersister<S> {
    fn load(&self) -> Result<Option<Vec<u8>>, WalletError> {
        Ok(self.store.get(Column::WalletState, &self.key)?)
    }

    fn save(&self, blob: &[u8]) -> Result<(), WalletError> {
        let mut batch = WriteBatch::new();
        batch.put(Column::WalletState, &self.key, blob);
        batch.put(Column::Meta, META_SCHEMA_KEY, &SNAPSHOT_VERSION.to_le_bytes());
        self.store.write_batch(&batch)?;
        Ok(())
    }
}

/// Ids of every wallet with a snapshot in `store`.
pub fn stored_wallet_ids<S: KeyValueStore + ?Sized>(store: &S) -> Result<Vec<Hash256>, WalletError> {
    let mut ids = Vec::new();
    for (key, _) in store.scan_prefix(Column::WalletState, &[])? {
        let id: Hash256 = key
            .as_slice()
            .try_into()
            .map_err(|_| WalletError::InvalidData("wallet state key is not a wallet id"))?;
        ids.push(id);
    }
    Ok(ids)
}
