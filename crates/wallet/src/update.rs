//! Scan results handed to the wallet by a chain source.

use std::collections::BTreeSet;

use ctwallet_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use ctwallet_primitives::{decode, encode, BlockHash, Transaction, Txid};

pub const UPDATE_VERSION: u8 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChainTip {
    pub height: u32,
    pub hash: BlockHash,
}

impl Encodable for ChainTip {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u32_le(self.height);
        self.hash.consensus_encode(encoder);
    }
}

impl Decodable for ChainTip {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            height: decoder.read_u32_le()?,
            hash: BlockHash::consensus_decode(decoder)?,
        })
    }
}

pub(crate) fn write_optional_u32(encoder: &mut Encoder, value: Option<u32>) {
    encoder.write_bool(value.is_some());
    if let Some(value) = value {
        encoder.write_u32_le(value);
    }
}

pub(crate) fn read_optional_u32(decoder: &mut Decoder) -> Result<Option<u32>, DecodeError> {
    if decoder.read_bool()? {
        Ok(Some(decoder.read_u32_le()?))
    } else {
        Ok(None)
    }
}

/// A transaction and its confirmation height; `None` is unconfirmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRecord {
    pub tx: Transaction,
    pub height: Option<u32>,
    /// Block time in seconds since the epoch, when the source knows it.
    pub timestamp: Option<u32>,
}

impl Encodable for TxRecord {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_consensus(&self.tx);
        write_optional_u32(encoder, self.height);
        write_optional_u32(encoder, self.timestamp);
    }
}

impl Decodable for TxRecord {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            tx: decoder.read_consensus()?,
            height: read_optional_u32(decoder)?,
            timestamp: read_optional_u32(decoder)?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Update {
    pub version: u8,
    pub tip: ChainTip,
    pub txs: Vec<TxRecord>,
    /// Transactions the source saw disappear from the chain and mempool.
    pub orphaned: Vec<Txid>,
}

impl Update {
    pub fn new(tip: ChainTip) -> Self {
        Self {
            version: UPDATE_VERSION,
            tip,
            txs: Vec::new(),
            orphaned: Vec::new(),
        }
    }

    pub fn with_tx(self, tx: Transaction, height: Option<u32>) -> Self {
        self.with_timed_tx(tx, height, None)
    }

    pub fn with_timed_tx(
        mut self,
        tx: Transaction,
        height: Option<u32>,
        timestamp: Option<u32>,
    ) -> Self {
        self.txs.push(TxRecord {
            tx,
            height,
            timestamp,
        });
        self
    }

    pub fn with_orphaned(mut self, txid: Txid) -> Self {
        self.orphaned.push(txid);
        self
    }

    pub fn is_only_tip(&self) -> bool {
        self.txs.is_empty() && self.orphaned.is_empty()
    }

    /// The same update stripped of everything but the tip.
    pub fn only_tip(&self) -> Self {
        Self::new(self.tip)
    }

    /// Squashes `following`, produced after `self`, into a single update.
    pub fn merge(&mut self, following: Update) {
        let orphaned: BTreeSet<Txid> = following.orphaned.iter().copied().collect();
        let readded: BTreeSet<Txid> = following.txs.iter().map(|r| r.tx.txid()).collect();

        self.txs.retain(|record| {
            let txid = record.tx.txid();
            !orphaned.contains(&txid) && !readded.contains(&txid)
        });
        self.txs.extend(following.txs);

        self.orphaned.retain(|txid| !readded.contains(txid));
        for txid in following.orphaned {
            if !self.orphaned.contains(&txid) {
                self.orphaned.push(txid);
            }
        }
        self.tip = following.tip;
    }

    pub fn serialize(&self) -> Vec<u8> {
        encode(self)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes)
    }
}

impl Encodable for Update {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_u8(self.version);
        self.tip.consensus_encode(encoder);
        self.txs.consensus_encode(encoder);
        encoder.write_varint(self.orphaned.len() as u64);
        for txid in &self.orphaned {
            txid.consensus_encode(encoder);
        }
    }
}

impl Decodable for Update {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let version = decoder.read_u8()?;
        if version != UPDATE_VERSION {
            return Err(DecodeError::InvalidData("unsupported update version"));
        }
        let tip = ChainTip::consensus_decode(decoder)?;
        let txs = Vec::<TxRecord>::consensus_decode(decoder)?;
        let count = decoder.read_count()?;
        let mut orphaned = Vec::with_capacity(count);
        for _ in 0..count {
            orphaned.push(Txid::consensus_decode(decoder)?);
        }
        Ok(Self {
            version,
            tip,
            txs,
            orphaned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctwallet_primitives::elements::confidential::{Asset, Nonce, Value};
    use ctwallet_primitives::elements::hashes::Hash;
    use ctwallet_primitives::elements::{LockTime, Sequence};
    use ctwallet_primitives::{AssetId, OutPoint, Script, TxIn, TxOut};

    fn tip(height: u32) -> ChainTip {
        ChainTip {
            height,
            hash: BlockHash::from_byte_array([height as u8; 32]),
        }
    }

    fn tx(tag: u8) -> Transaction {
        Transaction {
            version: 2,
            lock_time: LockTime::ZERO,
            input: vec![TxIn {
                previous_output: OutPoint::new(Txid::from_byte_array([tag; 32]), 0),
                sequence: Sequence(0xffff_fffd),
                ..Default::default()
            }],
            output: vec![TxOut {
                asset: Asset::Explicit(AssetId::from_byte_array([1; 32])),
                value: Value::Explicit(u64::from(tag) * 1000),
                nonce: Nonce::Null,
                script_pubkey: Script::from(vec![0x00, 0x14, tag, tag]),
                witness: Default::default(),
            }],
        }
    }

    #[test]
    fn serialization_round_trips() {
        let update = Update::new(tip(10))
            .with_timed_tx(tx(1), Some(9), Some(1_700_000_000))
            .with_tx(tx(2), None)
            .with_orphaned(tx(3).txid());
        let bytes = update.serialize();
        assert_eq!(bytes[0], UPDATE_VERSION);
        let decoded = Update::deserialize(&bytes).expect("decode");
        assert_eq!(decoded, update);
        assert_eq!(decoded.txs[0].timestamp, Some(1_700_000_000));
        assert_eq!(decoded.txs[1].timestamp, None);

        let mut future = bytes.clone();
        future[0] = UPDATE_VERSION + 1;
        assert_eq!(
            Update::deserialize(&future),
            Err(DecodeError::InvalidData("unsupported update version"))
        );
    }

    #[test]
    fn only_tip_drops_content() {
        let update = Update::new(tip(4)).with_tx(tx(1), Some(4));
        let stripped = update.only_tip();
        assert!(stripped.is_only_tip());
        assert_eq!(stripped.tip, update.tip);
    }

    #[test]
    fn merge_squashes_sequential_updates() {
        let mut first = Update::new(tip(5))
            .with_tx(tx(1), None)
            .with_tx(tx(2), Some(5));
        let second = Update::new(tip(6))
            .with_tx(tx(1), Some(6))
            .with_orphaned(tx(2).txid());
        first.merge(second);

        assert_eq!(first.tip, tip(6));
        assert_eq!(first.txs.len(), 1);
        assert_eq!(first.txs[0].height, Some(6));
        assert_eq!(first.orphaned, vec![tx(2).txid()]);

        first.merge(Update::new(tip(7)).with_tx(tx(2), None));
        assert!(first.orphaned.is_empty());
        assert_eq!(first.txs.len(), 2);
    }
}
