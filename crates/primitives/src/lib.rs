//! Network parameters, hashing helpers and the binary encoding used for wallet blobs.
//!
//! Chain types come from `elements`; they are re-exported here so every crate in the
//! workspace names them through one path.

pub mod encoding;
pub mod hash;
pub mod network;

pub type Hash256 = [u8; 32];

pub use elements;
pub use elements::{
    AssetId, AssetIssuance, BlockHash, OutPoint, Script, Transaction, TxIn, TxOut, Txid,
};
pub use encoding::{decode, encode, Decodable, DecodeError, Decoder, Encodable, Encoder};
pub use hash::{hmac_sha256, hmac_sha512, sha256, sha256d, tagged_hash};
pub use network::Network;
