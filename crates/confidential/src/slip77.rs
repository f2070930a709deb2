//! SLIP-77 deterministic blinding keys.

use std::fmt;
use std::str::FromStr;

use ctwallet_primitives::hash::{hmac_sha256, hmac_sha512};
use elements::secp256k1_zkp::SecretKey;
use zeroize::Zeroize;

use crate::error::BlindingError;
use crate::keys::{scalar_from_digest, BlindingKeyPair};

const SLIP21_SEED_KEY: &[u8] = b"Symmetric key seed";
const SLIP77_LABEL: &[u8] = b"SLIP-0077";

#[derive(Clone, PartialEq, Eq)]
pub struct MasterBlindingKey([u8; 32]);

impl MasterBlindingKey {
    /// Derives the SLIP-21 node `m/"SLIP-0077"` from a BIP-39 seed.
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut root = hmac_sha512(SLIP21_SEED_KEY, seed);
        let mut label = Vec::with_capacity(1 + SLIP77_LABEL.len());
        label.push(0u8);
        label.extend_from_slice(SLIP77_LABEL);
        let mut node = hmac_sha512(&root[..32], &label);

        let mut key = [0u8; 32];
        key.copy_from_slice(&node[32..]);
        root.zeroize();
        node.zeroize();
        Self(key)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn blinding_private_key(&self, script_pubkey: &[u8]) -> Result<SecretKey, BlindingError> {
        let mut digest = hmac_sha256(&self.0, script_pubkey);
        let secret = scalar_from_digest(&digest);
        digest.zeroize();
        secret
    }

    pub fn blinding_key_pair(&self, script_pubkey: &[u8]) -> Result<BlindingKeyPair, BlindingError> {
        self.blinding_private_key(script_pubkey)
            .map(BlindingKeyPair::from_secret_key)
    }
}

impl FromStr for MasterBlindingKey {
    type Err = BlindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 64 {
            return Err(BlindingError::InvalidLength {
                expected: 32,
                got: s.len() / 2,
            });
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| BlindingError::InvalidHex)?;
        Ok(Self(bytes))
    }
}

impl Drop for MasterBlindingKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for MasterBlindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterBlindingKey(..)")
    }
}
