//! ELIP-150 view keys: one key blinds every script of a descriptor.

use std::fmt;

use ctwallet_primitives::encoding::Encoder;
use ctwallet_primitives::hash::tagged_hash;
use elements::secp256k1_zkp::{PublicKey, Scalar, SecretKey};

use crate::error::BlindingError;
use crate::keys::BlindingKeyPair;
use crate::secp;

const BLINDING_KEY_TAG: &str = "CT-Blinding-Key/1.0";

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum ViewKey {
    Private(SecretKey),
    /// Can derive blinding public keys (addresses) but cannot unblind.
    Public(PublicKey),
}

impl ViewKey {
    pub fn public_key(&self) -> PublicKey {
        match self {
            ViewKey::Private(secret) => PublicKey::from_secret_key(secp(), secret),
            ViewKey::Public(public) => *public,
        }
    }

    pub fn has_private_key(&self) -> bool {
        matches!(self, ViewKey::Private(_))
    }

    fn tweak(&self, script_pubkey: &[u8]) -> Result<Scalar, BlindingError> {
        let mut encoder = Encoder::with_capacity(34 + script_pubkey.len() + 1);
        encoder.write_bytes(&self.public_key().serialize());
        encoder.write_var_bytes(script_pubkey);
        let digest = tagged_hash(BLINDING_KEY_TAG, &encoder.into_inner());
        Scalar::from_be_bytes(digest).map_err(|_| BlindingError::DegenerateKey)
    }

    pub fn blinding_public_key(&self, script_pubkey: &[u8]) -> Result<PublicKey, BlindingError> {
        let tweak = self.tweak(script_pubkey)?;
        self.public_key()
            .add_exp_tweak(secp(), &tweak)
            .map_err(|_| BlindingError::DegenerateKey)
    }

    pub fn blinding_key_pair(&self, script_pubkey: &[u8]) -> Result<BlindingKeyPair, BlindingError> {
        let ViewKey::Private(view) = self else {
            return Err(BlindingError::NoPrivateKey);
        };
        let tweak = self.tweak(script_pubkey)?;
        let secret = view
            .add_tweak(&tweak)
            .map_err(|_| BlindingError::DegenerateKey)?;
        Ok(BlindingKeyPair::from_secret_key(secret))
    }

    /// Lowercase hex: 64 characters for a private key, 66 for a public key.
    pub fn to_hex(&self) -> String {
        match self {
            ViewKey::Private(secret) => hex::encode(secret.secret_bytes()),
            ViewKey::Public(public) => hex::encode(public.serialize()),
        }
    }

    pub fn from_hex(input: &str) -> Result<Self, BlindingError> {
        let bytes = hex::decode(input).map_err(|_| BlindingError::InvalidHex)?;
        match bytes.len() {
            32 => SecretKey::from_slice(&bytes)
                .map(ViewKey::Private)
                .map_err(|err| BlindingError::InvalidKey(err.to_string())),
            33 => PublicKey::from_slice(&bytes)
                .map(ViewKey::Public)
                .map_err(|err| BlindingError::InvalidKey(err.to_string())),
            got => Err(BlindingError::InvalidLength { expected: 32, got }),
        }
    }
}

impl fmt::Debug for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewKey::Private(_) => f.write_str("ViewKey::Private(..)"),
            ViewKey::Public(public) => write!(f, "ViewKey::Public({public})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIEW_KEY: &str = "c25deb86fa11e49d651d7eae27c220ef930fbd86ea023eebfa73e54875647963";

    #[test]
    fn private_and_public_derivations_agree() {
        let private = ViewKey::from_hex(VIEW_KEY).expect("view key");
        let public = ViewKey::from_hex(&hex::encode(private.public_key().serialize()))
            .expect("view public key");
        assert!(!public.has_private_key());

        for spk_hex in [
            "00148ffb592889bdd06baafad06bfa88a73563a8dbcd",
            "a914e5c6b1b2b9e1b4f6d9e0a1b2c3d4e5f60718293a87",
        ] {
            let spk = hex::decode(spk_hex).expect("spk");
            let pair = private.blinding_key_pair(&spk).expect("private derivation");
            let from_public = public.blinding_public_key(&spk).expect("public derivation");
            assert_eq!(pair.public_key(), from_public);
            assert_eq!(private.blinding_public_key(&spk).expect("pub"), from_public);
            assert_ne!(pair.public_key(), private.public_key());
        }
    }

    #[test]
    fn public_view_key_cannot_unblind() {
        let private = ViewKey::from_hex(VIEW_KEY).expect("view key");
        let public = ViewKey::Public(private.public_key());
        assert_eq!(
            public.blinding_key_pair(b"\x00\x14").map(|_| ()),
            Err(BlindingError::NoPrivateKey)
        );
    }

    #[test]
    fn hex_round_trip_keeps_kind() {
        let private = ViewKey::from_hex(VIEW_KEY).expect("view key");
        assert_eq!(private.to_hex(), VIEW_KEY);
        assert!(matches!(
            ViewKey::from_hex("0011"),
            Err(BlindingError::InvalidLength { got: 2, .. })
        ));
    }
}
