//! Blinding-key derivation and confidential output unblinding.

pub mod blind;
pub mod elip150;
pub mod error;
pub mod keys;
pub mod slip77;
pub mod unblind;

use std::sync::OnceLock;

use elements::secp256k1_zkp::{All, Secp256k1};

pub use blind::{blind_output, BlindingFactors};
pub use elip150::ViewKey;
pub use error::{BlindingError, UnblindError};
pub use keys::BlindingKeyPair;
pub use slip77::MasterBlindingKey;
pub use unblind::{explicit_secrets, is_explicit, read_secrets, unblind, write_secrets};

pub use elements::confidential::{AssetBlindingFactor, ValueBlindingFactor};
pub use elements::secp256k1_zkp::{PublicKey, SecretKey};
pub use elements::TxOutSecrets;

pub fn secp() -> &'static Secp256k1<All> {
    static SECP: OnceLock<Secp256k1<All>> = OnceLock::new();
    SECP.get_or_init(Secp256k1::new)
}
