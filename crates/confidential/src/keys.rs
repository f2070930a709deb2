use std::fmt;

use elements::secp256k1_zkp::{PublicKey, SecretKey};

use crate::error::BlindingError;
use crate::secp;

/// Per-script blinding key. The secret scalar is wiped when the pair is dropped.
pub struct BlindingKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl BlindingKeyPair {
    pub fn from_secret_key(secret: SecretKey) -> Self {
        let public = PublicKey::from_secret_key(secp(), &secret);
        Self { secret, public }
    }

    pub fn secret_key(&self) -> &SecretKey {
        &self.secret
    }

    pub fn public_key(&self) -> PublicKey {
        self.public
    }
}

impl Drop for BlindingKeyPair {
    fn drop(&mut self) {
        self.secret.non_secure_erase();
    }
}

impl fmt::Debug for BlindingKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlindingKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

/// Interprets a 32-byte digest as a secret scalar without reducing it.
pub(crate) fn scalar_from_digest(digest: &[u8; 32]) -> Result<SecretKey, BlindingError> {
    SecretKey::from_slice(digest).map_err(|_| BlindingError::DegenerateKey)
}
