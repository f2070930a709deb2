use elements::hashes::{hmac, sha256 as sha256_hash, sha512, Hash, HashEngine};
use sha2::{Digest, Sha256};

use crate::Hash256;

pub fn sha256(data: &[u8]) -> Hash256 {
    let digest = Sha256::digest(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest);
    out
}

pub fn sha256d(data: &[u8]) -> Hash256 {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; 32];
    out.copy_from_slice(&second);
    out
}

/// BIP-340 style tagged hash: `sha256(sha256(tag) || sha256(tag) || msg)`.
pub fn tagged_hash(tag: &str, msg: &[u8]) -> Hash256 {
    let tag_hash = Sha256::digest(tag.as_bytes());
    let mut engine = Sha256::new();
    engine.update(tag_hash);
    engine.update(tag_hash);
    engine.update(msg);
    let mut out = [0u8; 32];
    out.copy_from_slice(&engine.finalize());
    out
}

pub fn hmac_sha256(key: &[u8], msg: &[u8]) -> Hash256 {
    let mut engine = hmac::HmacEngine::<sha256_hash::Hash>::new(key);
    engine.input(msg);
    hmac::Hmac::<sha256_hash::Hash>::from_engine(engine).to_byte_array()
}

pub fn hmac_sha512(key: &[u8], msg: &[u8]) -> [u8; 64] {
    let mut engine = hmac::HmacEngine::<sha512::Hash>::new(key);
    engine.input(msg);
    hmac::Hmac::<sha512::Hash>::from_engine(engine).to_byte_array()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256d_of_empty_input() {
        assert_eq!(
            hex::encode(sha256d(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn hmac_sha256_rfc4231_case_2() {
        assert_eq!(
            hex::encode(hmac_sha256(b"Jefe", b"what do ya want for nothing?")),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_sha512_rfc4231_case_2() {
        assert_eq!(
            hex::encode(hmac_sha512(b"Jefe", b"what do ya want for nothing?")),
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn tagged_hash_differs_from_plain_sha256() {
        assert_ne!(tagged_hash("CT-Blinding-Key/1.0", b"abc"), sha256(b"abc"));
        assert_eq!(
            tagged_hash("CT-Blinding-Key/1.0", b"abc"),
            tagged_hash("CT-Blinding-Key/1.0", b"abc")
        );
    }
}
