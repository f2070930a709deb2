//! Construction of confidential outputs from known secrets.

use ctwallet_primitives::{AssetId, Script, TxOut};
use elements::confidential::{Asset, AssetBlindingFactor, Value, ValueBlindingFactor};
use elements::secp256k1_zkp::{PublicKey, SecretKey};
use elements::{RangeProofMessage, TxOutWitness};

use crate::error::BlindingError;
use crate::secp;

/// Sender-chosen randomness for one output.
pub struct BlindingFactors {
    pub ephemeral: SecretKey,
    pub asset_bf: AssetBlindingFactor,
    pub value_bf: ValueBlindingFactor,
}

/// Blinds `value` of `asset` to `receiver`. No surjection proof is attached, and `value`
/// must be non-zero.
pub fn blind_output(
    script_pubkey: Script,
    asset: AssetId,
    value: u64,
    receiver: &PublicKey,
    factors: &BlindingFactors,
) -> Result<TxOut, BlindingError> {
    let message = RangeProofMessage {
        asset,
        bf: factors.asset_bf,
    };
    let (value, nonce, rangeproof) = Value::Explicit(value)
        .blind(
            secp(),
            factors.value_bf,
            *receiver,
            factors.ephemeral,
            &script_pubkey,
            &message,
        )
        .map_err(|err| BlindingError::Proof(err.to_string()))?;

    Ok(TxOut {
        asset: Asset::new_confidential(secp(), asset, factors.asset_bf),
        value,
        nonce,
        script_pubkey,
        witness: TxOutWitness {
            surjection_proof: None,
            rangeproof: Some(Box::new(rangeproof)),
        },
    })
}
