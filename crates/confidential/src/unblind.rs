//! Recovery of asset, value and blinding factors from confidential outputs.

use ctwallet_primitives::encoding::{DecodeError, Decoder, Encoder};
use ctwallet_primitives::{AssetId, Decodable, Encodable, TxOut};
use elements::confidential::{Asset, AssetBlindingFactor, Nonce, Value, ValueBlindingFactor};
use elements::secp256k1_zkp::SecretKey;
use elements::TxOutSecrets;

use crate::error::UnblindError;
use crate::secp;

/// True when the opening carries no blinding, i.e. it came from an explicit output.
pub fn is_explicit(secrets: &TxOutSecrets) -> bool {
    secrets.asset_bf == AssetBlindingFactor::zero()
        && secrets.value_bf == ValueBlindingFactor::zero()
}

/// Secrets of an output whose asset and value are both explicit.
pub fn explicit_secrets(txout: &TxOut) -> Option<TxOutSecrets> {
    match (txout.asset, txout.value) {
        (Asset::Explicit(asset), Value::Explicit(value)) => Some(TxOutSecrets::new(
            asset,
            AssetBlindingFactor::zero(),
            value,
            ValueBlindingFactor::zero(),
        )),
        _ => None,
    }
}

/// Rewinds the range proof of `txout` with `blinding_key` and checks that the recovered
/// opening reproduces both the asset and the value commitments.
pub fn unblind(txout: &TxOut, blinding_key: &SecretKey) -> Result<TxOutSecrets, UnblindError> {
    let Value::Confidential(_) = txout.value else {
        return Err(UnblindError::NotConfidential);
    };
    if !matches!(txout.asset, Asset::Confidential(_)) {
        return Err(UnblindError::NotConfidential);
    }
    if !matches!(txout.nonce, Nonce::Confidential(_)) {
        return Err(UnblindError::MissingNonce);
    }
    if txout.witness.rangeproof.is_none() {
        return Err(UnblindError::MissingRangeProof);
    }

    let secrets = txout.unblind(secp(), *blinding_key)?;
    let expected = Value::new_confidential_from_assetid(
        secp(),
        secrets.value,
        secrets.asset,
        secrets.value_bf,
        secrets.asset_bf,
    );
    if expected != txout.value {
        return Err(UnblindError::ValueMismatch);
    }
    Ok(secrets)
}

/// Fixed-width encoding used by wallet snapshots: asset, asset blinder, value, value blinder.
pub fn write_secrets(encoder: &mut Encoder, secrets: &TxOutSecrets) {
    secrets.asset.consensus_encode(encoder);
    encoder.write_bytes(secrets.asset_bf.into_inner().as_ref());
    encoder.write_u64_le(secrets.value);
    encoder.write_bytes(secrets.value_bf.into_inner().as_ref());
}

pub fn read_secrets(decoder: &mut Decoder) -> Result<TxOutSecrets, DecodeError> {
    let asset = AssetId::consensus_decode(decoder)?;
    let asset_bf = AssetBlindingFactor::from_slice(&decoder.read_fixed::<32>()?)
        .map_err(|_| DecodeError::InvalidData("invalid asset blinding factor"))?;
    let value = decoder.read_u64_le()?;
    let value_bf = ValueBlindingFactor::from_slice(&decoder.read_fixed::<32>()?)
        .map_err(|_| DecodeError::InvalidData("invalid value blinding factor"))?;
    Ok(TxOutSecrets::new(asset, asset_bf, value, value_bf))
}
