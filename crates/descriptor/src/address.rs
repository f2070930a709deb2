//! Receive and change addresses derived from a descriptor.

use std::fmt;

use ctwallet_confidential::PublicKey;
use ctwallet_primitives::{Network, Script};

use crate::error::DescriptorError;
use crate::Chain;

/// A derived address together with the chain position and keys it was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    pub chain: Chain,
    pub index: u32,
    pub script_pubkey: Script,
    pub blinding_pubkey: PublicKey,
    inner: elements::Address,
}

impl Address {
    pub fn new(
        network: Network,
        chain: Chain,
        index: u32,
        script_pubkey: Script,
        blinding_pubkey: PublicKey,
    ) -> Result<Self, DescriptorError> {
        let inner = elements::Address::from_script(
            &script_pubkey,
            Some(blinding_pubkey),
            network.address_params(),
        )
        .ok_or_else(|| DescriptorError::Address("script has no address form".to_string()))?;
        Ok(Self {
            chain,
            index,
            script_pubkey,
            blinding_pubkey,
            inner,
        })
    }

    /// Blech32 for segwit programs, blinded base58 otherwise.
    pub fn confidential(&self) -> String {
        self.inner.to_string()
    }

    pub fn unconfidential(&self) -> String {
        self.inner.to_unconfidential().to_string()
    }

    pub fn as_elements(&self) -> &elements::Address {
        &self.inner
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}
