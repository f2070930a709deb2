//! Confidential output descriptors: parsing, canonical rendering, script and
//! blinding-key derivation, and address encoding.

pub mod address;
pub mod descriptor;
pub mod error;

use std::fmt;

pub use address::Address;
pub use descriptor::{BlindingKeySource, Descriptor, DerivedScript, ScriptKind, MAX_MULTISIG_KEYS};
pub use error::DescriptorError;

/// Derivation branch: receive addresses or change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Chain {
    External,
    Internal,
}

impl Chain {
    pub const ALL: [Chain; 2] = [Chain::External, Chain::Internal];

    pub fn as_u8(self) -> u8 {
        match self {
            Chain::External => 0,
            Chain::Internal => 1,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Chain::External),
            1 => Some(Chain::Internal),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Chain::External => "external",
            Chain::Internal => "internal",
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
