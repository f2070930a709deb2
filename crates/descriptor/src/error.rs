use std::fmt;

use ctwallet_confidential::BlindingError;

use crate::Chain;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    Malformed(String),
    /// Rejected by the descriptor grammar.
    Parse(String),
    UnsupportedScriptKind(String),
    InvalidChecksum { expected: String, found: String },
    InvalidKey(String),
    NetworkMismatch,
    InvalidThreshold { threshold: usize, keys: usize },
    DerivationOutOfRange { chain: Chain, index: u32 },
    Blinding(BlindingError),
    Address(String),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptorError::Malformed(message) => write!(f, "malformed descriptor: {message}"),
            DescriptorError::Parse(message) => write!(f, "cannot parse descriptor: {message}"),
            DescriptorError::UnsupportedScriptKind(kind) => {
                write!(f, "unsupported script kind {kind}")
            }
            DescriptorError::InvalidChecksum { expected, found } => {
                write!(f, "descriptor checksum mismatch: expected {expected}, found {found}")
            }
            DescriptorError::InvalidKey(message) => write!(f, "invalid key: {message}"),
            DescriptorError::NetworkMismatch => {
                write!(f, "extended key version does not match the network")
            }
            DescriptorError::InvalidThreshold { threshold, keys } => {
                write!(f, "invalid multisig threshold {threshold} of {keys}")
            }
            DescriptorError::DerivationOutOfRange { chain, index } => {
                write!(f, "cannot derive {chain} index {index}")
            }
            DescriptorError::Blinding(err) => write!(f, "{err}"),
            DescriptorError::Address(message) => write!(f, "cannot encode address: {message}"),
        }
    }
}

impl std::error::Error for DescriptorError {}

impl From<elements_miniscript::Error> for DescriptorError {
    fn from(err: elements_miniscript::Error) -> Self {
        DescriptorError::Parse(err.to_string())
    }
}

impl From<BlindingError> for DescriptorError {
    fn from(err: BlindingError) -> Self {
        DescriptorError::Blinding(err)
    }
}

pub(crate) fn malformed(message: impl Into<String>) -> DescriptorError {
    DescriptorError::Malformed(message.into())
}
