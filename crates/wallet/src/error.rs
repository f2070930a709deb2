use std::fmt;

use ctwallet_descriptor::DescriptorError;
use ctwallet_primitives::{DecodeError, Network, Txid};
use ctwallet_storage::StoreError;

use crate::source::SourceError;

#[derive(Debug)]
pub enum WalletError {
    InvalidDescriptor(DescriptorError),
    StaleUpdate { update_height: u32, tip_height: u32 },
    InconsistentUpdate(Txid),
    UnsupportedPersistenceVersion(u32),
    NetworkMismatch { expected: Network, found: Network },
    DescriptorMismatch,
    InvariantViolation(String),
    InvalidData(&'static str),
    Config(String),
    Source(SourceError),
    Decode(DecodeError),
    Store(StoreError),
    Io(std::io::Error),
}

impl fmt::Display for WalletError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletError::InvalidDescriptor(err) => write!(f, "{err}"),
            WalletError::StaleUpdate {
                update_height,
                tip_height,
            } => write!(
                f,
                "stale update at height {update_height} (wallet tip {tip_height})"
            ),
            WalletError::InconsistentUpdate(txid) => {
                write!(f, "update carries different content for cached transaction {txid}")
            }
            WalletError::UnsupportedPersistenceVersion(version) => {
                write!(f, "unsupported wallet snapshot version {version}")
            }
            WalletError::NetworkMismatch { expected, found } => {
                write!(f, "wallet network mismatch (expected {expected}, found {found})")
            }
            WalletError::DescriptorMismatch => {
                write!(f, "snapshot belongs to a different descriptor")
            }
            WalletError::InvariantViolation(message) => {
                write!(f, "wallet invariant violated: {message}")
            }
            WalletError::InvalidData(message) => write!(f, "{message}"),
            WalletError::Config(message) => write!(f, "config: {message}"),
            WalletError::Source(err) => write!(f, "{err}"),
            WalletError::Decode(err) => write!(f, "{err}"),
            WalletError::Store(err) => write!(f, "{err}"),
            WalletError::Io(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for WalletError {}

impl From<DescriptorError> for WalletError {
    fn from(err: DescriptorError) -> Self {
        WalletError::InvalidDescriptor(err)
    }
}

impl From<SourceError> for WalletError {
    fn from(err: SourceError) -> Self {
        WalletError::Source(err)
    }
}

impl From<DecodeError> for WalletError {
    fn from(err: DecodeError) -> Self {
        WalletError::Decode(err)
    }
}

impl From<StoreError> for WalletError {
    fn from(err: StoreError) -> Self {
        WalletError::Store(err)
    }
}

impl From<std::io::Error> for WalletError {
    fn from(err: std::io::Error) -> Self {
        WalletError::Io(err)
    }
}
