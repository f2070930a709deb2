//! Watch-only confidential wallet: snapshots, update merging, persistence.

pub mod config;
pub mod error;
pub mod merge;
pub mod model;
pub mod persist;
pub mod source;
pub mod store;
pub mod update;
pub mod wallet;
pub mod watch;

pub use config::WalletConfig;
pub use error::WalletError;
pub use merge::{MergeOutcome, UnblindFailure, UpdateMerger};
pub use model::{TxType, UtxoFilter, WalletTx, WalletTxOut};
pub use persist::{FilePersister, Persister, StorePersister};
pub use source::{full_scan, ChainSource, ScanRequest, ScanSummary, SourceError};
pub use store::WalletStore;
pub use update::{ChainTip, TxRecord, Update};
pub use wallet::Wallet;
pub use watch::WatchSet;
