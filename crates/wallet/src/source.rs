//! The seam to whatever fetches chain data for the wallet.

use std::collections::HashSet;
use std::fmt;

use ctwallet_descriptor::{Chain, DerivedScript};
use ctwallet_log::{log_info, log_warn};
use ctwallet_primitives::{Network, Txid};

use crate::error::WalletError;
use crate::update::{ChainTip, Update};
use crate::wallet::Wallet;

const MAX_TRANSIENT_RETRIES: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceError {
    /// Worth retrying: timeouts, dropped connections.
    Transient(String),
    /// The source returned something unusable.
    Protocol(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transient(message) => write!(f, "chain source unavailable: {message}"),
            SourceError::Protocol(message) => write!(f, "chain source protocol error: {message}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// What a chain source must look up: the current watch window and last known tip.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanRequest {
    pub network: Network,
    pub tip: Option<ChainTip>,
    pub scripts: Vec<DerivedScript>,
}

impl ScanRequest {
    pub fn scripts_for(&self, chain: Chain) -> impl Iterator<Item = &DerivedScript> {
        self.scripts.iter().filter(move |script| script.chain == chain)
    }

    pub fn script_set(&self) -> HashSet<&[u8]> {
        self.scripts
            .iter()
            .map(|script| script.script_pubkey.as_bytes())
            .collect()
    }
}

pub trait ChainSource {
    fn fetch(&self, request: &ScanRequest) -> Result<Update, SourceError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub rounds: usize,
    pub new_txids: Vec<Txid>,
    pub unblind_failures: usize,
}

/// Fetches and applies updates until the watch window stops growing.
pub fn full_scan<S: ChainSource + ?Sized>(
    wallet: &Wallet,
    source: &S,
) -> Result<ScanSummary, WalletError> {
    let mut summary = ScanSummary::default();
    let mut retries = 0;
    let mut request = wallet.scan_request()?;
    loop {
        let update = match source.fetch(&request) {
            Ok(update) => update,
            Err(SourceError::Transient(message)) if retries < MAX_TRANSIENT_RETRIES => {
                retries += 1;
                log_warn!("scan round {} failed ({message}), retrying", summary.rounds + 1);
                continue;
            }
            Err(err) => return Err(err.into()),
        };
        summary.rounds += 1;
        let outcome = wallet.apply_update(update)?;
        summary.new_txids.extend(outcome.new_txids);
        summary.unblind_failures += outcome.unblind_failures.len();

        let next = wallet.scan_request()?;
        if next.scripts.len() == request.scripts.len() {
            break;
        }
        request = next;
    }
    log_info!(
        "full scan finished after {} rounds: {} new transactions",
        summary.rounds,
        summary.new_txids.len()
    );
    Ok(summary)
}
