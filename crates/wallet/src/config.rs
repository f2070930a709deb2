//! Wallet configuration and the `ctwallet.conf` loader.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ctwallet_log::{Format, Level, LogConfig};
use ctwallet_primitives::Network;

use crate::error::WalletError;

pub const CONFIG_FILE_NAME: &str = "ctwallet.conf";
pub const DEFAULT_MAX_REORG_DEPTH: u32 = 1;
pub const DEFAULT_GAP_LIMIT: u32 = 20;
const MAX_GAP_LIMIT: u32 = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WalletConfig {
    pub network: Network,
    /// How many blocks below the wallet tip an update may still land.
    pub max_reorg_depth: u32,
    /// Unused addresses watched past the last used one, per chain.
    pub gap_limit: u32,
    pub log: LogConfig,
}

impl WalletConfig {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            max_reorg_depth: DEFAULT_MAX_REORG_DEPTH,
            gap_limit: DEFAULT_GAP_LIMIT,
            log: LogConfig::default(),
        }
    }

    /// Applies the logging settings process-wide.
    pub fn init_logging(&self) {
        ctwallet_log::init(self.log);
    }

    /// Reads `path`; a missing file yields the defaults for `network`.
    pub fn load(path: &Path, network: Network) -> Result<Self, WalletError> {
        match load_conf_file(path)? {
            Some(entries) => Self::from_entries(&entries, network),
            None => Ok(Self::new(network)),
        }
    }

    pub fn from_entries(
        entries: &HashMap<String, Vec<String>>,
        network: Network,
    ) -> Result<Self, WalletError> {
        let mut config = Self::new(network);
        if let Some(value) = last(entries, "network") {
            config.network = match Network::parse(value) {
                Some(Network::ElementsRegtest { .. }) => match network {
                    regtest @ Network::ElementsRegtest { .. } => regtest,
                    _ => Network::default_regtest(),
                },
                Some(parsed) => parsed,
                None => return Err(WalletError::Config(format!("unknown network {value:?}"))),
            };
        }
        if let Some(value) = last(entries, "maxreorgdepth") {
            config.max_reorg_depth = parse_u32("maxreorgdepth", value)?;
        }
        if let Some(value) = last(entries, "gaplimit") {
            let gap_limit = parse_u32("gaplimit", value)?;
            if gap_limit == 0 || gap_limit > MAX_GAP_LIMIT {
                return Err(WalletError::Config(format!(
                    "gaplimit must be between 1 and {MAX_GAP_LIMIT}"
                )));
            }
            config.gap_limit = gap_limit;
        }
        if let Some(value) = last(entries, "loglevel") {
            config.log.level = Level::parse(value)
                .ok_or_else(|| WalletError::Config(format!("invalid loglevel {value:?}")))?;
        }
        if let Some(value) = last(entries, "logformat") {
            config.log.format = Format::parse(value)
                .ok_or_else(|| WalletError::Config(format!("invalid logformat {value:?}")))?;
        }
        if let Some(value) = last(entries, "logtimestamps") {
            config.log.timestamps = parse_conf_bool(value).ok_or_else(|| {
                WalletError::Config(format!("invalid logtimestamps {value:?}"))
            })?;
        }
        Ok(config)
    }
}

fn last<'a>(entries: &'a HashMap<String, Vec<String>>, key: &str) -> Option<&'a str> {
    entries
        .get(key)
        .and_then(|values| values.last())
        .map(String::as_str)
}

fn parse_u32(key: &str, value: &str) -> Result<u32, WalletError> {
    value
        .trim()
        .parse()
        .map_err(|_| WalletError::Config(format!("invalid {key} {value:?}")))
}

pub fn load_conf_file(path: &Path) -> Result<Option<HashMap<String, Vec<String>>>, WalletError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    Ok(Some(parse_conf(&contents)))
}

pub fn parse_conf(contents: &str) -> HashMap<String, Vec<String>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for raw_line in contents.lines() {
        let mut line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(idx) = line.find('#') {
            line = &line[..idx];
        }
        if let Some(idx) = line.find(';') {
            line = &line[..idx];
        }
        line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (key, value) = match line.split_once('=') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line, "1"),
        };
        if key.is_empty() {
            continue;
        }
        out.entry(key.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }
    out
}

fn parse_conf_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.is_empty() {
        return Some(true);
    }
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
