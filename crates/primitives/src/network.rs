//! Chain parameters for the supported Elements networks.

use std::fmt;

use elements::bitcoin::NetworkKind;
use elements::hashes::{sha256, Hash};
use elements::{AddressParams, AssetId, BlockHash};

use crate::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use crate::Hash256;

const fn hex_nibble(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => panic!("invalid hex literal"),
    }
}

/// Compile-time parse of a 64-character hash literal given in display (reversed) order.
const fn reversed_hex_literal(s: &str) -> Hash256 {
    let raw = s.as_bytes();
    assert!(raw.len() == 64, "hash literal must be 64 hex characters");
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[31 - i] = (hex_nibble(raw[2 * i]) << 4) | hex_nibble(raw[2 * i + 1]);
        i += 1;
    }
    out
}

const fn asset_literal(s: &str) -> AssetId {
    AssetId::from_inner(sha256::Midstate::from_byte_array(reversed_hex_literal(s)))
}

pub const LIQUID_POLICY_ASSET: AssetId = AssetId::LIQUID_BTC;
pub const LIQUID_TESTNET_POLICY_ASSET: AssetId =
    asset_literal("144c654344aa716d6f3abcc1ca90e5641e4e2a7f633bc09fe3baf64585819a49");
pub const REGTEST_DEFAULT_POLICY_ASSET: AssetId =
    asset_literal("5ac9f65c0efcc4775e0baec4ec03abdde22473cd3cf33c0419ca290e0751b225");

const GENESIS_LIQUID: Hash256 =
    reversed_hex_literal("1466275836220db2944ca059a3a10ef6fd2ea684b0688d2c379296888a206003");
const GENESIS_LIQUID_TESTNET: Hash256 =
    reversed_hex_literal("a771da8e52ee6ad581ed1e9a99825e5b3b7992225534eaa2ae23244fe26ab1c1");
const GENESIS_REGTEST: Hash256 =
    reversed_hex_literal("00902a6b70c2ca83b5d9c815d96a0e2f4202179316970d14ea1847dae5b1ca21");

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Network {
    Liquid,
    LiquidTestnet,
    ElementsRegtest { policy_asset: AssetId },
}

impl Network {
    pub fn default_regtest() -> Self {
        Network::ElementsRegtest {
            policy_asset: REGTEST_DEFAULT_POLICY_ASSET,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Liquid => "liquid",
            Network::LiquidTestnet => "liquid-testnet",
            Network::ElementsRegtest { .. } => "liquid-regtest",
        }
    }

    /// Accepts the names used in `ctwallet.conf`; regtest gets the default policy asset.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "liquid" | "mainnet" => Some(Network::Liquid),
            "liquid-testnet" | "liquidtestnet" | "testnet" => Some(Network::LiquidTestnet),
            "liquid-regtest" | "elements-regtest" | "regtest" => Some(Self::default_regtest()),
            _ => None,
        }
    }

    pub fn is_mainnet(&self) -> bool {
        matches!(self, Network::Liquid)
    }

    pub fn address_params(&self) -> &'static AddressParams {
        match self {
            Network::Liquid => &AddressParams::LIQUID,
            Network::LiquidTestnet => &AddressParams::LIQUID_TESTNET,
            Network::ElementsRegtest { .. } => &AddressParams::ELEMENTS,
        }
    }

    pub fn policy_asset(&self) -> AssetId {
        match self {
            Network::Liquid => LIQUID_POLICY_ASSET,
            Network::LiquidTestnet => LIQUID_TESTNET_POLICY_ASSET,
            Network::ElementsRegtest { policy_asset } => *policy_asset,
        }
    }

    pub fn genesis_hash(&self) -> BlockHash {
        match self {
            Network::Liquid => BlockHash::from_byte_array(GENESIS_LIQUID),
            Network::LiquidTestnet => BlockHash::from_byte_array(GENESIS_LIQUID_TESTNET),
            Network::ElementsRegtest { .. } => BlockHash::from_byte_array(GENESIS_REGTEST),
        }
    }

    /// Extended public keys must carry `xpub` versions on mainnet and `tpub` elsewhere.
    pub fn xpub_network(&self) -> NetworkKind {
        if self.is_mainnet() {
            NetworkKind::Main
        } else {
            NetworkKind::Test
        }
    }

    pub fn default_electrum_url(&self) -> Option<&'static str> {
        match self {
            Network::Liquid => Some("blockstream.info:995"),
            Network::LiquidTestnet => Some("blockstream.info:465"),
            Network::ElementsRegtest { .. } => None,
        }
    }

    pub fn default_esplora_url(&self) -> Option<&'static str> {
        match self {
            Network::Liquid => Some("https://blockstream.info/liquid/api"),
            Network::LiquidTestnet => Some("https://blockstream.info/liquidtestnet/api"),
            Network::ElementsRegtest { .. } => None,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Encodable for Network {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        match self {
            Network::Liquid => encoder.write_u8(0),
            Network::LiquidTestnet => encoder.write_u8(1),
            Network::ElementsRegtest { policy_asset } => {
                encoder.write_u8(2);
                policy_asset.consensus_encode(encoder);
            }
        }
    }
}

impl Decodable for Network {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        match decoder.read_u8()? {
            0 => Ok(Network::Liquid),
            1 => Ok(Network::LiquidTestnet),
            2 => Ok(Network::ElementsRegtest {
                policy_asset: AssetId::consensus_decode(decoder)?,
            }),
            _ => Err(DecodeError::InvalidData("unknown network tag")),
        }
    }
}
