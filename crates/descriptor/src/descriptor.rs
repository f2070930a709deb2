//! `ct(...)` descriptors and their derived scripts.
//!
//! Parsing, checksums and script construction are done by `elements-miniscript`; this
//! module narrows the accepted shapes to single-sig and multisig segwit wallets with an
//! external/internal branch pair and derives blinding keys per script.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use ctwallet_confidential::{secp, BlindingKeyPair, MasterBlindingKey, PublicKey, ViewKey};
use ctwallet_primitives::{sha256, Hash256, Network, Script};
use elements_miniscript::bitcoin::bip32::{ChildNumber, DerivationPath, Fingerprint, Xpub};
use elements_miniscript::confidential::Key;
use elements_miniscript::descriptor::checksum::desc_checksum;
use elements_miniscript::descriptor::{DescriptorSecretKey, ShInner, Wildcard, WshInner};
use elements_miniscript::{ConfidentialDescriptor, DescriptorPublicKey, Terminal};

use crate::address::Address;
use crate::error::{malformed, DescriptorError};
use crate::Chain;

pub const MAX_MULTISIG_KEYS: usize = 20;

const HARDENED: u32 = 1 << 31;

type Branch = elements_miniscript::Descriptor<DescriptorPublicKey>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScriptKind {
    Wpkh,
    ShWpkh,
    WshMulti {
        threshold: usize,
        keys: usize,
        sorted: bool,
    },
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptKind::Wpkh => f.write_str("elwpkh"),
            ScriptKind::ShWpkh => f.write_str("elsh(wpkh)"),
            ScriptKind::WshMulti {
                threshold,
                keys,
                sorted,
            } => {
                let name = if *sorted { "sortedmulti" } else { "multi" };
                write!(f, "elwsh({name}({threshold} of {keys}))")
            }
        }
    }
}

/// Where per-script blinding keys come from.
#[derive(Clone, Debug, PartialEq)]
pub enum BlindingKeySource {
    Slip77(MasterBlindingKey),
    View(ViewKey),
}

impl BlindingKeySource {
    fn from_key(key: &Key) -> Result<Self, DescriptorError> {
        match key {
            Key::Slip77(master) => {
                let bytes: [u8; 32] = master
                    .as_bytes()
                    .try_into()
                    .map_err(|_| malformed("slip77 key must be 32 bytes"))?;
                Ok(BlindingKeySource::Slip77(MasterBlindingKey::from_bytes(bytes)))
            }
            Key::View(DescriptorSecretKey::Single(single)) => {
                Ok(BlindingKeySource::View(ViewKey::Private(single.key.inner)))
            }
            Key::View(_) => Err(malformed("view key must be a single private key")),
            Key::Bare(public) if !public.has_wildcard() && !public.is_multipath() => {
                let public = public
                    .clone()
                    .at_derivation_index(0)
                    .and_then(|definite| definite.derive_public_key(secp()))
                    .map_err(|err| DescriptorError::InvalidKey(err.to_string()))?;
                Ok(BlindingKeySource::View(ViewKey::Public(public.inner)))
            }
            Key::Bare(_) => Err(malformed("blinding public key cannot be ranged")),
        }
    }

    pub fn blinding_public_key(&self, script_pubkey: &Script) -> Result<PublicKey, DescriptorError> {
        match self {
            BlindingKeySource::Slip77(master) => {
                Ok(master.blinding_key_pair(script_pubkey.as_bytes())?.public_key())
            }
            BlindingKeySource::View(view) => Ok(view.blinding_public_key(script_pubkey.as_bytes())?),
        }
    }

    /// Fails with `NoPrivateKey` for a public view key.
    pub fn blinding_key_pair(
        &self,
        script_pubkey: &Script,
    ) -> Result<BlindingKeyPair, DescriptorError> {
        match self {
            BlindingKeySource::Slip77(master) => {
                Ok(master.blinding_key_pair(script_pubkey.as_bytes())?)
            }
            BlindingKeySource::View(view) => Ok(view.blinding_key_pair(script_pubkey.as_bytes())?),
        }
    }

    pub fn can_unblind(&self) -> bool {
        match self {
            BlindingKeySource::Slip77(_) => true,
            BlindingKeySource::View(view) => view.has_private_key(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedScript {
    pub chain: Chain,
    pub index: u32,
    pub script_pubkey: Script,
    pub blinding_pubkey: PublicKey,
}

/// A parsed confidential descriptor. Immutable and safe to share between threads.
#[derive(Clone, Debug, PartialEq)]
pub struct Descriptor {
    network: Network,
    inner: ConfidentialDescriptor<DescriptorPublicKey>,
    blinding: BlindingKeySource,
    kind: ScriptKind,
    /// One single-path descriptor per chain, external first.
    branches: Vec<Branch>,
}

impl Descriptor {
    pub fn parse(input: &str, network: Network) -> Result<Self, DescriptorError> {
        let input = input.trim();
        verify_checksum(input)?;
        let inner = ConfidentialDescriptor::<DescriptorPublicKey>::from_str(input)?;
        let blinding = BlindingKeySource::from_key(&inner.key)?;
        let (kind, keys) = classify(&inner.descriptor)?;

        let mut shared_branches = None;
        for (position, key) in keys.iter().enumerate() {
            let branches = check_key(key, network)?;
            if position == 0 {
                shared_branches = Some(branches);
            } else if shared_branches != Some(branches) {
                return Err(malformed("multisig keys must share the same branches"));
            }
        }

        let branches = inner
            .descriptor
            .clone()
            .into_single_descriptors()
            .map_err(|err| malformed(err.to_string()))?;
        if branches.len() > Chain::ALL.len() {
            return Err(malformed("at most two derivation branches are supported"));
        }
        Ok(Self {
            network,
            inner,
            blinding,
            kind,
            branches,
        })
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn script_kind(&self) -> ScriptKind {
        self.kind
    }

    pub fn blinding_key(&self) -> &BlindingKeySource {
        &self.blinding
    }

    /// The underlying `elements-miniscript` descriptor.
    pub fn as_confidential_descriptor(&self) -> &ConfidentialDescriptor<DescriptorPublicKey> {
        &self.inner
    }

    pub fn is_multipath(&self) -> bool {
        self.branches.len() == Chain::ALL.len()
    }

    /// Branches this descriptor can derive.
    pub fn chains(&self) -> &'static [Chain] {
        if self.is_multipath() {
            &Chain::ALL
        } else {
            &Chain::ALL[..1]
        }
    }

    /// Descriptor without the `#checksum` suffix.
    pub fn body(&self) -> String {
        format!("{:#}", self.inner)
    }

    /// SHA-256 of the canonical descriptor string.
    pub fn id(&self) -> Hash256 {
        sha256(self.to_string().as_bytes())
    }

    pub fn script_pubkey(&self, chain: Chain, index: u32) -> Result<Script, DescriptorError> {
        let out_of_range = || DescriptorError::DerivationOutOfRange { chain, index };
        if index >= HARDENED {
            return Err(out_of_range());
        }
        let branch = self
            .branches
            .get(usize::from(chain.as_u8()))
            .ok_or_else(out_of_range)?;
        let definite = branch
            .at_derivation_index(index)
            .map_err(|_| out_of_range())?;
        Ok(definite.script_pubkey())
    }

    pub fn derive_script(&self, chain: Chain, index: u32) -> Result<DerivedScript, DescriptorError> {
        let script_pubkey = self.script_pubkey(chain, index)?;
        let blinding_pubkey = self.blinding.blinding_public_key(&script_pubkey)?;
        Ok(DerivedScript {
            chain,
            index,
            script_pubkey,
            blinding_pubkey,
        })
    }

    pub fn derive_range(
        &self,
        chain: Chain,
        range: Range<u32>,
    ) -> Result<Vec<DerivedScript>, DescriptorError> {
        range.map(|index| self.derive_script(chain, index)).collect()
    }

    pub fn blinding_public_key(&self, script_pubkey: &Script) -> Result<PublicKey, DescriptorError> {
        self.blinding.blinding_public_key(script_pubkey)
    }

    pub fn blinding_key_pair(
        &self,
        script_pubkey: &Script,
    ) -> Result<BlindingKeyPair, DescriptorError> {
        self.blinding.blinding_key_pair(script_pubkey)
    }

    pub fn address(&self, chain: Chain, index: u32) -> Result<Address, DescriptorError> {
        let derived = self.derive_script(chain, index)?;
        Address::new(
            self.network,
            chain,
            index,
            derived.script_pubkey,
            derived.blinding_pubkey,
        )
    }
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.inner, f)
    }
}

/// Reports a wrong `#checksum` suffix with both values instead of a bare parse error.
fn verify_checksum(input: &str) -> Result<(), DescriptorError> {
    let Some((body, found)) = input.rsplit_once('#') else {
        return Ok(());
    };
    let expected = desc_checksum(body)?;
    if expected != found {
        return Err(DescriptorError::InvalidChecksum {
            expected,
            found: found.to_string(),
        });
    }
    Ok(())
}

fn classify(descriptor: &Branch) -> Result<(ScriptKind, Vec<&DescriptorPublicKey>), DescriptorError> {
    let unsupported = || DescriptorError::UnsupportedScriptKind(format!("{:?}", descriptor.desc_type()));
    match descriptor {
        Branch::Wpkh(wpkh) => Ok((ScriptKind::Wpkh, vec![wpkh.as_inner()])),
        Branch::Sh(sh) => match sh.as_inner() {
            ShInner::Wpkh(wpkh) => Ok((ScriptKind::ShWpkh, vec![wpkh.as_inner()])),
            _ => Err(unsupported()),
        },
        Branch::Wsh(wsh) => match wsh.as_inner() {
            WshInner::SortedMulti(multi) => multisig(multi.k, &multi.pks, true),
            WshInner::Ms(ms) => match &ms.node {
                Terminal::Multi(threshold, keys) => multisig(*threshold, keys, false),
                _ => Err(unsupported()),
            },
        },
        _ => Err(unsupported()),
    }
}

fn multisig(
    threshold: usize,
    keys: &[DescriptorPublicKey],
    sorted: bool,
) -> Result<(ScriptKind, Vec<&DescriptorPublicKey>), DescriptorError> {
    if threshold == 0 || threshold > keys.len() || keys.len() > MAX_MULTISIG_KEYS {
        return Err(DescriptorError::InvalidThreshold {
            threshold,
            keys: keys.len(),
        });
    }
    let kind = ScriptKind::WshMulti {
        threshold,
        keys: keys.len(),
        sorted,
    };
    Ok((kind, keys.iter().collect()))
}

/// Validates one key and returns its `<external;internal>` branch pair, if any.
fn check_key(key: &DescriptorPublicKey, network: Network) -> Result<Option<(u32, u32)>, DescriptorError> {
    match key {
        DescriptorPublicKey::Single(_) => Err(DescriptorError::InvalidKey(
            "expected an extended public key".to_string(),
        )),
        DescriptorPublicKey::XPub(xkey) => {
            check_xpub(&xkey.xkey, &xkey.origin, xkey.wildcard, network)?;
            check_unhardened(&xkey.derivation_path)?;
            Ok(None)
        }
        DescriptorPublicKey::MultiXPub(xkey) => {
            check_xpub(&xkey.xkey, &xkey.origin, xkey.wildcard, network)?;
            let [external, internal] = xkey.derivation_paths.paths().as_slice() else {
                return Err(malformed("multipath step must have exactly two branches"));
            };
            check_unhardened(external)?;
            check_unhardened(internal)?;
            let (Some((external, external_steps)), Some((internal, internal_steps))) =
                (external.as_ref().split_last(), internal.as_ref().split_last())
            else {
                return Err(malformed("empty multipath derivation"));
            };
            if external_steps != internal_steps {
                return Err(malformed("multipath step must come right before /*"));
            }
            if external == internal {
                return Err(malformed("multipath branches must differ"));
            }
            Ok(Some((u32::from(*external), u32::from(*internal))))
        }
    }
}

fn check_xpub(
    xpub: &Xpub,
    origin: &Option<(Fingerprint, DerivationPath)>,
    wildcard: Wildcard,
    network: Network,
) -> Result<(), DescriptorError> {
    if wildcard != Wildcard::Unhardened {
        return Err(malformed("key must end with a single unhardened /*"));
    }
    if xpub.network != network.xpub_network() {
        return Err(DescriptorError::NetworkMismatch);
    }
    if let Some((_, path)) = origin {
        if usize::from(xpub.depth) != path.len() {
            return Err(DescriptorError::InvalidKey(format!(
                "xpub depth {} does not match origin path length {}",
                xpub.depth,
                path.len()
            )));
        }
        if let Some(last) = path.as_ref().last() {
            if *last != xpub.child_number {
                return Err(DescriptorError::InvalidKey(
                    "xpub child number does not match origin path".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn check_unhardened(path: &DerivationPath) -> Result<(), DescriptorError> {
    if path.as_ref().iter().any(ChildNumber::is_hardened) {
        return Err(malformed("hardened steps cannot follow an xpub"));
    }
    Ok(())
}
