//! Lazily extended set of derived scripts the wallet recognises.

use std::collections::HashMap;

use ctwallet_descriptor::{Chain, DerivedScript, Descriptor, DescriptorError};
use ctwallet_log::log_trace;
use ctwallet_primitives::Script;

const MAX_INDEX: u32 = 1 << 31;

#[derive(Debug, Default)]
pub struct WatchSet {
    derived: [Vec<DerivedScript>; 2],
    by_script: HashMap<Script, (Chain, u32)>,
}

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scripts derived so far on `chain`.
    pub fn derived(&self, chain: Chain) -> u32 {
        self.derived[usize::from(chain.as_u8())].len() as u32
    }

    pub fn len(&self) -> usize {
        self.by_script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_script.is_empty()
    }

    /// Derives `chain` up to (excluding) index `count`. Returns whether anything was added.
    pub fn ensure(
        &mut self,
        descriptor: &Descriptor,
        chain: Chain,
        count: u32,
    ) -> Result<bool, DescriptorError> {
        let count = count.min(MAX_INDEX);
        let start = self.derived(chain);
        if start >= count {
            return Ok(false);
        }
        for script in descriptor.derive_range(chain, start..count)? {
            self.by_script
                .insert(script.script_pubkey.clone(), (chain, script.index));
            self.derived[usize::from(chain.as_u8())].push(script);
        }
        log_trace!("watching {chain} scripts {start}..{count}");
        Ok(true)
    }

    /// Extends every chain of `descriptor` to `next_unused + gap_limit`.
    pub fn ensure_window(
        &mut self,
        descriptor: &Descriptor,
        next_unused: [u32; 2],
        gap_limit: u32,
    ) -> Result<bool, DescriptorError> {
        let mut grew = false;
        for chain in descriptor.chains() {
            let target = next_unused[usize::from(chain.as_u8())].saturating_add(gap_limit);
            grew |= self.ensure(descriptor, *chain, target)?;
        }
        Ok(grew)
    }

    pub fn lookup(&self, script_pubkey: &Script) -> Option<(Chain, u32)> {
        self.by_script.get(script_pubkey).copied()
    }

    /// Derived scripts of `chain` below index `count`.
    pub fn scripts(&self, chain: Chain, count: u32) -> &[DerivedScript] {
        let scripts = &self.derived[usize::from(chain.as_u8())];
        let end = scripts.len().min(count as usize);
        &scripts[..end]
    }
}
