//! Patch chains: operand positions waiting for one target address.

use sable_core::CompilationError;

use super::CodeBuffer;

/// Positions of u16 operands that all receive the same target once it is
/// known.
///
/// A chain is resolved exactly once. Jump sites, forward call sites and
/// function address loads are all kept this way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchChain {
    sites: Vec<usize>,
}

impl PatchChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an operand position.
    pub fn push(&mut self, site: usize) {
        self.sites.push(site);
    }

    /// Move every site of `other` into this chain.
    pub fn append(&mut self, other: &mut PatchChain) {
        self.sites.append(&mut other.sites);
    }

    /// Whether no site is waiting.
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Number of waiting sites.
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Waiting positions.
    pub fn sites(&self) -> &[usize] {
        &self.sites
    }

    /// Write `target` into every site and empty the chain.
    pub fn resolve(&mut self, code: &mut CodeBuffer, target: u16) -> Result<(), CompilationError> {
        for site in self.sites.drain(..) {
            if !code.patch_u16(site, target) {
                return Err(CompilationError::internal(format!(
                    "patch site {site} lies outside the code buffer"
                )));
            }
        }
        Ok(())
    }
}
