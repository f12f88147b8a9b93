//! Value types shared between host and device.
//!
//! All validation happens on the device after deserialization; nothing
//! here trusts its contents.

use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

/// Maximum BIP32 derivation path depth accepted by the core.
pub const MAX_BIP32_PATH_DEPTH: usize = 10;

/// Hardened-index marker bit in a BIP32 path component.
pub const HARDENED: u32 = 0x8000_0000;

/// Account address (20 bytes, keccak-derived).
pub type EthAddress = [u8; 20];

/// Keccak256 digest (32 bytes).
pub type Hash256 = [u8; 32];

/// BIP32 derivation path.
///
/// Components with the `HARDENED` bit set denote hardened derivation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Bip32Path(pub Vec<u32>);

impl Bip32Path {
    /// Creates an empty path.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Creates a path from a slice of components.
    pub fn from_slice(path: &[u32]) -> Self {
        Self(path.to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.0
    }

    /// A path the core will try to resolve: non-empty and within the
    /// supported depth.
    pub fn is_resolvable(&self) -> bool {
        !self.0.is_empty() && self.0.len() <= MAX_BIP32_PATH_DEPTH
    }

    /// The SLIP-44 coin type encoded at depth 1, if present.
    pub fn slip44(&self) -> Option<u32> {
        self.0.get(1).map(|c| c & !HARDENED)
    }
}

/// ECDSA signature components for a streamed transaction.
///
/// `v` is `27 + recovery_id`; `r` and `s` are big-endian scalars.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub v: u8,
    pub r: [u8; 32],
    pub s: [u8; 32],
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            v: 0,
            r: [0u8; 32],
            s: [0u8; 32],
        }
    }
}

/// A 65-byte message signature laid out as `r ‖ s ‖ v`.
///
/// Kept as a `Vec` rather than `[u8; 65]` for serde compatibility.
pub type MessageSignatureBytes = Vec<u8>;
