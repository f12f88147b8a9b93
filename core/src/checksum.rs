//! Mixed-case address checksum codec (EIP-55 and RSKIP60).
//!
//! A pure, state-free transform from raw address bytes to the display
//! string whose letter casing encodes a hash-derived error-detection
//! pattern. Independent of all session state, so it is testable in
//! isolation.

use common::EthAddress;

use crate::crypto::keccak256;

/// Checksum flavor for a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChecksumVariant {
    /// RSKIP60 mixes the chain id into the hashed preimage.
    pub rskip60: bool,
    /// Chain id, only meaningful when `rskip60` is set.
    pub chain_id: u32,
}

impl ChecksumVariant {
    /// Plain EIP-55, used by every network without an RSKIP60 entry.
    pub const PLAIN: ChecksumVariant = ChecksumVariant {
        rskip60: false,
        chain_id: 0,
    };
}

/// Network table keyed by SLIP-44 coin type.
///
/// Constants from the upstream network registry: RSK mainnet (137) and
/// RSK testnet (37310) are the only RSKIP60 networks.
pub fn variant_for_coin_type(slip44: u32) -> ChecksumVariant {
    match slip44 {
        137 => ChecksumVariant {
            rskip60: true,
            chain_id: 30,
        },
        37310 => ChecksumVariant {
            rskip60: true,
            chain_id: 31,
        },
        _ => ChecksumVariant::PLAIN,
    }
}

/// Renders `raw` as `"0x"` plus 40 mixed-case hex characters.
///
/// A hex letter is upper-cased when the corresponding nibble of the
/// checksum hash has its high bit set; decimal digits never change.
pub fn checksum_address(raw: &EthAddress, variant: &ChecksumVariant) -> String {
    let lower = hex::encode(raw);

    let hash = if variant.rskip60 {
        let mut preimage = variant.chain_id.to_string();
        preimage.push_str("0x");
        preimage.push_str(&lower);
        keccak256(preimage.as_bytes())
    } else {
        keccak256(lower.as_bytes())
    };

    let mut out = String::with_capacity(42);
    out.push_str("0x");
    for (i, c) in lower.bytes().enumerate() {
        let nibble = if i % 2 == 0 {
            hash[i / 2] >> 4
        } else {
            hash[i / 2] & 0x0F
        };
        out.push(if c.is_ascii_alphabetic() && nibble >= 8 {
            c.to_ascii_uppercase() as char
        } else {
            c as char
        });
    }
    out
}
