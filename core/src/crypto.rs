//! Cryptographic helpers for the command core.
//!
//! This module provides:
//! - Keccak256 hashing (one-shot and streaming)
//! - BIP32 key derivation into a scoped, self-zeroizing node
//! - Recoverable ECDSA over secp256k1
//! - EIP-191 personal message digests and signature recovery
//!
//! # Security
//!
//! - All operations use constant-time implementations where available
//! - Private scalars are wrapped in `Zeroizing` and overwritten on drop
//! - A `DerivedNode` is owned by exactly one handler invocation and is
//!   never persisted or logged

use common::{Error, EthAddress, Hash256};
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use tiny_keccak::{Hasher, Keccak};
use zeroize::Zeroizing;

use common::types::HARDENED;

/// EIP-191 personal message prefix.
const EIP191_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n";

/// Keccak256 hash as used for addresses, checksums and message digests.
pub fn keccak256(data: &[u8]) -> Hash256 {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Streaming Keccak256 accumulator for payloads that arrive in chunks.
pub struct Keccak256 {
    inner: Keccak,
}

impl Keccak256 {
    pub fn new() -> Self {
        Self {
            inner: Keccak::v256(),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> Hash256 {
        let mut output = [0u8; 32];
        self.inner.finalize(&mut output);
        output
    }
}

impl Default for Keccak256 {
    fn default() -> Self {
        Self::new()
    }
}

/// Key material derived for a single handler invocation.
///
/// The private scalar is overwritten when the node is dropped, on every
/// exit path including early-return failures.
pub struct DerivedNode {
    secret: Zeroizing<[u8; 32]>,
}

impl DerivedNode {
    /// Derives a node from the master seed along a BIP32 path.
    ///
    /// Fails with `DataError` when the path is empty or cannot be
    /// resolved, matching the protocol-level failure the host sees.
    pub fn derive(seed: &[u8; 64], path: &[u32]) -> Result<Self, Error> {
        use bip32::{ChildNumber, XPrv};

        if path.is_empty() {
            return Err(Error::DataError);
        }

        let mut xprv = XPrv::new(seed).map_err(|_| Error::DataError)?;
        for &component in path {
            let child = ChildNumber::new(component & !HARDENED, component & HARDENED != 0)
                .map_err(|_| Error::DataError)?;
            xprv = xprv.derive_child(child).map_err(|_| Error::DataError)?;
        }

        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&xprv.private_key().to_bytes());
        Ok(Self { secret })
    }

    fn signing_key(&self) -> Result<SigningKey, Error> {
        SigningKey::from_slice(&self.secret[..]).map_err(|_| Error::ProcessError)
    }

    /// Recoverable ECDSA signature over a 32-byte digest.
    ///
    /// k256 produces low-S normalized signatures.
    pub fn sign_digest(&self, digest: &Hash256) -> Result<(EcdsaSignature, RecoveryId), Error> {
        self.signing_key()?
            .sign_prehash_recoverable(digest)
            .map_err(|_| Error::ProcessError)
    }

    /// Address of this node's public key: `keccak256(pubkey)[12..]`.
    pub fn address(&self) -> Result<EthAddress, Error> {
        let key = self.signing_key()?;
        let point = key.verifying_key().to_encoded_point(false);
        // Skip the 0x04 uncompressed-point prefix
        Ok(address_from_hash(&keccak256(&point.as_bytes()[1..])))
    }
}

fn address_from_hash(hash: &Hash256) -> EthAddress {
    let mut address = [0u8; 20];
    address.copy_from_slice(&hash[12..]);
    address
}

/// Packs a recoverable signature as the 65-byte wire form `r ‖ s ‖ v`,
/// with `v = 27 + recovery_id`.
pub fn signature_rsv(sig: &EcdsaSignature, recid: RecoveryId) -> Vec<u8> {
    let mut out = Vec::with_capacity(65);
    out.extend_from_slice(&sig.r().to_bytes());
    out.extend_from_slice(&sig.s().to_bytes());
    out.push(27 + recid.to_byte());
    out
}

/// Digest of an EIP-191 prefixed personal message:
/// `keccak256("\x19Ethereum Signed Message:\n" + len + message)`.
pub fn personal_message_digest(message: &[u8]) -> Hash256 {
    let len_str = message.len().to_string();
    let mut hasher = Keccak256::new();
    hasher.update(EIP191_PREFIX);
    hasher.update(len_str.as_bytes());
    hasher.update(message);
    hasher.finalize()
}

/// Recovers the signer address from a 65-byte `r ‖ s ‖ v` signature
/// over `digest`. Accepts `v` in 27/28 or raw 0/1 form.
pub fn recover_address(digest: &Hash256, signature: &[u8]) -> Result<EthAddress, Error> {
    if signature.len() != 65 {
        return Err(Error::DataError);
    }

    let v = signature[64];
    let recid_byte = if v >= 27 { v - 27 } else { v };
    let recid = RecoveryId::try_from(recid_byte).map_err(|_| Error::DataError)?;
    let sig = EcdsaSignature::from_slice(&signature[..64]).map_err(|_| Error::DataError)?;

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recid)
        .map_err(|_| Error::DataError)?;
    let point = key.to_encoded_point(false);
    Ok(address_from_hash(&keccak256(&point.as_bytes()[1..])))
}
