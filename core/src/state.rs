//! Session state: the device-session flags and the streaming signing
//! session they may carry.
//!
//! # Security
//!
//! - A signing session owns the derived node for the whole stream; the
//!   node is zeroized when the session is dropped, finalized or
//!   discarded
//! - Session tokens come from a counter that only increases for the
//!   lifetime of the device session, so a discarded stream's token can
//!   never match a newer one; a wipe replaces the whole session and
//!   restarts the counter with no streams left to collide with

use common::{Error, Hash256, Signature};
use log::debug;

use crate::crypto::{DerivedNode, Keccak256};

/// In-flight streaming signing operation.
///
/// Created by a signing request after confirmation and key derivation
/// succeed; consumed by the final data chunk or discarded on any
/// protocol violation.
pub struct SigningSession {
    token: u64,
    expected: u32,
    received: u32,
    hasher: Keccak256,
    node: DerivedNode,
}

impl SigningSession {
    fn new(token: u64, expected: u32, node: DerivedNode) -> Self {
        Self {
            token,
            expected,
            received: 0,
            hasher: Keccak256::new(),
            node,
        }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Bytes still owed by the host.
    pub fn bytes_remaining(&self) -> u32 {
        self.expected - self.received
    }

    /// Absorbs one payload chunk into the running digest.
    ///
    /// A chunk that would push the stream past the announced total
    /// length is a protocol violation.
    pub fn absorb(&mut self, chunk: &[u8]) -> Result<(), Error> {
        let len = u32::try_from(chunk.len()).map_err(|_| Error::DataError)?;
        if len > self.bytes_remaining() {
            return Err(Error::DataError);
        }
        self.hasher.update(chunk);
        self.received += len;
        Ok(())
    }

    pub fn is_complete(&self) -> bool {
        self.received == self.expected
    }

    /// Signs the accumulated digest, consuming the session.
    pub fn finalize(self) -> Result<Signature, Error> {
        let digest: Hash256 = self.hasher.finalize();
        let (sig, recid) = self.node.sign_digest(&digest)?;

        let mut out = Signature::default();
        out.r.copy_from_slice(&sig.r().to_bytes());
        out.s.copy_from_slice(&sig.s().to_bytes());
        out.v = 27 + recid.to_byte();
        Ok(out)
    }
}

/// Mutable per-device session flags plus the optional signing session.
pub struct DeviceSession {
    initialized: bool,
    pin_verified: bool,
    signing: Option<SigningSession>,
    next_token: u64,
}

impl DeviceSession {
    pub fn new(initialized: bool) -> Self {
        Self {
            initialized,
            pin_verified: false,
            signing: None,
            next_token: 1,
        }
    }

    pub fn initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    pub fn pin_verified(&self) -> bool {
        self.pin_verified
    }

    pub fn set_pin_verified(&mut self, verified: bool) {
        self.pin_verified = verified;
    }

    /// Opens a fresh signing session, discarding any existing one, and
    /// returns the new session's token.
    pub fn open_signing(&mut self, expected: u32, node: DerivedNode) -> u64 {
        self.discard_signing();
        let token = self.next_token;
        self.next_token += 1;
        self.signing = Some(SigningSession::new(token, expected, node));
        token
    }

    pub fn signing_active(&self) -> bool {
        self.signing.is_some()
    }

    pub fn signing_mut(&mut self) -> Option<&mut SigningSession> {
        self.signing.as_mut()
    }

    /// Removes the signing session for finalization.
    pub fn take_signing(&mut self) -> Option<SigningSession> {
        self.signing.take()
    }

    /// Drops any in-flight signing session; partial digest state and
    /// the derived node go with it.
    pub fn discard_signing(&mut self) {
        if let Some(session) = self.signing.take() {
            debug!(
                "discarding signing session token={} received={}/{}",
                session.token, session.received, session.expected
            );
        }
    }
}
