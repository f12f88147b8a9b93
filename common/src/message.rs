//! Request and Response messages for the device command core.
//!
//! The protocol is strictly request/response: the dispatcher emits
//! exactly one `Response` per `Request`. The only multi-step exchange is
//! transaction streaming, where `SignTx` opens a session and each
//! `TxAck` is answered by either another `TxRequest` or the final
//! `TxSignature`.
//!
//! # Security Model
//!
//! All requests come from an untrusted host. The core must:
//! 1. Validate every field after deserialization
//! 2. Enforce initialization/PIN guards before any handler runs
//! 3. Fail closed on any validation error

use alloc::string::String;
use alloc::vec::Vec;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::types::{Bip32Path, EthAddress, MessageSignatureBytes, Signature};

/// Request messages from host to device.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Request {
    // === Device management ===
    /// Create a new wallet: seed from the entropy source, PIN stored as
    /// a digest. Refused when the device already holds a seed.
    ResetDevice {
        /// PIN to protect gated operations with.
        pin: String,
    },

    /// Erase the persisted configuration and return to factory state.
    WipeDevice,

    /// Verify the PIN for this power cycle, enabling PIN-gated handlers.
    UnlockPin {
        /// Candidate PIN.
        pin: String,
    },

    /// Abort whatever multi-step operation is in flight.
    Cancel,

    // === Transaction signing ===
    /// Open a streaming signing session for `total_length` bytes of
    /// transaction data.
    SignTx {
        /// Derivation path of the signing key.
        address_path: Bip32Path,
        /// Total number of payload bytes that will be streamed.
        total_length: u32,
    },

    /// Continuation chunk for the active signing session.
    TxAck {
        /// Token issued by the matching `SignTx`.
        session_token: u64,
        /// Next slice of transaction data.
        data: Vec<u8>,
    },

    // === Keys and addresses ===
    /// Derive and return the address for a path, optionally confirming
    /// its checksummed form on the device display.
    GetAddress {
        /// Derivation path of the key.
        address_path: Bip32Path,
        /// Show the address on the device and wait for approval.
        show_display: bool,
        /// SLIP-44 coin type selecting the checksum variant.
        coin_type: u32,
    },

    // === Message signing ===
    /// Sign a personal message (EIP-191 prefixed).
    SignMessage {
        /// Derivation path of the signing key.
        address_path: Bip32Path,
        /// Message bytes to sign.
        message: Vec<u8>,
    },

    /// Verify a personal message signature against an address.
    VerifyMessage {
        /// Claimed signer address.
        address: EthAddress,
        /// Message bytes that were signed.
        message: Vec<u8>,
        /// 65-byte signature, `r ‖ s ‖ v`.
        signature: Vec<u8>,
    },

    /// Placeholder produced by the transport when the message type tag
    /// is not recognized; always answered with `UnknownMessage`.
    Unknown {
        /// Raw wire tag for diagnostics.
        msg_type: u16,
    },
}

/// Response messages from device to host.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Terminal failure; the device is back at idle.
    Failure(Error),

    /// Request for the next chunk of transaction data.
    TxRequest {
        /// Token the host must echo in each `TxAck`.
        session_token: u64,
        /// Bytes still expected before the signature is produced.
        bytes_remaining: u32,
    },

    /// Final transaction signature; the session is closed.
    TxSignature(Signature),

    /// Derived address, with its checksummed display form when the
    /// host asked for on-device confirmation.
    Address {
        raw: EthAddress,
        display: Option<String>,
    },

    /// Personal message signature.
    MessageSignature {
        /// Address of the signing key.
        address: EthAddress,
        /// 65-byte signature, `r ‖ s ‖ v`.
        signature: MessageSignatureBytes,
    },

    /// Success with no data.
    Success,
}

impl Response {
    /// Creates a failure response.
    pub fn failure(e: Error) -> Self {
        Response::Failure(e)
    }
}
