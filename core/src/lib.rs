//! Command-processing core for the coldcore hardware wallet.
//!
//! The core receives structured operation requests (key derivation,
//! transaction signing, message signing/verification), enforces
//! initialization and PIN guards plus physical-confirmation gates
//! before any operation touches key material, and supports a streaming
//! protocol for transactions too large for one transport message.
//!
//! # Architecture
//!
//! - [`dispatcher::Device`] owns all mutable state and routes requests
//!   through a declarative guard registry; one request, one response.
//! - [`flash`] is a byte-addressable persistent region with NOR
//!   erase/program semantics, backed either by a memory-mapped file or
//!   by RAM; the core never branches on which backend is active.
//! - [`ui::ConfirmationGate`] is the single suspension point for
//!   physical user approval.
//! - [`entropy`] supplies cryptographically strong randomness and
//!   treats any read failure as fatal to the process.
//!
//! # Security Model
//!
//! - The host is untrusted; every request is validated on the device
//! - Derived key material lives only for the handler invocation that
//!   created it and is zeroized on every exit path
//! - Confirmation happens strictly before any state-mutating or
//!   key-deriving step that cannot be cheaply undone
//! - Fail closed on any ambiguity

pub mod checksum;
pub mod crypto;
pub mod dispatcher;
pub mod entropy;
pub mod flash;
pub mod handlers;
pub mod platform;
pub mod state;
pub mod storage;
pub mod ui;

pub use dispatcher::{Device, Guards, RequestKind};
