//! Shared protocol types for the coldcore wallet firmware.
//!
//! This crate defines the request/response surface exchanged between the
//! host and the device command core, along with the failure taxonomy and
//! the small value types both sides agree on. Wire framing is owned by
//! the transport; everything here is plain serde data.

#![no_std]

extern crate alloc;

pub mod error;
pub mod message;
pub mod types;

pub use error::Error;
pub use message::{Request, Response};
pub use types::{Bip32Path, EthAddress, Hash256, Signature};
