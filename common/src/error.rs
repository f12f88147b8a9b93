//! Failure taxonomy for the command core.
//!
//! Every variant is a terminal, recoverable failure: the device reports
//! it in the response and returns to idle with no state corruption.
//! Fatal conditions (entropy or flash loss) never reach this enum; they
//! terminate the process instead. Messages are intentionally terse to
//! avoid leaking security-relevant information.

use core::fmt;
use serde::{Deserialize, Serialize};

/// Failure codes reported in `Response::Failure`.
///
/// The numeric values follow the device's historical failure codes, so
/// hosts that key on the code keep working.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Error {
    /// No handler is registered for the request type.
    UnknownMessage = 1,
    /// Malformed or unresolvable request data (bad path, bad length,
    /// bad signature, session token mismatch).
    DataError = 3,
    /// The user declined the operation on the device.
    ActionCancelled = 4,
    /// PIN not verified or verification failed.
    PinInvalid = 7,
    /// Internal processing failure.
    ProcessError = 9,
    /// The device holds no seed yet.
    NotInitialized = 11,
}

impl Error {
    /// Returns the wire code for this failure.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnknownMessage => write!(f, "Unknown message"),
            Error::DataError => write!(f, "Data error"),
            Error::ActionCancelled => write!(f, "Action cancelled"),
            Error::PinInvalid => write!(f, "PIN invalid"),
            Error::ProcessError => write!(f, "Process error"),
            Error::NotInitialized => write!(f, "Device not initialized"),
        }
    }
}
