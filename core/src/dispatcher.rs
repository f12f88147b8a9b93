//! Request dispatcher: guard evaluation and handler routing.
//!
//! The dispatcher is a table-driven front door. Every request type has
//! a registry entry carrying its guard set and handler function; the
//! dispatch loop evaluates guards in a fixed order, runs the handler,
//! and maps any error to a failure response. Exactly one response
//! leaves per request, on every path.
//!
//! # Security
//!
//! - Guards run before the handler sees the request, so no handler
//!   needs to re-check initialization or PIN state
//! - The initialization guard outranks the PIN guard: a locked,
//!   uninitialized device reports `NotInitialized`, not `PinInvalid`
//! - A recognized request that passes its guards discards any active
//!   signing session before its handler runs, unless it is the stream
//!   continuation itself; requests refused earlier (unknown type,
//!   guard failure) change no state, so a stray frame cannot kill a
//!   legitimate stream

use common::{Error, Request, Response};
use log::{debug, warn};

use crate::crypto::DerivedNode;
use crate::entropy::EntropySource;
use crate::flash::Flash;
use crate::handlers;
use crate::state::DeviceSession;
use crate::storage::{self, DeviceConfig};
use crate::ui::{ConfirmationGate, ConfirmationRequest, Decision};

/// Discriminant of a request, used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    ResetDevice,
    WipeDevice,
    UnlockPin,
    Cancel,
    SignTx,
    TxAck,
    GetAddress,
    SignMessage,
    VerifyMessage,
    Unknown,
}

impl RequestKind {
    pub fn of(request: &Request) -> Self {
        match request {
            Request::ResetDevice { .. } => RequestKind::ResetDevice,
            Request::WipeDevice => RequestKind::WipeDevice,
            Request::UnlockPin { .. } => RequestKind::UnlockPin,
            Request::Cancel => RequestKind::Cancel,
            Request::SignTx { .. } => RequestKind::SignTx,
            Request::TxAck { .. } => RequestKind::TxAck,
            Request::GetAddress { .. } => RequestKind::GetAddress,
            Request::SignMessage { .. } => RequestKind::SignMessage,
            Request::VerifyMessage { .. } => RequestKind::VerifyMessage,
            Request::Unknown { .. } => RequestKind::Unknown,
        }
    }
}

/// Preconditions checked before a handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guards {
    pub requires_initialized: bool,
    pub requires_pin: bool,
}

impl Guards {
    /// No preconditions.
    pub const NONE: Guards = Guards {
        requires_initialized: false,
        requires_pin: false,
    };

    /// Device must be provisioned.
    pub const INITIALIZED: Guards = Guards {
        requires_initialized: true,
        requires_pin: false,
    };

    /// Device must be provisioned and the PIN verified this session.
    pub const PIN_GATED: Guards = Guards {
        requires_initialized: true,
        requires_pin: true,
    };
}

/// The device: all mutable state plus the platform interfaces.
pub struct Device<F: Flash, G: ConfirmationGate, E: EntropySource> {
    pub(crate) flash: F,
    pub(crate) gate: G,
    pub(crate) entropy: E,
    pub(crate) session: DeviceSession,
    pub(crate) config: Option<DeviceConfig>,
}

impl<F: Flash, G: ConfirmationGate, E: EntropySource> Device<F, G, E> {
    /// Loads the stored configuration and starts a locked session.
    pub fn open(flash: F, gate: G, entropy: E) -> Result<Self, Error> {
        let config = storage::load(&flash)?;
        let session = DeviceSession::new(config.is_some());
        debug!("device open, initialized={}", config.is_some());
        Ok(Self {
            flash,
            gate,
            entropy,
            session,
            config,
        })
    }

    pub fn initialized(&self) -> bool {
        self.session.initialized()
    }

    /// The underlying storage, for inspection.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Processes one request and produces exactly one response.
    pub fn dispatch(&mut self, request: &Request) -> Response {
        let kind = RequestKind::of(request);

        let Some(entry) = handlers::registry::<F, G, E>(kind) else {
            warn!("unknown request");
            return Response::failure(Error::UnknownMessage);
        };

        if entry.guards.requires_initialized && !self.session.initialized() {
            return Response::failure(Error::NotInitialized);
        }
        if entry.guards.requires_pin && !self.session.pin_verified() {
            return Response::failure(Error::PinInvalid);
        }

        // A stream is only alive as long as the host keeps feeding it;
        // any other request that gets this far supersedes it
        if self.session.signing_active() && kind != RequestKind::TxAck {
            warn!("non-continuation request {kind:?} while signing");
            self.session.discard_signing();
        }

        match (entry.run)(self, request) {
            Ok(response) => response,
            Err(e) => {
                debug!("{kind:?} failed: {e}");
                Response::failure(e)
            }
        }
    }

    /// Derives key material from the stored seed.
    pub(crate) fn derive_node(&self, path: &[u32]) -> Result<DerivedNode, Error> {
        let config = self.config.as_ref().ok_or(Error::NotInitialized)?;
        DerivedNode::derive(&config.seed, path)
    }

    /// Blocks on the confirmation gate; rejection is an error so the
    /// calling handler unwinds before touching anything.
    pub(crate) fn confirm(&mut self, prompt: &ConfirmationRequest) -> Result<(), Error> {
        match self.gate.request(prompt) {
            Decision::Confirmed => Ok(()),
            Decision::Cancelled => Err(Error::ActionCancelled),
        }
    }
}
