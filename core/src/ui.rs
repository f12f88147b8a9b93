//! Physical confirmation gate.
//!
//! Every operation that signs, reveals or destroys anything passes
//! through [`ConfirmationGate::request`] first. The gate is the only
//! suspension point in the core: request processing blocks until the
//! user decides, and any failure to obtain a decision is a rejection.

use std::sync::mpsc::{channel, Receiver, Sender};

use log::info;

/// What the user is being asked to approve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationKind {
    /// Use of key material (signing, address export).
    ProtectCall,
    /// Irreversible destruction of the device configuration.
    WipeDevice,
    /// Anything else (informational review steps).
    Other,
}

/// A single prompt shown to the user.
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub kind: ConfirmationKind,
    /// Whether the reject input is offered at all.
    pub cancellable: bool,
    pub title: String,
    pub body: String,
}

impl ConfirmationRequest {
    pub fn new(kind: ConfirmationKind, title: &str, body: String) -> Self {
        Self {
            kind,
            cancellable: true,
            title: title.to_owned(),
            body,
        }
    }
}

/// The user's answer to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirmed,
    Cancelled,
}

/// Blocking user-approval interface.
pub trait ConfirmationGate {
    fn request(&mut self, prompt: &ConfirmationRequest) -> Decision;
}

/// Physical button press, delivered by the platform input thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Confirm,
    Reject,
}

/// Gate fed by a channel of button events.
///
/// Blocks indefinitely on each prompt. A closed channel means the
/// input side is gone and no approval can ever arrive; that reads as a
/// rejection, never as consent.
pub struct EventGate {
    events: Receiver<ButtonEvent>,
}

impl EventGate {
    pub fn new(events: Receiver<ButtonEvent>) -> Self {
        Self { events }
    }

    /// Gate plus the sender its events arrive on.
    pub fn pair() -> (Sender<ButtonEvent>, Self) {
        let (tx, rx) = channel();
        (tx, Self::new(rx))
    }
}

impl ConfirmationGate for EventGate {
    fn request(&mut self, prompt: &ConfirmationRequest) -> Decision {
        info!("confirm [{:?}] {}: {}", prompt.kind, prompt.title, prompt.body);
        loop {
            match self.events.recv() {
                Ok(ButtonEvent::Confirm) => return Decision::Confirmed,
                Ok(ButtonEvent::Reject) if prompt.cancellable => return Decision::Cancelled,
                // Reject on a non-cancellable prompt is ignored
                Ok(ButtonEvent::Reject) => continue,
                Err(_) => return Decision::Cancelled,
            }
        }
    }
}

/// Gate that approves everything. For tests and development setups
/// where no button input exists; never wired up on a real device.
pub struct AutoApprove;

impl ConfirmationGate for AutoApprove {
    fn request(&mut self, prompt: &ConfirmationRequest) -> Decision {
        info!("auto-approving [{:?}] {}", prompt.kind, prompt.title);
        Decision::Confirmed
    }
}
